//! Application-level configuration loading: selection budgets, escalation pace and timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::favorites::DEFAULT_FAVORITE_WEIGHT;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DIA_E_BACK_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Collision retries when allocating a room code.
    pub room_code_attempts: usize,
    /// Category attempts per prompt selection.
    pub selection_attempts: usize,
    /// Store-side limit for each selector fetch.
    pub selection_fetch_limit: usize,
    /// Store-side limit for the penalty pool.
    pub skip_fetch_limit: usize,
    /// Relative weight of favorited prompts.
    pub favorite_weight: u32,
    /// Rounds per escalation level.
    pub escalation_step: u32,
    /// Reactions kept in the host's rolling window.
    pub reaction_window: usize,
    /// Period of the fallback membership re-fetch.
    pub membership_poll: Duration,
    /// Most fictional players a group solo session accepts.
    pub max_fictional_players: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        selection_attempts = app_config.selection_attempts,
                        escalation_step = app_config.escalation_step,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    room_code_attempts: usize,
    selection_attempts: usize,
    selection_fetch_limit: usize,
    skip_fetch_limit: usize,
    favorite_weight: u32,
    escalation_step: u32,
    reaction_window: usize,
    membership_poll_secs: u64,
    max_fictional_players: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            room_code_attempts: 10,
            selection_attempts: 3,
            selection_fetch_limit: 20,
            skip_fetch_limit: 15,
            favorite_weight: DEFAULT_FAVORITE_WEIGHT,
            escalation_step: 3,
            reaction_window: 5,
            membership_poll_secs: 4,
            max_fictional_players: 10,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            room_code_attempts: value.room_code_attempts.max(1),
            selection_attempts: value.selection_attempts.max(1),
            selection_fetch_limit: value.selection_fetch_limit.max(1),
            skip_fetch_limit: value.skip_fetch_limit.max(1),
            favorite_weight: value.favorite_weight.max(1),
            escalation_step: value.escalation_step.max(1),
            reaction_window: value.reaction_window.max(1),
            membership_poll: Duration::from_secs(value.membership_poll_secs.max(1)),
            max_fictional_players: value.max_fictional_players.max(3),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{ "selection_attempts": 5 }"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.selection_attempts, 5);
        assert_eq!(config.favorite_weight, DEFAULT_FAVORITE_WEIGHT);
        assert_eq!(config.membership_poll, Duration::from_secs(4));
    }

    #[test]
    fn zero_values_are_clamped() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "escalation_step": 0, "room_code_attempts": 0 }"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.escalation_step, 1);
        assert_eq!(config.room_code_attempts, 1);
    }
}
