use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{dto::validation::validate_emoji, state::catalog::PlayerId};

#[derive(Debug, Deserialize)]
/// Messages accepted from room WebSocket clients.
#[serde(tag = "type")]
pub enum ReactionInbound {
    #[serde(rename = "reaction")]
    Reaction { emoji: String },
    #[serde(other)]
    Unknown,
}

/// Why an inbound frame was discarded.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid reaction: {0}")]
    Invalid(#[from] validator::ValidationError),
}

impl ReactionInbound {
    /// Parse a text frame and validate its payload.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let message: Self = serde_json::from_str(text)?;
        if let Self::Reaction { emoji } = &message {
            validate_emoji(emoji)?;
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Reaction as relayed to every subscriber and kept in the host's window.
pub struct ReactionView {
    pub emoji: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    pub sent_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reactions_and_tolerates_unknown_types() {
        let message = ReactionInbound::from_json_str(r#"{"type":"reaction","emoji":"🔥"}"#).unwrap();
        assert!(matches!(message, ReactionInbound::Reaction { emoji } if emoji == "🔥"));

        let other = ReactionInbound::from_json_str(r#"{"type":"typing"}"#).unwrap();
        assert!(matches!(other, ReactionInbound::Unknown));
    }

    #[test]
    fn rejects_text_reactions() {
        let err = ReactionInbound::from_json_str(r#"{"type":"reaction","emoji":"lol"}"#).unwrap_err();
        assert!(matches!(err, InboundError::Invalid(_)));
        assert!(ReactionInbound::from_json_str("not json").is_err());
    }
}
