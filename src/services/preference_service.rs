use tracing::{info, warn};

use crate::{
    dao::{models::PreferenceEntity, record_store::RecordStore},
    dto::player::{PreferenceView, PreferencesResponse, SetPreferenceRequest},
    error::ServiceError,
    state::{
        SharedState,
        catalog::{IntensityLevel, Mode, PlayerId},
        preferences::PreferenceIndex,
    },
};

/// Preference index of exactly `ids` for `mode`.
///
/// A failed read yields an empty index: every category then plays at the light default.
pub async fn load_index(store: &dyn RecordStore, ids: Vec<PlayerId>, mode: Mode) -> PreferenceIndex {
    let players = ids.len();
    match store.find_preferences(ids, mode).await {
        Ok(rows) => PreferenceIndex::from_entries(
            rows.into_iter()
                .map(|row| (row.player_id, row.category, row.level)),
        ),
        Err(err) => {
            warn!(mode = mode.as_str(), players, error = %err, "preference load failed; using defaults");
            PreferenceIndex::new()
        }
    }
}

/// Every category of `mode` with the caller's effective level.
pub async fn list(
    state: &SharedState,
    caller: &str,
    mode: Mode,
) -> Result<PreferencesResponse, ServiceError> {
    let store = state.require_store().await?;
    let rows = store.find_preferences(vec![caller.to_owned()], mode).await?;
    let index = PreferenceIndex::from_entries(
        rows.into_iter()
            .map(|row| (row.player_id, row.category, row.level)),
    );

    let preferences = mode
        .categories()
        .iter()
        .map(|category| PreferenceView {
            category: *category,
            level: index.level(caller, *category).into(),
            explicit: index.explicit(caller, *category).is_some(),
        })
        .collect();

    Ok(PreferencesResponse { mode, preferences })
}

/// Upsert one of the caller's levels.
pub async fn set(
    state: &SharedState,
    caller: &str,
    request: SetPreferenceRequest,
) -> Result<PreferenceView, ServiceError> {
    if request.category.mode() != request.mode {
        return Err(ServiceError::InvalidInput(format!(
            "category `{}` does not belong to mode `{}`",
            request.category.as_str(),
            request.mode.as_str()
        )));
    }
    let level = IntensityLevel::try_from(request.level)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let store = state.require_store().await?;
    store
        .upsert_preference(PreferenceEntity {
            player_id: caller.to_owned(),
            mode: request.mode,
            category: request.category,
            level,
        })
        .await?;

    info!(player = %caller, category = request.category.as_str(), level = level.as_u8(), "preference updated");
    Ok(PreferenceView {
        category: request.category,
        level: level.into(),
        explicit: true,
    })
}
