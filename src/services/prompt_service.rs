use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::PromptEntity,
    dto::prompts::{CacheStatsResponse, ImportPromptsRequest, ImportPromptsResponse, PromptInput},
    error::ServiceError,
    state::{
        SharedState,
        catalog::{IntensityLevel, PARTNER_PLACEHOLDER, Participants},
    },
};

/// Bulk-insert prompt rows. Rows whose id is already stored are left untouched.
pub async fn import(
    state: &SharedState,
    request: ImportPromptsRequest,
) -> Result<ImportPromptsResponse, ServiceError> {
    let received = request.prompts.len();
    let rows = request
        .prompts
        .into_iter()
        .enumerate()
        .map(|(index, input)| to_entity(input).map_err(|message| {
            ServiceError::InvalidInput(format!("prompt #{index}: {message}"))
        }))
        .collect::<Result<Vec<_>, _>>()?;

    let store = state.require_store().await?;
    let inserted = store.insert_prompts(rows).await?;

    info!(received, inserted, "prompts imported");
    Ok(ImportPromptsResponse { received, inserted })
}

fn to_entity(input: PromptInput) -> Result<PromptEntity, String> {
    if input.category.mode() != input.mode {
        return Err(format!(
            "category `{}` does not belong to mode `{}`",
            input.category.as_str(),
            input.mode.as_str()
        ));
    }
    let level = IntensityLevel::try_from(input.level).map_err(|err| err.to_string())?;
    if level == IntensityLevel::Never {
        return Err("prompts need a level between 1 and 3".into());
    }
    let text = input.text.trim().to_owned();
    if text.is_empty() {
        return Err("text cannot be blank".into());
    }

    let participants = input.participants.unwrap_or(if text.contains(PARTNER_PLACEHOLDER) {
        Participants::Pair
    } else {
        Participants::Solo
    });

    Ok(PromptEntity {
        id: input.id.unwrap_or_else(Uuid::new_v4),
        mode: input.mode,
        category: input.category,
        level,
        kind: input.kind,
        participants,
        text,
    })
}

/// Contents of the offline prompt cache.
pub fn cache_stats(state: &SharedState) -> CacheStatsResponse {
    state.prompt_cache().stats().into()
}

/// Drop the offline prompt cache.
pub fn clear_cache(state: &SharedState) -> CacheStatsResponse {
    let cache = state.prompt_cache();
    cache.clear();
    info!("prompt cache cleared");
    cache.stats().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        AppState,
        catalog::{Category, Mode, PromptKind},
    };

    fn input(category: Category, level: u8, text: &str) -> PromptInput {
        PromptInput {
            id: None,
            mode: category.mode(),
            category,
            level,
            kind: PromptKind::Truth,
            participants: None,
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn import_infers_pair_prompts_from_the_placeholder() {
        let state = AppState::with_memory_store().await;
        let response = import(
            &state,
            ImportPromptsRequest {
                prompts: vec![
                    input(Category::Reveal, 1, "What did [JOGADOR] wear on your first date?"),
                    input(Category::Reveal, 2, "Tell a secret"),
                ],
            },
        )
        .await
        .unwrap();
        assert_eq!((response.received, response.inserted), (2, 2));

        let store = state.require_store().await.unwrap();
        let rows = store
            .find_prompts(crate::dao::models::PromptQuery {
                mode: Mode::Couple,
                category: Category::Reveal,
                kind: PromptKind::Truth,
                max_level: None,
                limit: 10,
            })
            .await
            .unwrap();
        let pair = rows.iter().find(|row| row.level == IntensityLevel::Light).unwrap();
        assert_eq!(pair.participants, Participants::Pair);
    }

    #[tokio::test]
    async fn import_rejects_rows_of_the_wrong_mode() {
        let state = AppState::with_memory_store().await;
        let mut row = input(Category::Kiss, 1, "Kiss a hand");
        row.mode = Mode::Couple;
        let err = import(&state, ImportPromptsRequest { prompts: vec![row] })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
