use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Dia-e Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::catalog::catalog,
        crate::routes::catalog::import_prompts,
        crate::routes::catalog::cache_stats,
        crate::routes::catalog::clear_cache,
        crate::routes::players::update_profile,
        crate::routes::players::list_preferences,
        crate::routes::players::set_preference,
        crate::routes::players::list_favorites,
        crate::routes::players::add_favorite,
        crate::routes::players::remove_favorite,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::update_settings,
        crate::routes::rooms::start_room,
        crate::routes::rooms::close_room,
        crate::routes::turn::current_turn,
        crate::routes::turn::draw,
        crate::routes::turn::choose,
        crate::routes::turn::skip,
        crate::routes::turn::advance,
        crate::routes::turn::veto,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::state::catalog::Mode,
            crate::state::catalog::SessionKind,
            crate::state::catalog::Category,
            crate::state::catalog::PromptKind,
            crate::state::catalog::Participants,
            crate::state::room::RoomStatus,
            crate::state::turn::TurnPhase,
            crate::dto::health::HealthResponse,
            crate::dto::catalog::LevelView,
            crate::dto::catalog::CategoryView,
            crate::dto::catalog::ModeView,
            crate::dto::catalog::CatalogResponse,
            crate::dto::player::PlayerView,
            crate::dto::player::UpdateProfileRequest,
            crate::dto::player::PreferenceView,
            crate::dto::player::PreferencesResponse,
            crate::dto::player::SetPreferenceRequest,
            crate::dto::player::FavoritesResponse,
            crate::dto::prompts::PromptInput,
            crate::dto::prompts::ImportPromptsRequest,
            crate::dto::prompts::ImportPromptsResponse,
            crate::dto::prompts::CacheStatsResponse,
            crate::dto::room::FictionalPlayerInput,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::RoomSettingsRequest,
            crate::dto::room::FictionalPlayerView,
            crate::dto::room::RoomView,
            crate::dto::room::JoinRoute,
            crate::dto::room::JoinResponse,
            crate::dto::turn::ChooseRequest,
            crate::dto::turn::ShownPromptView,
            crate::dto::turn::TurnSnapshotView,
            crate::dto::turn::CategoryCountView,
            crate::dto::turn::MatchSummaryView,
            crate::dto::turn::TurnView,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::RoomStatusEvent,
            crate::dto::sse::RoomMembersEvent,
            crate::dto::sse::TurnNoticeEvent,
            crate::dto::sse::LevelUpEvent,
            crate::dto::ws::ReactionView,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "catalog", description = "Static catalog and prompt maintenance"),
        (name = "players", description = "Profiles, intensity preferences and favorites"),
        (name = "rooms", description = "Room lifecycle and join routing"),
        (name = "turn", description = "Host-driven turn cycle"),
        (name = "sse", description = "Per-room server-sent events streams"),
        (name = "reactions", description = "WebSocket emoji reactions"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        let paths = doc.paths.paths.keys().cloned().collect::<Vec<_>>();
        for path in [
            "/rooms/{code}/turn/veto",
            "/rooms/{code}/events",
            "/favorites/{prompt_id}",
            "/prompts/cache",
        ] {
            assert!(paths.iter().any(|p| p == path), "{path} missing");
        }
    }
}
