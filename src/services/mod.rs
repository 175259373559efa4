/// Static catalog listing.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Favorite prompt markings.
pub mod favorite_service;
/// Health check service.
pub mod health_service;
/// Fallback lobby member refresh.
pub mod membership_watch;
/// Player profiles.
pub mod player_service;
/// Intensity preferences.
pub mod preference_service;
/// Prompt import and offline cache maintenance.
pub mod prompt_service;
pub mod replication;
pub mod room_code;
/// Room lifecycle, join routing and roster loading.
pub mod room_service;
pub mod selector;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Per-room Server-Sent Events streams.
pub mod sse_service;
/// Record store connection supervisor.
pub mod storage_supervisor;
/// Turn cycle actions driven by the host.
pub mod turn_service;
/// Reaction WebSocket handling.
pub mod websocket_service;
