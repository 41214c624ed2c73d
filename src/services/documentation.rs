use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the session coordinator.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::events::ServerEvent,
            crate::dto::events::PlayerSummary,
            crate::dto::events::EntrySnapshot,
            crate::dto::events::RankedEntry,
            crate::dto::phase::VisiblePhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "WebSocket operations for game clients"),
    )
)]
pub struct ApiDoc;
