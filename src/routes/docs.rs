use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Path the interactive documentation is served under.
const DOCS_PATH: &str = "/docs";

/// Serve the Swagger UI for the coordinator's HTTP surface. The WebSocket
/// message catalogue is exposed through the schema components rather than
/// as paths.
pub fn router(state: SharedState) -> Router<SharedState> {
    let ui: Router<SharedState> = SwaggerUi::new(DOCS_PATH)
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    ui.with_state(state)
}
