use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the current health payload. The coordinator has no
/// external backends, so this only reports the live room count.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.room_count())
}
