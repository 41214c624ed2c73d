//! Service layer bridging the transport and the room state.

/// OpenAPI documentation generation.
pub mod documentation;
/// Game flow intents routed through the phase engine.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Room creation, membership, and settings management.
pub mod room_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
/// Broadcast gateway fanning events out to room members.
pub mod ws_events;
