use thiserror::Error;

/// Errors that can occur in service layer operations.
///
/// None of these are fatal to the process: a failing intent degrades to a
/// no-op and the error text is surfaced to the offending client as a
/// `room-error` event.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Referenced room code has no live room.
    #[error("room not found: {0}")]
    RoomNotFound(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current phase or roster state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Room code generation exhausted its retry budget without finding a
    /// free code. With ~2x10^9 possible codes this is unreachable in
    /// practice, but collisions are handled rather than assumed away.
    #[error("room code space exhausted")]
    CodeSpaceExhausted,
}
