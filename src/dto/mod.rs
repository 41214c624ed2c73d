//! Wire-level payloads exchanged with game clients.

pub mod events;
pub mod health;
pub mod phase;
pub mod validation;
pub mod ws;
