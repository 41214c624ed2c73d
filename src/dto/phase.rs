use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::RoomPhase;

/// Room phase as exposed to clients over the wire.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VisiblePhase {
    /// Waiting for players to join and ready up.
    Lobby,
    /// Players are picking an entry for the current prompt.
    SongSelection,
    /// Submitted entries are rated one at a time.
    Rating,
    /// Round ranking is displayed.
    Results,
    /// Final round finished; only an explicit reset returns to the lobby.
    GameOver,
}

impl From<&RoomPhase> for VisiblePhase {
    fn from(value: &RoomPhase) -> Self {
        match value {
            RoomPhase::Lobby => VisiblePhase::Lobby,
            RoomPhase::SongSelection => VisiblePhase::SongSelection,
            RoomPhase::Rating => VisiblePhase::Rating,
            RoomPhase::Results => VisiblePhase::Results,
            RoomPhase::GameOver => VisiblePhase::GameOver,
        }
    }
}
