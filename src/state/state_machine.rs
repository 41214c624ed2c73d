use thiserror::Error;

/// High-level phases a room moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Waiting for players to join and ready up.
    Lobby,
    /// Players are picking an entry for the current prompt.
    SongSelection,
    /// Submitted entries are rated one at a time.
    Rating,
    /// Round ranking is displayed until someone advances the round.
    Results,
    /// Final round finished; only an explicit reset returns to the lobby.
    GameOver,
}

/// Events that can be applied to a room's phase.
///
/// The rating sub-loop (advancing the cursor from one entry to the next)
/// stays inside the `Rating` phase and is not an event here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host starts the game from the lobby.
    StartGame,
    /// Every current player has submitted an entry.
    SubmissionsComplete,
    /// The rating cursor walked past the last queued entry.
    RatingComplete,
    /// A client advances from the results screen into another round.
    NextRound,
    /// A client advances from the results screen of the final round.
    FinishGame,
    /// Explicit reset back to the lobby.
    ReturnToLobby,
    /// Player count dropped below the viability minimum outside the lobby.
    InsufficientPlayers,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the room was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// Compute the next phase for an event, or reject the transition.
///
/// Pure transition table; all effects on room state live in the phase
/// engine so this stays trivially testable.
pub fn compute_transition(
    phase: RoomPhase,
    event: RoomEvent,
) -> Result<RoomPhase, InvalidTransition> {
    let next = match (phase, event) {
        (RoomPhase::Lobby, RoomEvent::StartGame) => RoomPhase::SongSelection,
        (RoomPhase::SongSelection, RoomEvent::SubmissionsComplete) => RoomPhase::Rating,
        (RoomPhase::Rating, RoomEvent::RatingComplete) => RoomPhase::Results,
        (RoomPhase::Results, RoomEvent::NextRound) => RoomPhase::SongSelection,
        (RoomPhase::Results, RoomEvent::FinishGame) => RoomPhase::GameOver,
        (_, RoomEvent::ReturnToLobby) => RoomPhase::Lobby,
        (from, RoomEvent::InsufficientPlayers) if from != RoomPhase::Lobby => RoomPhase::Lobby,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(phase: RoomPhase, event: RoomEvent) -> RoomPhase {
        compute_transition(phase, event).unwrap()
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut phase = RoomPhase::Lobby;

        phase = apply(phase, RoomEvent::StartGame);
        assert_eq!(phase, RoomPhase::SongSelection);

        phase = apply(phase, RoomEvent::SubmissionsComplete);
        assert_eq!(phase, RoomPhase::Rating);

        phase = apply(phase, RoomEvent::RatingComplete);
        assert_eq!(phase, RoomPhase::Results);

        phase = apply(phase, RoomEvent::NextRound);
        assert_eq!(phase, RoomPhase::SongSelection);

        phase = apply(phase, RoomEvent::SubmissionsComplete);
        phase = apply(phase, RoomEvent::RatingComplete);
        phase = apply(phase, RoomEvent::FinishGame);
        assert_eq!(phase, RoomPhase::GameOver);

        phase = apply(phase, RoomEvent::ReturnToLobby);
        assert_eq!(phase, RoomPhase::Lobby);
    }

    #[test]
    fn insufficient_players_forces_lobby_from_every_live_phase() {
        for from in [
            RoomPhase::SongSelection,
            RoomPhase::Rating,
            RoomPhase::Results,
            RoomPhase::GameOver,
        ] {
            assert_eq!(
                apply(from, RoomEvent::InsufficientPlayers),
                RoomPhase::Lobby
            );
        }
    }

    #[test]
    fn insufficient_players_is_invalid_in_lobby() {
        let err = compute_transition(RoomPhase::Lobby, RoomEvent::InsufficientPlayers).unwrap_err();
        assert_eq!(err.from, RoomPhase::Lobby);
        assert_eq!(err.event, RoomEvent::InsufficientPlayers);
    }

    #[test]
    fn return_to_lobby_is_always_accepted() {
        for from in [
            RoomPhase::Lobby,
            RoomPhase::SongSelection,
            RoomPhase::Rating,
            RoomPhase::Results,
            RoomPhase::GameOver,
        ] {
            assert_eq!(apply(from, RoomEvent::ReturnToLobby), RoomPhase::Lobby);
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let err = compute_transition(RoomPhase::Lobby, RoomEvent::RatingComplete).unwrap_err();
        assert_eq!(err.from, RoomPhase::Lobby);
        assert_eq!(err.event, RoomEvent::RatingComplete);

        assert!(compute_transition(RoomPhase::Rating, RoomEvent::StartGame).is_err());
        assert!(compute_transition(RoomPhase::GameOver, RoomEvent::NextRound).is_err());
    }
}
