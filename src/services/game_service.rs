//! Game flow intents: starting a game, submitting entries and ratings,
//! advancing rounds, and resetting to the lobby.
//!
//! Each operation locks the target room, applies the phase engine, and
//! dispatches the returned broadcasts once the lock is dropped. Stale room
//! codes degrade to silent no-ops, matching the fire-and-forget contract
//! of these messages; precondition violations bubble up so the socket
//! layer can send the caller a defensive `room-error`.

use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::events::ServerEvent,
    error::ServiceError,
    services::ws_events,
    state::{SharedState, engine, state_machine::RoomPhase},
};

/// Start the game from the lobby (transition 1).
pub async fn start_game(state: &SharedState, conn: Uuid, code: &str) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        debug!(%code, "start-game for unknown room ignored");
        return Ok(());
    };

    let (members, broadcasts) = {
        let mut room = room_ref.lock().await;
        let broadcasts = engine::start_game(&mut room, conn)?;
        (room.member_ids(), broadcasts)
    };

    ws_events::dispatch(state, &members, broadcasts);
    Ok(())
}

/// Record a player's entry; may trigger the move into the rating phase.
pub async fn submit_entry(
    state: &SharedState,
    conn: Uuid,
    code: &str,
    entry_id: String,
    title: String,
    artist: String,
    artwork_url: Option<String>,
) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        debug!(%code, "submit-entry for unknown room ignored");
        return Ok(());
    };

    let (members, broadcasts) = {
        let mut room = room_ref.lock().await;
        let broadcasts =
            engine::record_submission(&mut room, conn, entry_id, title, artist, artwork_url)?;
        (room.member_ids(), broadcasts)
    };

    ws_events::dispatch(state, &members, broadcasts);
    Ok(())
}

/// Record a vote on the entry currently being rated; may advance the
/// rating sub-loop or finish the round.
pub async fn submit_rating(
    state: &SharedState,
    conn: Uuid,
    code: &str,
    entry_id: &str,
    rating: u8,
) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        debug!(%code, "submit-rating for unknown room ignored");
        return Ok(());
    };

    let (members, broadcasts) = {
        let mut room = room_ref.lock().await;
        let broadcasts = engine::record_rating(&mut room, conn, entry_id, rating)?;
        (room.member_ids(), broadcasts)
    };

    ws_events::dispatch(state, &members, broadcasts);
    Ok(())
}

/// Advance from the results screen (transition 5 or 6).
pub async fn advance_round(state: &SharedState, code: &str) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        debug!(%code, "advance-round for unknown room ignored");
        return Ok(());
    };

    let (members, broadcasts) = {
        let mut room = room_ref.lock().await;
        let broadcasts = engine::advance_round(&mut room)?;
        (room.member_ids(), broadcasts)
    };

    ws_events::dispatch(state, &members, broadcasts);
    Ok(())
}

/// Reset the room to the lobby, keeping roster and settings.
pub async fn return_to_lobby(state: &SharedState, code: &str) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        debug!(%code, "return-to-lobby for unknown room ignored");
        return Ok(());
    };

    let (members, broadcasts) = {
        let mut room = room_ref.lock().await;
        let broadcasts = engine::return_to_lobby(&mut room);
        (room.member_ids(), broadcasts)
    };

    ws_events::dispatch(state, &members, broadcasts);
    Ok(())
}

/// Replay the current prompt to the requester (reconnect convenience).
pub async fn request_prompt(state: &SharedState, conn: Uuid, code: &str) {
    let Some(room_ref) = state.room(code) else {
        return;
    };

    let prompt = room_ref.lock().await.current_prompt.clone();
    if let Some(prompt) = prompt {
        ws_events::send_to_connection(state, &conn, &ServerEvent::PromptChanged { prompt });
    }
}

/// Tell the requester how submissions are progressing, and whether their
/// own entry is already locked in.
pub async fn request_submission_status(state: &SharedState, conn: Uuid, code: &str) {
    let Some(room_ref) = state.room(code) else {
        return;
    };

    let (progress, own_entry) = {
        let room = room_ref.lock().await;
        let own = room.submissions.get(&conn).map(|entry| ServerEvent::EntrySubmitted {
            player_id: entry.owner,
            player_name: entry.owner_name.clone(),
        });
        (
            ServerEvent::SubmissionProgress {
                submitted: room.submissions.len(),
                total: room.players.len(),
            },
            own,
        )
    };

    ws_events::send_to_connection(state, &conn, &progress);
    if let Some(event) = own_entry {
        ws_events::send_to_connection(state, &conn, &event);
    }
}

/// Replay the last round results to the requester while they are shown.
pub async fn request_round_results(state: &SharedState, conn: Uuid, code: &str) {
    let Some(room_ref) = state.room(code) else {
        return;
    };

    let results = {
        let room = room_ref.lock().await;
        (room.phase == RoomPhase::Results)
            .then(|| room.last_round_result.as_ref().map(ServerEvent::results_of))
            .flatten()
    };

    if let Some(event) = results {
        ws_events::send_to_connection(state, &conn, &event);
    }
}
