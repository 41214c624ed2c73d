//! Room manager: creation, joining, roster and settings mutation.
//!
//! Every operation resolves the room by code, mutates it under the room's
//! own mutex, and dispatches the resulting broadcasts after the lock is
//! released. Nothing here blocks on I/O inside the critical section.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{events::ServerEvent, validation::ROOM_CODE_LENGTH},
    error::ServiceError,
    services::ws_events,
    state::{SharedState, engine, engine::Broadcast, room::Room},
};

/// Characters a room code is drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Collision retry budget for code generation. 36^6 codes make even one
/// retry unlikely at the target scale of tens of rooms.
const MAX_CODE_ATTEMPTS: usize = 64;

/// Create a new room with the caller auto-joined as sole player and host.
/// Returns the generated room code.
pub async fn host_room(state: &SharedState, conn: Uuid) -> Result<String, ServiceError> {
    // A connection holds at most one membership; leave any previous room.
    detach_from_current_room(state, conn).await;

    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_code();
        let room = Room::new(code.clone(), conn, state.config().default_settings());
        if state.try_insert_room(room) {
            state.bind_membership(conn, &code);
            info!(%code, %conn, "room created");
            return Ok(code);
        }
    }

    Err(ServiceError::CodeSpaceExhausted)
}

/// Join (or rejoin) a room by code.
///
/// Rejoining updates the existing roster entry in place; joining mid-game
/// also replays the current phase and prompt so the client can catch up.
pub async fn join_room(
    state: &SharedState,
    conn: Uuid,
    code: &str,
    name: String,
) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        return Err(ServiceError::RoomNotFound(code.to_string()));
    };

    if state.membership(&conn).is_some_and(|previous| previous != code) {
        detach_from_current_room(state, conn).await;
    }

    let (members, broadcasts) = {
        let mut room = room_ref.lock().await;
        // The reaper can remove an empty room between the map lookup and
        // this lock; joining the orphaned copy would bind the player to a
        // code that no longer resolves. A replacement room under the same
        // code counts as gone too.
        let still_live = state
            .room(code)
            .is_some_and(|current| Arc::ptr_eq(&current, &room_ref));
        if !still_live {
            return Err(ServiceError::RoomNotFound(code.to_string()));
        }
        room.upsert_player(conn, name);

        let mut broadcasts = vec![
            Broadcast::now(ServerEvent::roster_of(&room)),
            Broadcast::now(ServerEvent::phase_of(&room)),
        ];
        if let Some(prompt) = &room.current_prompt {
            broadcasts.push(Broadcast::now(ServerEvent::PromptChanged {
                prompt: prompt.clone(),
            }));
        }

        (room.member_ids(), broadcasts)
    };

    state.bind_membership(conn, code);
    info!(%code, %conn, "player joined room");
    ws_events::dispatch(state, &members, broadcasts);
    Ok(())
}

/// Remove a player from a room, re-electing a host and checking viability.
pub async fn leave_room(state: &SharedState, conn: Uuid, code: &str) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        state.unbind_membership(&conn);
        return Err(ServiceError::RoomNotFound(code.to_string()));
    };

    let outcome = {
        let mut room = room_ref.lock().await;
        if !room.remove_player(conn) {
            None
        } else {
            let mut broadcasts = vec![Broadcast::now(ServerEvent::roster_of(&room))];
            broadcasts.extend(engine::check_viability(&mut room));
            Some((room.member_ids(), broadcasts))
        }
    };

    state.unbind_membership(&conn);

    if let Some((members, broadcasts)) = outcome {
        info!(%code, %conn, "player left room");
        ws_events::dispatch(state, &members, broadcasts);
    }
    Ok(())
}

/// Update one player's display name and ready flag.
pub async fn update_player(
    state: &SharedState,
    conn: Uuid,
    code: &str,
    name: String,
    is_ready: bool,
) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        debug!(%code, "update-player for unknown room ignored");
        return Ok(());
    };

    let outcome = {
        let mut room = room_ref.lock().await;
        room.update_player(conn, name, is_ready)
            .then(|| (room.member_ids(), ServerEvent::roster_of(&room)))
    };

    if let Some((members, roster)) = outcome {
        ws_events::dispatch(state, &members, vec![Broadcast::now(roster)]);
    }
    Ok(())
}

/// Overwrite the room settings. Host-only; takes effect from the next round.
pub async fn update_settings(
    state: &SharedState,
    conn: Uuid,
    code: &str,
    round_count: u32,
    round_seconds: u32,
    prompt_pool: Vec<String>,
) -> Result<(), ServiceError> {
    let Some(room_ref) = state.room(code) else {
        debug!(%code, "update-settings for unknown room ignored");
        return Ok(());
    };

    let (members, updated) = {
        let mut room = room_ref.lock().await;
        if room.host_id() != Some(conn) {
            return Err(ServiceError::InvalidState(
                "only the host can change the settings".into(),
            ));
        }
        room.settings.round_count = round_count;
        room.settings.round_seconds = round_seconds;
        room.settings.prompt_pool = prompt_pool;

        (
            room.member_ids(),
            ServerEvent::SettingsUpdated {
                round_count,
                round_seconds,
                prompt_pool: room.settings.prompt_pool.clone(),
            },
        )
    };

    ws_events::dispatch(state, &members, vec![Broadcast::now(updated)]);
    Ok(())
}

/// Tear down a closed connection: drop its registration and route a leave
/// through whichever room it was still joined to.
pub async fn on_disconnect(state: &SharedState, conn: Uuid) {
    if let Some(code) = state.remove_connection(&conn) {
        // The room may already be gone (reaped); that is fine.
        let _ = leave_room(state, conn, &code).await;
    }
}

/// Leave whatever room the connection is currently bound to, if any.
async fn detach_from_current_room(state: &SharedState, conn: Uuid) {
    if let Some(previous) = state.membership(&conn) {
        let _ = leave_room(state, conn, &previous).await;
    }
}

/// Generate a random 6-character room code.
fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[index] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::validation::validate_room_code;

    #[test]
    fn generated_codes_pass_wire_validation() {
        for _ in 0..100 {
            let code = generate_code();
            assert!(validate_room_code(&code).is_ok(), "bad code: {code}");
        }
    }
}
