//! Broadcast gateway: fan-out of engine-produced events to every connection
//! joined to a room.

use std::time::Duration;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::{dto::events::ServerEvent, state::SharedState, state::engine::Broadcast};

/// Fixed delay applied to paced broadcasts so client transition animations
/// can settle. Purely cosmetic; never gates correctness.
const PACING_DELAY: Duration = Duration::from_millis(500);

/// Serialize an event and push it onto a client's writer channel.
///
/// Serialization failure is a bug in this crate and is only logged; a
/// closed channel means the client is mid-disconnect and is ignored.
pub fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &ServerEvent) {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize server event `{event:?}`");
            return;
        }
    };

    let _ = tx.send(Message::Text(payload.into()));
}

/// Send an event directly to one connection by id.
pub fn send_to_connection(state: &SharedState, conn: &Uuid, event: &ServerEvent) {
    if let Some(connection) = state.connection(conn) {
        send_event(&connection.tx, event);
    }
}

/// Deliver a broadcast plan to every listed member, in order.
///
/// Immediate broadcasts go out synchronously; paced ones are handed to a
/// spawned task so the pacing sleep never runs while a room lock is held
/// and a stalled client cannot hold up the caller.
pub fn dispatch(state: &SharedState, members: &[Uuid], broadcasts: Vec<Broadcast>) {
    for broadcast in broadcasts {
        if broadcast.paced {
            let state = state.clone();
            let members = members.to_vec();
            tokio::spawn(async move {
                tokio::time::sleep(PACING_DELAY).await;
                broadcast_event(&state, &members, &broadcast.event);
            });
        } else {
            broadcast_event(state, members, &broadcast.event);
        }
    }
}

fn broadcast_event(state: &SharedState, members: &[Uuid], event: &ServerEvent) {
    for conn in members {
        send_to_connection(state, conn, event);
    }
}
