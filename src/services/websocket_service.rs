//! WebSocket connection lifecycle and message dispatch.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{events::ServerEvent, ws::ClientMessage},
    error::ServiceError,
    services::{game_service, room_service, ws_events},
    state::{ClientConnection, SharedState},
};

/// Handle the full lifecycle for an individual client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let conn = Uuid::new_v4();
    state.register_connection(ClientConnection {
        id: conn,
        tx: outbound_tx.clone(),
    });
    ws_events::send_event(&outbound_tx, &ServerEvent::Connected { id: conn });
    info!(%conn, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(message) => handle_message(&state, conn, &outbound_tx, message).await,
                Err(err) => {
                    warn!(%conn, error = %err, "failed to parse or validate client message");
                    ws_events::send_event(
                        &outbound_tx,
                        &ServerEvent::RoomError {
                            message: err.to_string(),
                        },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%conn, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%conn, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::on_disconnect(&state, conn).await;
    info!(%conn, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Dispatch one parsed client message to the matching service operation.
async fn handle_message(
    state: &SharedState,
    conn: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::HostRoom => {
            let ack = match room_service::host_room(state, conn).await {
                Ok(code) => ServerEvent::HostAck {
                    success: true,
                    code: Some(code),
                },
                Err(err) => {
                    warn!(%conn, error = %err, "failed to host room");
                    ServerEvent::HostAck {
                        success: false,
                        code: None,
                    }
                }
            };
            ws_events::send_event(outbound_tx, &ack);
        }
        ClientMessage::JoinRoom { code, name } => {
            let ack = match room_service::join_room(state, conn, &code, name).await {
                Ok(()) => ServerEvent::JoinAck {
                    success: true,
                    message: None,
                },
                Err(err) => ServerEvent::JoinAck {
                    success: false,
                    message: Some(err.to_string()),
                },
            };
            ws_events::send_event(outbound_tx, &ack);
        }
        ClientMessage::UpdatePlayer {
            code,
            name,
            is_ready,
        } => {
            report(
                outbound_tx,
                conn,
                room_service::update_player(state, conn, &code, name, is_ready).await,
            );
        }
        ClientMessage::LeaveRoom { code } => {
            // A stale code on leave is not worth a notice.
            let _ = room_service::leave_room(state, conn, &code).await;
        }
        ClientMessage::UpdateSettings {
            code,
            round_count,
            round_seconds,
            prompt_pool,
        } => {
            report(
                outbound_tx,
                conn,
                room_service::update_settings(
                    state,
                    conn,
                    &code,
                    round_count,
                    round_seconds,
                    prompt_pool,
                )
                .await,
            );
        }
        ClientMessage::StartGame { code } => {
            report(
                outbound_tx,
                conn,
                game_service::start_game(state, conn, &code).await,
            );
        }
        ClientMessage::SubmitEntry {
            code,
            entry_id,
            title,
            artist,
            artwork_url,
        } => {
            report(
                outbound_tx,
                conn,
                game_service::submit_entry(state, conn, &code, entry_id, title, artist, artwork_url)
                    .await,
            );
        }
        ClientMessage::SubmitRating {
            code,
            entry_id,
            rating,
        } => {
            report(
                outbound_tx,
                conn,
                game_service::submit_rating(state, conn, &code, &entry_id, rating).await,
            );
        }
        ClientMessage::AdvanceRound { code } => {
            report(outbound_tx, conn, game_service::advance_round(state, &code).await);
        }
        ClientMessage::ReturnToLobby { code } => {
            report(
                outbound_tx,
                conn,
                game_service::return_to_lobby(state, &code).await,
            );
        }
        ClientMessage::RequestPrompt { code } => {
            game_service::request_prompt(state, conn, &code).await;
        }
        ClientMessage::RequestSubmissionStatus { code } => {
            game_service::request_submission_status(state, conn, &code).await;
        }
        ClientMessage::RequestRoundResults { code } => {
            game_service::request_round_results(state, conn, &code).await;
        }
        ClientMessage::Unknown => {
            warn!(%conn, "ignoring unknown message type");
        }
    }
}

/// Surface a fire-and-forget failure to the offending client only.
///
/// Precondition violations leave the room untouched; the notice lets a
/// client whose UI got out of sync resynchronize.
fn report(
    outbound_tx: &mpsc::UnboundedSender<Message>,
    conn: Uuid,
    result: Result<(), ServiceError>,
) {
    if let Err(err) = result {
        warn!(%conn, error = %err, "client intent rejected");
        ws_events::send_event(
            outbound_tx,
            &ServerEvent::RoomError {
                message: err.to_string(),
            },
        );
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
