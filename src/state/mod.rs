//! Shared application state: the connection registry and the live room store.

pub mod engine;
pub mod room;
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::{config::AppConfig, state::room::Room};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected client.
pub struct ClientConnection {
    /// Server-assigned connection id.
    pub id: Uuid,
    /// Channel feeding the connection's dedicated writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state.
///
/// Rooms live behind their own mutex inside a map keyed by room code, so
/// intents targeting different rooms proceed in parallel while everything
/// touching one room is serialized. The membership index ties each
/// connection to at most one room for O(1) disconnect handling.
pub struct AppState {
    config: AppConfig,
    connections: DashMap<Uuid, ClientConnection>,
    memberships: DashMap<Uuid, String>,
    rooms: DashMap<String, Arc<Mutex<Room>>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config,
            connections: DashMap::new(),
            memberships: DashMap::new(),
            rooms: DashMap::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register a freshly upgraded client connection.
    pub fn register_connection(&self, connection: ClientConnection) {
        self.connections.insert(connection.id, connection);
    }

    /// Look up a connection's writer channel by id.
    pub fn connection(&self, id: &Uuid) -> Option<ClientConnection> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Drop a connection from the registry, returning the room code it was
    /// still bound to, if any.
    pub fn remove_connection(&self, id: &Uuid) -> Option<String> {
        self.connections.remove(id);
        self.memberships.remove(id).map(|(_, code)| code)
    }

    /// Handle to a live room by code.
    pub fn room(&self, code: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Insert a new room if its code is free. Returns `false` on collision.
    pub fn try_insert_room(&self, room: Room) -> bool {
        match self.rooms.entry(room.code.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(room)));
                true
            }
        }
    }

    /// Room code a connection is currently joined to, if any.
    pub fn membership(&self, conn: &Uuid) -> Option<String> {
        self.memberships.get(conn).map(|entry| entry.value().clone())
    }

    /// Bind a connection to a room, returning the previous binding if any.
    pub fn bind_membership(&self, conn: Uuid, code: &str) -> Option<String> {
        self.memberships.insert(conn, code.to_string())
    }

    /// Remove a connection's room binding.
    pub fn unbind_membership(&self, conn: &Uuid) {
        self.memberships.remove(conn);
    }

    /// Number of currently live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Sweep rooms whose roster has emptied out. Returns how many were
    /// removed. Rooms whose lock is currently held are skipped and picked
    /// up on the next sweep.
    pub fn reap_empty_rooms(&self) -> usize {
        let codes: Vec<String> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        let mut reaped = 0;

        for code in codes {
            let removed = self.rooms.remove_if(&code, |_, room| {
                room.try_lock().map(|room| room.is_empty()).unwrap_or(false)
            });
            if removed.is_some() {
                reaped += 1;
            }
        }

        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_room(code: &str, with_player: bool) -> Room {
        let creator = Uuid::new_v4();
        let mut room = Room::new(code.to_string(), creator, AppConfig::default().default_settings());
        if !with_player {
            room.remove_player(creator);
        }
        room
    }

    #[test]
    fn room_codes_are_unique_among_live_rooms() {
        let state = AppState::new(AppConfig::default());
        assert!(state.try_insert_room(test_room("AAAAAA", true)));
        assert!(!state.try_insert_room(test_room("AAAAAA", true)));
        assert_eq!(state.room_count(), 1);
    }

    #[test]
    fn reaper_collects_only_empty_rooms() {
        let state = AppState::new(AppConfig::default());
        assert!(state.try_insert_room(test_room("EMPTY1", false)));
        assert!(state.try_insert_room(test_room("BUSY01", true)));

        assert_eq!(state.reap_empty_rooms(), 1);
        assert!(state.room("EMPTY1").is_none());
        assert!(state.room("BUSY01").is_some());
    }

    #[test]
    fn membership_binding_replaces_previous() {
        let state = AppState::new(AppConfig::default());
        let conn = Uuid::new_v4();
        assert_eq!(state.bind_membership(conn, "AAAAAA"), None);
        assert_eq!(
            state.bind_membership(conn, "BBBBBB"),
            Some("AAAAAA".to_string())
        );
        assert_eq!(state.membership(&conn), Some("BBBBBB".to_string()));
    }
}
