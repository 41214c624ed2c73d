use std::{collections::HashMap, time::SystemTime};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::state::state_machine::RoomPhase;

/// Minimum player count required to stay outside the lobby.
pub const MIN_PLAYERS: usize = 3;

/// Tunable game settings for a room.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Number of rounds per game.
    pub round_count: u32,
    /// Round duration in seconds. Carried for clients; the coordinator
    /// does not enforce a deadline itself.
    pub round_seconds: u32,
    /// Prompts drawn from uniformly at the start of each round.
    pub prompt_pool: Vec<String>,
}

/// A player joined to a room. Keyed by connection id in the roster.
#[derive(Debug, Clone)]
pub struct Player {
    /// Display name; may be empty, which blocks readiness.
    pub name: String,
    /// Whether this player is the room host. Exactly one player holds this
    /// flag whenever the roster is non-empty.
    pub is_host: bool,
    /// Whether this player flagged themselves ready to start.
    pub is_ready: bool,
}

/// A player's single round submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Opaque identifier of the picked track.
    pub entry_id: String,
    /// Connection id of the owning player.
    pub owner: Uuid,
    /// Owner display name at submission time.
    pub owner_name: String,
    /// Track title.
    pub title: String,
    /// Track artist.
    pub artist: String,
    /// Optional artwork URL.
    pub artwork_url: Option<String>,
}

/// One recorded rating for an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingRecord {
    /// Connection id of the rater.
    pub rater: Uuid,
    /// Rating from 1 to 5. Self-skip sentinels never get recorded here.
    pub rating: u8,
}

/// Outcome of a finished round, retained until overwritten by the next one.
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// Entries with their summed scores, ranked descending. Ties keep the
    /// original submission order.
    pub ranked: Vec<(Entry, u32)>,
    /// Entry id of the round winner, if any entries were rated.
    pub winner_entry_id: Option<String>,
}

/// One isolated game session and all of its transient state.
///
/// A room is only ever mutated while its owning mutex is held; the phase
/// engine and the room service are the sole writers.
#[derive(Debug)]
pub struct Room {
    /// Six-character room code, unique among live rooms.
    pub code: String,
    /// Roster in join order; the order drives host fallback.
    pub players: IndexMap<Uuid, Player>,
    /// Current settings; mutable any time, read at round boundaries.
    pub settings: RoomSettings,
    /// Current phase of the room state machine.
    pub phase: RoomPhase,
    /// 1-based round index, set to 1 on game start.
    pub current_round: u32,
    /// Prompt for the round in progress, if any.
    pub current_prompt: Option<String>,
    /// Entries submitted this round, in arrival order.
    pub submissions: IndexMap<Uuid, Entry>,
    /// Snapshot of entries to rate this round, fixed when submissions
    /// complete; keeps raw submission-arrival order.
    pub rating_queue: Vec<Entry>,
    /// Index into `rating_queue` naming the entry currently being rated.
    pub rating_cursor: usize,
    /// Votes on the cursor entry, in arrival order. The owner's auto-skip
    /// sentinel may appear here but never reaches `aggregate_ratings`.
    pub votes_for_current: IndexMap<Uuid, u8>,
    /// All ratings collected this round, keyed by entry id.
    pub aggregate_ratings: HashMap<String, Vec<RatingRecord>>,
    /// Ranking of the last finished round.
    pub last_round_result: Option<RoundResult>,
    /// Tie-breaking anchor for host re-election on rejoin.
    pub original_host: Uuid,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl Room {
    /// Create a room with the creator auto-joined as its sole player and host.
    pub fn new(code: String, creator: Uuid, settings: RoomSettings) -> Self {
        let mut players = IndexMap::new();
        players.insert(
            creator,
            Player {
                name: String::new(),
                is_host: true,
                is_ready: false,
            },
        );

        Self {
            code,
            players,
            settings,
            phase: RoomPhase::Lobby,
            current_round: 1,
            current_prompt: None,
            submissions: IndexMap::new(),
            rating_queue: Vec::new(),
            rating_cursor: 0,
            votes_for_current: IndexMap::new(),
            aggregate_ratings: HashMap::new(),
            last_round_result: None,
            original_host: creator,
            created_at: SystemTime::now(),
        }
    }

    /// Connection id of the current host, if the roster is non-empty.
    pub fn host_id(&self) -> Option<Uuid> {
        self.players
            .iter()
            .find(|(_, player)| player.is_host)
            .map(|(id, _)| *id)
    }

    /// Whether the room has no players left.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Connection ids of every player, in join order.
    pub fn member_ids(&self) -> Vec<Uuid> {
        self.players.keys().copied().collect()
    }

    /// Insert a player, or update the existing entry's name in place on
    /// rejoin. At most one roster entry exists per connection id.
    ///
    /// The original host keeps (or regains) the host flag; a hostless room
    /// adopts the joiner as host and re-anchors `original_host`.
    pub fn upsert_player(&mut self, conn: Uuid, name: String) {
        if let Some(player) = self.players.get_mut(&conn) {
            player.name = name;
            return;
        }

        let is_host = conn == self.original_host || self.host_id().is_none();
        if is_host && conn != self.original_host {
            self.original_host = conn;
        }

        self.players.insert(
            conn,
            Player {
                name,
                is_host,
                is_ready: false,
            },
        );
    }

    /// Update one player's name and ready flag in place.
    ///
    /// An empty display name blocks readiness. Unknown connection ids are a
    /// no-op, returning `false`.
    pub fn update_player(&mut self, conn: Uuid, name: String, is_ready: bool) -> bool {
        let Some(player) = self.players.get_mut(&conn) else {
            return false;
        };
        player.is_ready = is_ready && !name.trim().is_empty();
        player.name = name;
        true
    }

    /// Remove a player, re-electing the earliest remaining joiner as host if
    /// the host left. Returns `false` if the connection was not a member.
    pub fn remove_player(&mut self, conn: Uuid) -> bool {
        let Some(removed) = self.players.shift_remove(&conn) else {
            return false;
        };

        if removed.is_host
            && let Some((&first, player)) = self.players.iter_mut().next()
        {
            player.is_host = true;
            self.original_host = first;
        }

        true
    }

    /// Whether every current player has submitted an entry.
    ///
    /// Evaluated against the live roster, never a cached count, so roster
    /// churn racing a submission cannot wedge the check.
    pub fn all_submitted(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .keys()
                .all(|id| self.submissions.contains_key(id))
    }

    /// Entry currently up for rating, if the cursor is in range.
    pub fn current_rating_entry(&self) -> Option<&Entry> {
        self.rating_queue.get(self.rating_cursor)
    }

    /// Whether every non-owner player has voted on the cursor entry.
    ///
    /// The owner can never vote on their own entry, so they are excluded
    /// from the predicate rather than expected to cast a sentinel.
    pub fn rating_round_complete(&self) -> bool {
        let Some(entry) = self.current_rating_entry() else {
            return false;
        };
        self.players
            .keys()
            .all(|id| self.votes_for_current.contains_key(id) || *id == entry.owner)
    }

    /// Drop all round-scoped state: submissions, rating queue and votes,
    /// aggregated ratings, and the last result. Roster and settings survive.
    pub fn clear_round_state(&mut self) {
        self.submissions.clear();
        self.rating_queue.clear();
        self.rating_cursor = 0;
        self.votes_for_current.clear();
        self.aggregate_ratings.clear();
        self.last_round_result = None;
        self.current_prompt = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RoomSettings {
        RoomSettings {
            round_count: 3,
            round_seconds: 30,
            prompt_pool: vec!["prompt".into()],
        }
    }

    fn room_with_players(count: usize) -> (Room, Vec<Uuid>) {
        let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        let mut room = Room::new("AB12CD".into(), ids[0], settings());
        for (index, id) in ids.iter().enumerate().skip(1) {
            room.upsert_player(*id, format!("player-{index}"));
        }
        (room, ids)
    }

    fn host_count(room: &Room) -> usize {
        room.players.values().filter(|p| p.is_host).count()
    }

    #[test]
    fn creator_is_sole_host() {
        let (room, ids) = room_with_players(3);
        assert_eq!(host_count(&room), 1);
        assert_eq!(room.host_id(), Some(ids[0]));
    }

    #[test]
    fn rejoin_updates_in_place() {
        let (mut room, ids) = room_with_players(2);
        room.upsert_player(ids[1], "renamed".into());
        assert_eq!(room.players.len(), 2);
        assert_eq!(room.players[&ids[1]].name, "renamed");
        assert_eq!(host_count(&room), 1);
    }

    #[test]
    fn host_falls_back_to_earliest_joiner() {
        let (mut room, ids) = room_with_players(3);
        assert!(room.remove_player(ids[0]));
        assert_eq!(room.host_id(), Some(ids[1]));
        assert_eq!(room.original_host, ids[1]);
        assert_eq!(host_count(&room), 1);
    }

    #[test]
    fn empty_room_has_no_host() {
        let (mut room, ids) = room_with_players(1);
        room.remove_player(ids[0]);
        assert!(room.is_empty());
        assert_eq!(room.host_id(), None);
    }

    #[test]
    fn hostless_room_adopts_joiner_as_host() {
        let (mut room, ids) = room_with_players(1);
        room.remove_player(ids[0]);

        let newcomer = Uuid::new_v4();
        room.upsert_player(newcomer, "new".into());
        assert_eq!(room.host_id(), Some(newcomer));
        assert_eq!(room.original_host, newcomer);
    }

    #[test]
    fn empty_name_blocks_readiness() {
        let (mut room, ids) = room_with_players(2);
        assert!(room.update_player(ids[1], "  ".into(), true));
        assert!(!room.players[&ids[1]].is_ready);

        assert!(room.update_player(ids[1], "sam".into(), true));
        assert!(room.players[&ids[1]].is_ready);
    }

    #[test]
    fn all_submitted_tracks_live_roster() {
        let (mut room, ids) = room_with_players(3);
        for id in &ids[..2] {
            room.submissions.insert(
                *id,
                Entry {
                    entry_id: format!("t-{id}"),
                    owner: *id,
                    owner_name: String::new(),
                    title: String::new(),
                    artist: String::new(),
                    artwork_url: None,
                },
            );
        }
        assert!(!room.all_submitted());

        // The laggard leaving makes the remaining submissions complete.
        room.remove_player(ids[2]);
        assert!(room.all_submitted());
    }
}
