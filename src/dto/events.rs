use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::phase::VisiblePhase,
    state::room::{Entry, Player, Room, RoundResult},
};

/// Events pushed to clients, either as room broadcasts or as direct replies.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Issued once per socket so the client learns its connection id.
    Connected {
        /// Connection id assigned by the server.
        id: Uuid,
    },
    /// Direct answer to `host-room`.
    HostAck {
        /// Whether the room was created.
        success: bool,
        /// Code of the created room on success.
        code: Option<String>,
    },
    /// Direct answer to `join-room`.
    JoinAck {
        /// Whether the join succeeded.
        success: bool,
        /// Failure reason when `success` is false.
        message: Option<String>,
    },
    /// The roster changed (join, leave, rename, ready toggle, host change).
    RosterChanged {
        /// Full roster in join order.
        players: Vec<PlayerSummary>,
    },
    /// The room moved to a new phase.
    PhaseChanged {
        /// Phase the room is now in.
        phase: VisiblePhase,
        /// Current 1-based round index.
        round: u32,
    },
    /// A new prompt was drawn for the round.
    PromptChanged {
        /// The prompt text.
        prompt: String,
    },
    /// The room settings were overwritten.
    SettingsUpdated {
        /// Number of rounds per game.
        round_count: u32,
        /// Round duration in seconds.
        round_seconds: u32,
        /// Prompts drawn from at the start of each round.
        prompt_pool: Vec<String>,
    },
    /// Progress of entry submissions for the current round.
    SubmissionProgress {
        /// Entries submitted so far.
        submitted: usize,
        /// Players expected to submit.
        total: usize,
    },
    /// A specific player locked in their entry.
    EntrySubmitted {
        /// Connection id of the submitting player.
        player_id: Uuid,
        /// Display name of the submitting player.
        player_name: String,
    },
    /// The rating sub-loop moved to a new entry.
    RatingRoundStarted {
        /// Zero-based index of the entry being rated.
        rating_index: usize,
        /// Total entries queued for rating this round.
        total_entries: usize,
        /// Snapshot of the entry to rate.
        entry: EntrySnapshot,
    },
    /// Vote progress for the entry currently being rated.
    RatingProgress {
        /// Votes cast so far (including the owner's auto-skip).
        submitted: usize,
        /// Players in the room.
        total: usize,
        /// Entry the votes target.
        entry_id: String,
    },
    /// Ranking of the finished round.
    RoundResults {
        /// Entries ranked by total score, descending.
        entries: Vec<RankedEntry>,
        /// Entry id of the round winner, if any entries were rated.
        winner_entry_id: Option<String>,
    },
    /// A recoverable problem the clients should display.
    RoomError {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerEvent {
    /// Build a `roster-changed` event from the room's current roster.
    pub fn roster_of(room: &Room) -> Self {
        Self::RosterChanged {
            players: room
                .players
                .iter()
                .map(|(id, player)| PlayerSummary::from((*id, player)))
                .collect(),
        }
    }

    /// Build a `phase-changed` event from the room's current phase and round.
    pub fn phase_of(room: &Room) -> Self {
        Self::PhaseChanged {
            phase: VisiblePhase::from(&room.phase),
            round: room.current_round,
        }
    }

    /// Build a `round-results` event from a stored round result.
    pub fn results_of(result: &RoundResult) -> Self {
        let winner = result.winner_entry_id.clone();
        Self::RoundResults {
            entries: result
                .ranked
                .iter()
                .map(|(entry, total)| RankedEntry {
                    is_winner: winner.as_deref() == Some(entry.entry_id.as_str()),
                    entry: EntrySnapshot::from(entry),
                    total_score: *total,
                })
                .collect(),
            winner_entry_id: winner,
        }
    }
}

/// One roster line as shown to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Connection id of the player.
    pub id: Uuid,
    /// Display name (may be empty until the player sets one).
    pub name: String,
    /// Whether this player is the room host.
    pub is_host: bool,
    /// Whether this player flagged themselves ready.
    pub is_ready: bool,
}

impl From<(Uuid, &Player)> for PlayerSummary {
    fn from((id, player): (Uuid, &Player)) -> Self {
        Self {
            id,
            name: player.name.clone(),
            is_host: player.is_host,
            is_ready: player.is_ready,
        }
    }
}

/// Snapshot of a submitted entry as shown to raters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EntrySnapshot {
    /// Opaque identifier of the picked track.
    pub entry_id: String,
    /// Connection id of the owning player.
    pub player_id: Uuid,
    /// Display name of the owning player.
    pub player_name: String,
    /// Track title.
    pub title: String,
    /// Track artist.
    pub artist: String,
    /// Optional artwork URL.
    pub artwork_url: Option<String>,
}

impl From<&Entry> for EntrySnapshot {
    fn from(entry: &Entry) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            player_id: entry.owner,
            player_name: entry.owner_name.clone(),
            title: entry.title.clone(),
            artist: entry.artist.clone(),
            artwork_url: entry.artwork_url.clone(),
        }
    }
}

/// One line of the round ranking.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankedEntry {
    /// The ranked entry.
    pub entry: EntrySnapshot,
    /// Sum of all ratings the entry received.
    pub total_score: u32,
    /// Whether this entry won the round.
    pub is_winner: bool,
}
