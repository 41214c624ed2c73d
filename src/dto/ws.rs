use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationError;

use crate::dto::validation::{validate_rating, validate_room_code};

/// Messages accepted from game clients over the WebSocket.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Create a new room; answered with a `host-ack`.
    HostRoom,
    /// Join (or rejoin) an existing room; answered with a `join-ack`.
    JoinRoom {
        /// Target room code.
        code: String,
        /// Display name to use in the roster.
        name: String,
    },
    /// Update the sender's display name and ready flag.
    UpdatePlayer {
        /// Target room code.
        code: String,
        /// New display name.
        name: String,
        /// Whether the player is ready to start.
        is_ready: bool,
    },
    /// Leave the room.
    LeaveRoom {
        /// Target room code.
        code: String,
    },
    /// Overwrite the room settings; takes effect from the next round.
    UpdateSettings {
        /// Target room code.
        code: String,
        /// Number of rounds per game.
        round_count: u32,
        /// Round duration in seconds.
        round_seconds: u32,
        /// Prompts to draw from at the start of each round.
        prompt_pool: Vec<String>,
    },
    /// Start the game from the lobby (host only).
    StartGame {
        /// Target room code.
        code: String,
    },
    /// Submit the sender's entry for the current prompt.
    SubmitEntry {
        /// Target room code.
        code: String,
        /// Opaque identifier of the picked track.
        entry_id: String,
        /// Track title shown to other players.
        title: String,
        /// Track artist shown to other players.
        artist: String,
        /// Optional artwork URL.
        #[serde(default)]
        artwork_url: Option<String>,
    },
    /// Rate the entry currently up for rating (0 skips your own entry).
    SubmitRating {
        /// Target room code.
        code: String,
        /// Entry the rating targets; must match the current rating cursor.
        entry_id: String,
        /// Rating from 1 to 5, or 0 as the self-skip sentinel.
        rating: u8,
    },
    /// Move from the results screen to the next round or to game over.
    AdvanceRound {
        /// Target room code.
        code: String,
    },
    /// Reset the room back to the lobby, keeping roster and settings.
    ReturnToLobby {
        /// Target room code.
        code: String,
    },
    /// Ask for the current prompt again (reconnect convenience).
    RequestPrompt {
        /// Target room code.
        code: String,
    },
    /// Ask how many entries have been submitted so far.
    RequestSubmissionStatus {
        /// Target room code.
        code: String,
    },
    /// Ask for the last round results again.
    RequestRoundResults {
        /// Target room code.
        code: String,
    },
    /// Any message type this server does not understand.
    #[serde(other)]
    Unknown,
}

/// Error returned when an inbound frame cannot be turned into a [`ClientMessage`].
#[derive(Debug, Error)]
pub enum MessageParseError {
    /// The payload was not valid JSON for any known message shape.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload parsed but carried out-of-range fields.
    #[error("invalid message: {0}")]
    Validation(ValidationError),
}

impl ClientMessage {
    /// Parse and validate a raw JSON text frame.
    pub fn from_json_str(raw: &str) -> Result<Self, MessageParseError> {
        let message: Self = serde_json::from_str(raw)?;
        message.validate().map_err(MessageParseError::Validation)?;
        Ok(message)
    }

    /// The room code this message targets, if any.
    pub fn room_code(&self) -> Option<&str> {
        match self {
            Self::HostRoom | Self::Unknown => None,
            Self::JoinRoom { code, .. }
            | Self::UpdatePlayer { code, .. }
            | Self::LeaveRoom { code }
            | Self::UpdateSettings { code, .. }
            | Self::StartGame { code }
            | Self::SubmitEntry { code, .. }
            | Self::SubmitRating { code, .. }
            | Self::AdvanceRound { code }
            | Self::ReturnToLobby { code }
            | Self::RequestPrompt { code }
            | Self::RequestSubmissionStatus { code }
            | Self::RequestRoundResults { code } => Some(code),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(code) = self.room_code() {
            validate_room_code(code)?;
        }

        match self {
            Self::SubmitRating { rating, .. } => validate_rating(*rating),
            Self::UpdateSettings {
                round_count,
                round_seconds,
                prompt_pool,
                ..
            } => {
                if *round_count == 0 || *round_seconds == 0 {
                    let mut err = ValidationError::new("settings_range");
                    err.message =
                        Some("Round count and round duration must be positive".into());
                    return Err(err);
                }
                if prompt_pool.is_empty() {
                    let mut err = ValidationError::new("settings_prompts");
                    err.message = Some("Prompt pool must not be empty".into());
                    return Err(err);
                }
                Ok(())
            }
            Self::SubmitEntry { entry_id, .. } if entry_id.trim().is_empty() => {
                let mut err = ValidationError::new("entry_id_empty");
                err.message = Some("Entry ID must not be empty".into());
                Err(err)
            }
            _ => Ok(()),
        }
    }
}
