//! The inbound message envelope and its classification into server events.
//!
//! Every frame the server pushes is one [`Envelope`]:
//!
//! ```json
//! { "type": "room_updated", "data": { "status": "in_progress" },
//!   "message": "Opponent is ready" }
//! ```
//!
//! Two properties of the protocol shape everything here:
//!
//! 1. **Unknown `type` values are valid** and must be ignored, so the
//!    envelope is a plain struct and [`Envelope::event`] classifies it
//!    after the fact (returning [`ServerEvent::Unknown`] for strangers).
//! 2. **`message` is independent of `type`**: any envelope with a
//!    non-empty `message` surfaces a transient user notification whether
//!    or not its type is recognized. [`Envelope::notice_text`] exposes it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    PendingGameChoice, ProtocolError, RoomId, RoomPatch, RoomSnapshot,
};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The typed message unit exchanged over a room connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The server's event tag. Any string is valid here.
    #[serde(rename = "type")]
    pub kind: String,

    /// Event payload; shape depends on `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Human-readable text to surface to the user, independent of `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Parses a raw frame into an envelope. Checked parsing only — no
    /// schema validation beyond the presence of the `type` field.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
    }

    /// Returns the notification text, if this envelope carries one.
    /// Empty strings count as "no message".
    pub fn notice_text(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    /// Classifies the envelope into a typed [`ServerEvent`].
    ///
    /// Unrecognized `kind` values produce [`ServerEvent::Unknown`] — never
    /// an error. Errors only occur when a *recognized* kind carries a
    /// malformed or missing payload.
    pub fn event(&self) -> Result<ServerEvent, ProtocolError> {
        let event = match self.kind.as_str() {
            "room_created" => {
                let created: RoomCreatedData = self.parse_data()?;
                ServerEvent::RoomCreated {
                    room_id: created.id,
                }
            }
            // The server has used both spellings for the join
            // confirmation; accept either.
            "joined_room" | "room_joined" => ServerEvent::Joined {
                snapshot: self.parse_optional_data()?,
            },
            "error" => ServerEvent::ServerError {
                message: self
                    .message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
            "opponent_left" => ServerEvent::OpponentLeft,
            "room_updated" => ServerEvent::RoomUpdated(
                self.parse_optional_data()?.unwrap_or_default(),
            ),
            "move_made" => ServerEvent::MoveMade(
                self.parse_optional_data()?.unwrap_or_default(),
            ),
            "game_started" => {
                let data: Option<GameStartedData> =
                    self.parse_optional_data()?;
                ServerEvent::GameStarted {
                    game_type: data.and_then(|d| d.game_type),
                }
            }
            "game_chosen" => ServerEvent::GameChosen(self.parse_data()?),
            "game_accepted" => ServerEvent::GameAccepted,
            "game_rejected" => ServerEvent::GameRejected,
            _ => ServerEvent::Unknown,
        };
        Ok(event)
    }

    /// Parses `data` into `T`, requiring it to be present.
    fn parse_data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let data = self.data.clone().ok_or_else(|| {
            ProtocolError::InvalidEnvelope(format!(
                "'{}' envelope is missing its data payload",
                self.kind
            ))
        })?;
        serde_json::from_value(data).map_err(ProtocolError::Decode)
    }

    /// Parses `data` into `T` when present; `null`/absent is `None`.
    fn parse_optional_data<T: DeserializeOwned>(
        &self,
    ) -> Result<Option<T>, ProtocolError> {
        match &self.data {
            None | Some(Value::Null) => Ok(None),
            Some(data) => serde_json::from_value(data.clone())
                .map(Some)
                .map_err(ProtocolError::Decode),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoomCreatedData {
    id: RoomId,
}

#[derive(Debug, Deserialize)]
struct GameStartedData {
    #[serde(default)]
    game_type: Option<String>,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// A classified inbound envelope.
///
/// Handshake-terminal events (`RoomCreated`, `Joined`, `ServerError`) are
/// consumed by the handshake settlement machine; the rest drive the
/// steady-state dispatch table.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Create handshake confirmation; the server assigned `room_id`.
    RoomCreated { room_id: RoomId },

    /// Join handshake confirmation, optionally carrying the full room.
    Joined { snapshot: Option<RoomSnapshot> },

    /// The server rejected something; `message` explains what.
    ServerError { message: String },

    /// The other participant left — the session is over.
    OpponentLeft,

    /// Partial room update to shallow-merge into the snapshot.
    RoomUpdated(RoomPatch),

    /// A move was made; carries the refreshed room payload.
    MoveMade(RoomPatch),

    /// A proposed game was accepted by both sides and has begun.
    GameStarted { game_type: Option<String> },

    /// The opponent proposed a game.
    GameChosen(PendingGameChoice),

    /// The opponent accepted our proposal.
    GameAccepted,

    /// The opponent rejected our proposal.
    GameRejected,

    /// A `type` this client version doesn't recognize. Ignored.
    Unknown,
}

// =========================================================================
// Tests
// =========================================================================
