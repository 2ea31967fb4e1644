//! The room data model: everything a client caches about a shared room.
//!
//! The authoritative copy of all of this lives on the server. What the
//! client holds is a *snapshot* — refreshed by full replacement
//! ([`RoomSnapshot`]) or by shallow merge ([`RoomPatch`]) when the server
//! pushes a partial update.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room.
///
/// Newtype over `String` rather than an integer: the server assigns random
/// 12-character alphanumeric ids, and the client only ever round-trips
/// them. `#[serde(transparent)]` keeps the wire form a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a `RoomId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a `&str` (for URL construction).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A unique identifier for a player (the server-side user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Creates a `PlayerId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// Room membership
// ---------------------------------------------------------------------------

/// A registered user: the identity half of a room participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// One participant's seat in a room.
///
/// The server's player record also carries the live connection, which
/// never crosses the wire; the client only sees the user behind the seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSeat {
    pub user: User,
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

/// Lifecycle status of the game attached to a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    NotStarted,
    InProgress,
    Over,
    /// Any status string this client version doesn't know about.
    /// `#[serde(other)]` keeps snapshot parsing forward-compatible.
    #[serde(other)]
    Unknown,
}

/// The in-progress game attached to a room, if any.
///
/// `state` is opaque to the session engine — only the per-game view layer
/// knows how to interpret it, so it stays a raw JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    #[serde(rename = "type")]
    pub game_type: String,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub state: serde_json::Value,
}

// ---------------------------------------------------------------------------
// RoomSnapshot
// ---------------------------------------------------------------------------

/// The locally cached representation of a room's state.
///
/// Mutated only through the session store; the authoritative copy is the
/// server's. Every field except `id` is optional on the wire because the
/// server's payloads grow incrementally as the room fills and a game is
/// chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,

    /// Participants keyed by player id. Two-player rooms in practice, but
    /// the wire shape is a map rather than a pair.
    #[serde(default)]
    pub players: HashMap<PlayerId, PlayerSeat>,

    /// Name of the game the participants settled on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,

    /// The running game, once started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameInfo>,

    /// Room lifecycle status (`waiting`, `game_selection`, `in_progress`,
    /// `game_over`, …). Kept as a raw string: the server may grow states
    /// the client doesn't need to distinguish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl RoomSnapshot {
    /// Creates a minimal snapshot with just an id — the shape a client has
    /// right after a create handshake, before the canonical fetch.
    pub fn with_id(id: impl Into<RoomId>) -> Self {
        Self {
            id: id.into(),
            players: HashMap::new(),
            game_name: None,
            game: None,
            status: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPatch — shallow merge
// ---------------------------------------------------------------------------

/// A partial room update: the all-optional mirror of [`RoomSnapshot`].
///
/// Applying a patch is a *shallow* merge — each present field replaces the
/// snapshot's field wholesale (a patched `players` map is not merged
/// entry-by-entry).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<HashMap<PlayerId, PlayerSeat>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl RoomPatch {
    /// Returns `true` when the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.players.is_none()
            && self.game_name.is_none()
            && self.game.is_none()
            && self.status.is_none()
    }

    /// Shallow-merges this patch into `snapshot`.
    pub fn apply(self, snapshot: &mut RoomSnapshot) {
        if let Some(id) = self.id {
            snapshot.id = id;
        }
        if let Some(players) = self.players {
            snapshot.players = players;
        }
        if let Some(game_name) = self.game_name {
            snapshot.game_name = Some(game_name);
        }
        if let Some(game) = self.game {
            snapshot.game = Some(game);
        }
        if let Some(status) = self.status {
            snapshot.status = Some(status);
        }
    }

    /// Promotes the patch to a full snapshot when it carries an id.
    ///
    /// Used as the fallback for a `room_updated` push that arrives before
    /// any snapshot is cached: there is nothing to merge into, but a
    /// payload with an id is a usable replacement.
    pub fn into_snapshot(self) -> Option<RoomSnapshot> {
        let id = self.id?;
        Some(RoomSnapshot {
            id,
            players: self.players.unwrap_or_default(),
            game_name: self.game_name,
            game: self.game,
            status: self.status,
        })
    }
}

// ---------------------------------------------------------------------------
// PendingGameChoice
// ---------------------------------------------------------------------------

/// An unresolved "opponent proposed game X" negotiation.
///
/// Ephemeral: lives for one negotiation round, never persisted to durable
/// storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGameChoice {
    pub game_type: String,
    pub player_id: PlayerId,
    pub player_name: String,
}

// =========================================================================
// Tests
// =========================================================================
