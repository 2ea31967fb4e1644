//! Outbound messages a client sends over a room connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// A client-to-server message.
///
/// `#[serde(tag = "type")]` produces the internally tagged JSON the server
/// switches on: `{ "type": "choose_game", "game_type": "tictactoe" }`.
/// Field names (`game_type`, `move`) match the server's accessors exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Announce ourselves after the join socket opens; the server replies
    /// with the `joined_room` confirmation.
    JoinRoom,

    /// Propose a game to the opponent.
    ChooseGame { game_type: String },

    /// Accept the opponent's proposed game.
    AcceptGame { game_type: String },

    /// Reject the opponent's proposed game.
    RejectGame { game_type: String },

    /// Play a move in the running game. The payload is opaque to the
    /// session engine — each game defines its own move shape.
    GameMove {
        #[serde(rename = "move")]
        mv: Value,
    },
}

impl ClientCommand {
    /// Serializes the command for the wire.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}
