//! Wire protocol for Parlor.
//!
//! This crate defines the "language" spoken between a room client and the
//! room server:
//!
//! - **Types** ([`RoomSnapshot`], [`PendingGameChoice`], etc.) — the locally
//!   cached room data model.
//! - **Envelope** ([`Envelope`], [`ServerEvent`]) — the inbound message unit
//!   and its classification into typed events.
//! - **Commands** ([`ClientCommand`]) — the outbound messages a client sends.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and session
//! (registry, handshakes, snapshot cache). It doesn't know about
//! connections or persistence — it only knows how to read and write
//! messages.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session (room state)
//! ```
//!
//! The server's envelope format is deliberately loose: every inbound frame
//! is `{ "type": string, "data"?: object, "message"?: string }`, and
//! unknown `type` values are valid (forward-compatible protocol). That is
//! why [`Envelope`] is a plain struct with a separate [`Envelope::event`]
//! classifier instead of a `#[serde(tag = "type")]` enum, which would
//! reject unknown tags at parse time.

mod command;
mod error;
mod event;
mod types;

pub use command::ClientCommand;
pub use error::ProtocolError;
pub use event::{Envelope, ServerEvent};
pub use types::{
    GameInfo, GameStatus, PendingGameChoice, PlayerId, PlayerSeat, RoomId,
    RoomPatch, RoomSnapshot, User,
};
