//! REST client for the Parlor room service.
//!
//! The WebSocket side of the protocol lives in `parlor-session`; this
//! crate covers the HTTP endpoints — canonical room lookups, leave, and
//! the matchmaking queue — and implements the session layer's
//! [`RoomDirectory`](parlor_session::RoomDirectory) so persisted sessions
//! can be revalidated against the server.

mod client;
mod error;

pub use client::RoomApiClient;
pub use error::ApiError;
