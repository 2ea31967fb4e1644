//! Parlor: a client engine for two-player game rooms.
//!
//! A room is a private space for exactly two players. One player creates
//! it and shares the id; the other joins; the pair then negotiate which
//! game to play and exchange moves, all over a single WebSocket per room.
//! The engine keeps a locally cached snapshot of the room, mirrors it to
//! durable storage so a restarted process can resume, and handles the
//! create/join handshakes, reconnection, and the game-choice negotiation.
//!
//! ```no_run
//! use parlor::{RoomClientBuilder, RoomId};
//!
//! # async fn demo() -> Result<(), parlor::ParlorError> {
//! let client = RoomClientBuilder::new("http://localhost:8080", "token")
//!     .storage_path("parlor_room.json")
//!     .build();
//!
//! // Resume a previous session, or join a friend's room.
//! if client.restore_session().await?.is_none() {
//!     client.join_room(&RoomId::new("a1b2c3d4e5f6")).await?;
//! }
//! client.choose_game("tictactoe").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{RoomClient, RoomClientBuilder};
pub use error::ParlorError;

pub use parlor_protocol::{
    ClientCommand, Envelope, GameInfo, GameStatus, PendingGameChoice,
    PlayerId, PlayerSeat, RoomId, RoomPatch, RoomSnapshot, ServerEvent,
    User,
};
pub use parlor_session::{
    EnvelopeHandler, FileStorage, HandshakeConfig, MemoryStorage, Notice,
    Notifier, SessionError, Severity, SnapshotStorage,
};
pub use parlor_transport::{Dialer, Endpoints, WebSocketDialer};

/// Commonly used types in one import.
pub mod prelude {
    pub use crate::{
        ParlorError, PendingGameChoice, RoomClient, RoomClientBuilder,
        RoomId, RoomSnapshot,
    };
}

/// Initializes a `tracing` subscriber reading `RUST_LOG`, for binaries
/// that don't bring their own. Call once at startup.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
