//! Room session engine for Parlor.
//!
//! This crate is the stateful core between the transport and the
//! application: it owns live room connections, settles create/join
//! handshakes exactly once, mirrors the room snapshot to durable storage,
//! tracks the pending game proposal, and reconnects restored sessions.
//!
//! The pieces compose around two shared cells — the [`SessionStore`] and
//! the [`PendingChoice`] — with the [`ConnectionRegistry`] pumping frames
//! into whatever [`EnvelopeHandler`] is installed per room. The
//! [`RoomEventDispatcher`] is the handler production code installs; tests
//! and embedders can swap in their own.

mod dispatch;
mod error;
mod handshake;
mod notify;
mod pending;
mod reconnect;
mod registry;
mod storage;
mod store;

pub use dispatch::RoomEventDispatcher;
pub use error::SessionError;
pub use handshake::{
    create_room, join_room, HandshakeConfig, HandshakeEvent, HandshakeKind,
    Outcome, Settlement,
};
pub use notify::{
    Notice, Notifier, Severity, TracingNotifier, DEFAULT_NOTICE_DURATION,
};
pub use pending::{ChoiceResolution, PendingChoice};
pub use reconnect::Reconnector;
pub use registry::{ConnectionRegistry, EnvelopeHandler};
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage};
pub use store::{revalidate, RoomDirectory, SessionStore};
