//! Error types for the session layer.

use parlor_protocol::{ProtocolError, RoomId};
use parlor_transport::TransportError;

/// Errors that can occur across the room session engine.
///
/// Handshake-level variants (`Connection`, `Rejected`,
/// `ClosedDuringHandshake`, `Timeout`, `Protocol`) reject the caller's
/// create/join future and are the caller's responsibility to surface.
/// Steady-state frame parse errors never become a `SessionError` — they
/// are logged and dropped while the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The socket failed to open or a send failed.
    #[error("connection failed: {0}")]
    Connection(#[from] TransportError),

    /// The server answered a create/join handshake with an `error`
    /// envelope; the string is the server's message.
    #[error("handshake rejected: {0}")]
    Rejected(String),

    /// The socket closed before any confirmation arrived. The string
    /// carries the close code and reason ("1006 (going away)"), or
    /// "Unknown reason" when the peer sent no close frame.
    #[error("connection closed during handshake: {0}")]
    ClosedDuringHandshake(String),

    /// No terminal event arrived within the handshake window.
    #[error("handshake timed out")]
    Timeout,

    /// A frame received while a handshake was pending failed to parse.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An outbound send was requested for a room with no live connection.
    #[error("no live connection for room {0}")]
    NotConnected(RoomId),

    /// The persisted snapshot failed server revalidation. Handled
    /// silently by discarding the stale session; surfaced only so tests
    /// can observe the path.
    #[error("persisted session is no longer valid")]
    SessionInvalid,

    /// Looking up the canonical room snapshot failed (not found, network
    /// error). Revalidation treats this the same as `SessionInvalid`.
    #[error("room lookup failed: {0}")]
    Directory(String),

    /// The durable snapshot mirror could not be read or written.
    #[error("snapshot storage failed: {0}")]
    Storage(#[from] std::io::Error),
}
