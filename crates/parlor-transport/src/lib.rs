//! Transport abstraction layer for Parlor.
//!
//! Provides the [`Dialer`] and [`Connection`] traits the session layer is
//! generic over, plus the room endpoint URL builder ([`Endpoints`]).
//! The traits exist so tests can substitute in-memory connections for real
//! sockets; production uses the WebSocket implementation.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

use std::future::Future;

mod endpoints;
mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use endpoints::Endpoints;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketDialer};

/// What came out of a connection on one `recv` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A complete data frame.
    Frame(Vec<u8>),
    /// The peer closed the connection, with the close frame's code and
    /// reason when one was supplied.
    Closed(Option<CloseInfo>),
}

/// Code and reason from a peer's close frame.
///
/// The join handshake reports these to the caller when a socket closes
/// before any confirmation arrives, so they survive the trait boundary
/// instead of being flattened into "closed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    /// Renders an optional close frame as a human-readable description.
    /// No frame, or a frame without a reason, yields "Unknown reason".
    pub fn describe(info: &Option<CloseInfo>) -> String {
        match info {
            Some(close) if !close.reason.is_empty() => {
                format!("{} ({})", close.code, close.reason)
            }
            Some(close) => format!("{} (Unknown reason)", close.code),
            None => "Unknown reason".to_string(),
        }
    }
}

/// Opens a connection to a URL.
///
/// The `Send` bounds on the returned futures let callers spawn tasks that
/// hold connections produced by any dialer.
pub trait Dialer: Send + Sync + 'static {
    /// The connection type produced by this dialer.
    type Connection: Connection;

    /// Opens a connection to `url`.
    fn dial(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single duplex connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// Sends one data frame to the peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame, or the close notification.
    ///
    /// After [`Incoming::Closed`] has been returned, further calls keep
    /// returning `Closed`.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Incoming, TransportError>> + Send;

    /// Closes the connection. Closing an already-closed connection is
    /// not an error.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
