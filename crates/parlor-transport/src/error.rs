//! Error types for the transport layer.

/// Errors that can occur on a client connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed (DNS, TCP, or the upgrade itself).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}
