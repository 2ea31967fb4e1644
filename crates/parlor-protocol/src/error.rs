//! Error types for the protocol layer.

/// Errors that can occur while reading or writing wire messages.
///
/// A `ProtocolError` always means the problem is in
/// serialization/deserialization or message shape — never in networking
/// or session state.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a command into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into an envelope, or an
    /// envelope's `data` into its expected shape).
    ///
    /// Common causes: malformed JSON, missing required fields, wrong
    /// data types, or truncated frames.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope parsed, but violates protocol rules for its `type` —
    /// e.g. a `room_created` confirmation with no `data.id`.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}
