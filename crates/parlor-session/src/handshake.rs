//! Create/join handshakes and their exactly-once settlement.
//!
//! Opening a room connection is a small protocol in its own right: dial
//! the socket, (for joins) announce the join, then wait for the first
//! terminal event — confirmation, server error, close, or timeout. The
//! [`Settlement`] state machine is the single authority on which event
//! wins: it settles exactly once, and everything after that first
//! settlement is absorbed. The async driver around it translates socket
//! activity into [`HandshakeEvent`]s and never decides outcomes itself.

use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::{
    ClientCommand, Envelope, ProtocolError, RoomId, RoomSnapshot,
    ServerEvent,
};
use parlor_transport::{
    CloseInfo, Connection, Dialer, Endpoints, Incoming, TransportError,
};

use crate::error::SessionError;
use crate::notify::{Notice, Notifier};
use crate::registry::{ConnectionRegistry, EnvelopeHandler};

/// Tunables for the handshake phase.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// How long to wait for a terminal event after the socket opens.
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Which confirmation a settlement is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    /// Waiting for `room_created` with the server-assigned id.
    Create,
    /// Waiting for the join confirmation.
    Join,
}

/// One input to the settlement machine.
#[derive(Debug)]
pub enum HandshakeEvent {
    /// The socket finished opening.
    Opened,
    /// A decoded frame arrived.
    Frame(Envelope),
    /// A frame arrived but would not decode.
    Malformed(ProtocolError),
    /// The socket errored.
    SocketError(TransportError),
    /// The peer closed the socket.
    Closed(Option<CloseInfo>),
    /// The handshake window elapsed.
    TimedOut,
}

/// How a settled handshake resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Create confirmed; the server assigned this room id.
    Created { room_id: RoomId },
    /// Join confirmed, optionally with the room's current state.
    Joined { snapshot: Option<RoomSnapshot> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettlementState {
    Connecting,
    AwaitingConfirmation,
    Settled,
}

/// The exactly-once outcome latch for one handshake.
///
/// Feed events in arrival order; the first terminal event produces
/// `Some(result)` and latches the machine. Every later event returns
/// `None` no matter what it is, which is what makes racy interleavings
/// (error frame then close, close then timeout) safe to feed blindly.
#[derive(Debug)]
pub struct Settlement {
    kind: HandshakeKind,
    state: SettlementState,
}

impl Settlement {
    pub fn new(kind: HandshakeKind) -> Self {
        Self {
            kind,
            state: SettlementState::Connecting,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state == SettlementState::Settled
    }

    /// Advances the machine by one event.
    pub fn on_event(
        &mut self,
        event: HandshakeEvent,
    ) -> Option<Result<Outcome, SessionError>> {
        if self.state == SettlementState::Settled {
            tracing::trace!(?event, "event after settlement, absorbed");
            return None;
        }
        match event {
            HandshakeEvent::Opened => {
                self.state = SettlementState::AwaitingConfirmation;
                None
            }
            HandshakeEvent::Frame(envelope) => self.on_frame(&envelope),
            HandshakeEvent::Malformed(e) => {
                Some(self.settle(Err(SessionError::Protocol(e))))
            }
            HandshakeEvent::SocketError(e) => {
                Some(self.settle(Err(SessionError::Connection(e))))
            }
            HandshakeEvent::Closed(info) => Some(self.settle(Err(
                SessionError::ClosedDuringHandshake(CloseInfo::describe(
                    &info,
                )),
            ))),
            HandshakeEvent::TimedOut => {
                Some(self.settle(Err(SessionError::Timeout)))
            }
        }
    }

    fn on_frame(
        &mut self,
        envelope: &Envelope,
    ) -> Option<Result<Outcome, SessionError>> {
        let event = match envelope.event() {
            Ok(event) => event,
            Err(e) => {
                return Some(
                    self.settle(Err(SessionError::Protocol(e))),
                );
            }
        };
        match (self.kind, event) {
            (HandshakeKind::Create, ServerEvent::RoomCreated { room_id }) => {
                Some(self.settle(Ok(Outcome::Created { room_id })))
            }
            (HandshakeKind::Join, ServerEvent::Joined { snapshot }) => {
                Some(self.settle(Ok(Outcome::Joined { snapshot })))
            }
            (_, ServerEvent::ServerError { message }) => {
                Some(self.settle(Err(SessionError::Rejected(message))))
            }
            (_, other) => {
                // Non-terminal traffic before confirmation. Rare but
                // legal; the dispatcher will catch up from the snapshot.
                tracing::debug!(
                    event = ?other,
                    "non-terminal event during handshake, ignored"
                );
                None
            }
        }
    }

    fn settle(
        &mut self,
        result: Result<Outcome, SessionError>,
    ) -> Result<Outcome, SessionError> {
        self.state = SettlementState::Settled;
        result
    }
}

// ---------------------------------------------------------------------------
// Async driver
// ---------------------------------------------------------------------------

/// Pulls socket events and feeds the settlement until it resolves.
///
/// Notices on pre-settlement frames still reach the notifier; the server
/// may attach display text to its confirmation or rejection.
async fn drive<C: Connection>(
    conn: &C,
    settlement: &mut Settlement,
    timeout: Duration,
    notifier: &Arc<dyn Notifier>,
) -> Result<Outcome, SessionError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let event = tokio::select! {
            incoming = conn.recv() => match incoming {
                Ok(Incoming::Frame(frame)) => {
                    match Envelope::decode(&frame) {
                        Ok(envelope) => {
                            if let Some(notice) =
                                Notice::from_envelope(&envelope)
                            {
                                notifier.notify(notice);
                            }
                            HandshakeEvent::Frame(envelope)
                        }
                        Err(e) => HandshakeEvent::Malformed(e),
                    }
                }
                Ok(Incoming::Closed(info)) => HandshakeEvent::Closed(info),
                Err(e) => HandshakeEvent::SocketError(e),
            },
            _ = tokio::time::sleep_until(deadline) => {
                HandshakeEvent::TimedOut
            }
        };
        if let Some(result) = settlement.on_event(event) {
            return result;
        }
    }
}

/// Creates a new room: dials the creation endpoint and waits for the
/// server to assign a room id.
///
/// On success the connection is registered under the new id (with
/// `handler` installed, when given) and the id returned. On failure the
/// socket is closed and nothing is registered.
pub async fn create_room<D: Dialer>(
    registry: &ConnectionRegistry<D::Connection>,
    dialer: &D,
    endpoints: &Endpoints,
    token: &str,
    handler: Option<Arc<dyn EnvelopeHandler>>,
    config: &HandshakeConfig,
) -> Result<RoomId, SessionError> {
    let url = endpoints.create_url(token);
    let conn = dialer.dial(&url).await?;

    let mut settlement = Settlement::new(HandshakeKind::Create);
    settlement.on_event(HandshakeEvent::Opened);

    let notifier = registry.notifier();
    match drive(&conn, &mut settlement, config.timeout, &notifier).await {
        Ok(Outcome::Created { room_id }) => {
            tracing::info!(%room_id, "room created");
            registry.add_connection(
                room_id.clone(),
                Arc::new(conn),
                handler,
            );
            Ok(room_id)
        }
        Ok(Outcome::Joined { .. }) => {
            // The settlement kind makes this unreachable, but closing the
            // socket beats panicking if the machine ever changes.
            let _ = conn.close().await;
            Err(SessionError::Rejected(
                "unexpected join confirmation on create".to_string(),
            ))
        }
        Err(e) => {
            let _ = conn.close().await;
            Err(e)
        }
    }
}

/// Joins an existing room: dials the join endpoint, announces the join,
/// and waits for the server's confirmation.
///
/// Returns the room snapshot when the confirmation carried one. On
/// failure the socket is closed and nothing is registered.
pub async fn join_room<D: Dialer>(
    registry: &ConnectionRegistry<D::Connection>,
    dialer: &D,
    endpoints: &Endpoints,
    room_id: &RoomId,
    token: &str,
    handler: Option<Arc<dyn EnvelopeHandler>>,
    config: &HandshakeConfig,
) -> Result<Option<RoomSnapshot>, SessionError> {
    let url = endpoints.join_url(room_id.as_str(), token);
    let conn = dialer.dial(&url).await?;

    let mut settlement = Settlement::new(HandshakeKind::Join);
    settlement.on_event(HandshakeEvent::Opened);

    // Announce the join; the server replies with the confirmation or an
    // error envelope on this same socket.
    if let Err(e) = conn.send(&ClientCommand::JoinRoom.encode()?).await {
        let _ = conn.close().await;
        return Err(SessionError::Connection(e));
    }

    let notifier = registry.notifier();
    match drive(&conn, &mut settlement, config.timeout, &notifier).await {
        Ok(Outcome::Joined { snapshot }) => {
            tracing::info!(%room_id, "room joined");
            registry.add_connection(
                room_id.clone(),
                Arc::new(conn),
                handler,
            );
            Ok(snapshot)
        }
        Ok(Outcome::Created { .. }) => {
            let _ = conn.close().await;
            Err(SessionError::Rejected(
                "unexpected create confirmation on join".to_string(),
            ))
        }
        Err(e) => {
            let _ = conn.close().await;
            Err(e)
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> HandshakeEvent {
        HandshakeEvent::Frame(
            Envelope::decode(json.as_bytes()).expect("valid envelope"),
        )
    }

    fn opened(kind: HandshakeKind) -> Settlement {
        let mut settlement = Settlement::new(kind);
        assert!(settlement.on_event(HandshakeEvent::Opened).is_none());
        settlement
    }

    #[test]
    fn test_create_settles_on_room_created() {
        let mut settlement = opened(HandshakeKind::Create);
        let result = settlement
            .on_event(envelope(r#"{"type":"room_created","data":{"id":"R1"}}"#))
            .expect("should settle");
        assert_eq!(
            result.unwrap(),
            Outcome::Created {
                room_id: RoomId::new("R1")
            }
        );
        assert!(settlement.is_settled());
    }

    #[test]
    fn test_join_settles_on_confirmation_with_snapshot() {
        let mut settlement = opened(HandshakeKind::Join);
        let result = settlement
            .on_event(envelope(
                r#"{"type":"joined_room","data":{"id":"R2"}}"#,
            ))
            .expect("should settle");
        match result.unwrap() {
            Outcome::Joined {
                snapshot: Some(snapshot),
            } => assert_eq!(snapshot.id, RoomId::new("R2")),
            other => panic!("expected joined with snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_error_envelope_settles_rejected() {
        let mut settlement = opened(HandshakeKind::Join);
        let result = settlement
            .on_event(envelope(r#"{"type":"error","message":"room full"}"#))
            .expect("should settle");
        assert!(matches!(
            result,
            Err(SessionError::Rejected(msg)) if msg == "room full"
        ));
    }

    #[test]
    fn test_close_settles_with_code_and_reason() {
        let mut settlement = opened(HandshakeKind::Join);
        let result = settlement
            .on_event(HandshakeEvent::Closed(Some(CloseInfo {
                code: 1006,
                reason: String::new(),
            })))
            .expect("should settle");
        assert!(matches!(
            result,
            Err(SessionError::ClosedDuringHandshake(msg))
                if msg == "1006 (Unknown reason)"
        ));
    }

    #[test]
    fn test_timeout_settles_timeout() {
        let mut settlement = opened(HandshakeKind::Create);
        let result = settlement
            .on_event(HandshakeEvent::TimedOut)
            .expect("should settle");
        assert!(matches!(result, Err(SessionError::Timeout)));
    }

    #[test]
    fn test_events_after_settlement_are_absorbed() {
        let mut settlement = opened(HandshakeKind::Join);
        settlement
            .on_event(envelope(r#"{"type":"error","message":"room full"}"#))
            .expect("should settle");

        // A close typically follows a handshake rejection. It must not
        // produce a second outcome.
        assert!(settlement
            .on_event(HandshakeEvent::Closed(None))
            .is_none());
        assert!(settlement
            .on_event(HandshakeEvent::TimedOut)
            .is_none());
        assert!(settlement
            .on_event(envelope(r#"{"type":"joined_room"}"#))
            .is_none());
    }

    #[test]
    fn test_non_terminal_frames_do_not_settle() {
        let mut settlement = opened(HandshakeKind::Join);
        assert!(settlement
            .on_event(envelope(r#"{"type":"room_updated","data":{}}"#))
            .is_none());
        assert!(settlement
            .on_event(envelope(r#"{"type":"whatever_new_thing"}"#))
            .is_none());
        assert!(!settlement.is_settled());
    }

    #[test]
    fn test_create_ignores_join_confirmation() {
        let mut settlement = opened(HandshakeKind::Create);
        assert!(settlement
            .on_event(envelope(r#"{"type":"joined_room"}"#))
            .is_none());
    }

    #[test]
    fn test_malformed_terminal_payload_settles_protocol_error() {
        let mut settlement = opened(HandshakeKind::Create);
        // Recognized type, broken payload.
        let result = settlement
            .on_event(envelope(r#"{"type":"room_created"}"#))
            .expect("should settle");
        assert!(matches!(result, Err(SessionError::Protocol(_))));
    }
}
