//! End-to-end tests for the session engine over an in-memory transport.
//!
//! The mock dialer hands out scripted connections: each test queues the
//! frames "the server" will push and inspects what the engine sent back,
//! with no sockets involved.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parlor_protocol::{ClientCommand, Envelope, RoomId, RoomSnapshot};
use parlor_session::{
    create_room, join_room, ConnectionRegistry, EnvelopeHandler,
    HandshakeConfig, MemoryStorage, PendingChoice, Reconnector,
    RoomEventDispatcher, SessionError, SessionStore, TracingNotifier,
};
use parlor_transport::{
    CloseInfo, Connection, Dialer, Endpoints, Incoming, TransportError,
};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

/// Test-side handle to one scripted connection.
#[derive(Clone)]
struct ConnHandle {
    tx: mpsc::UnboundedSender<Incoming>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl ConnHandle {
    /// Pushes one server frame into the connection.
    fn push(&self, json: &str) {
        self.tx
            .send(Incoming::Frame(json.as_bytes().to_vec()))
            .expect("connection receiver dropped");
    }

    /// Makes the connection report a peer close.
    fn push_close(&self, info: Option<CloseInfo>) {
        self.tx
            .send(Incoming::Closed(info))
            .expect("connection receiver dropped");
    }

    /// Everything the engine sent, decoded as envelopes-out JSON text.
    fn sent_text(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|frame| String::from_utf8(frame.clone()).unwrap())
            .collect()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockConnection {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl Connection for MockConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("closed".into()));
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Incoming, TransportError> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(incoming) => Ok(incoming),
            // Script handle dropped: treat as a peer close.
            None => Ok(Incoming::Closed(None)),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Dialer that hands out pre-scripted connections in order.
#[derive(Default)]
struct MockDialer {
    queue: Mutex<VecDeque<MockConnection>>,
    dialed: Mutex<Vec<String>>,
}

impl MockDialer {
    fn new() -> Self {
        Self::default()
    }

    /// Queues a connection for the next dial and returns its handle.
    fn script(&self) -> ConnHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        self.queue.lock().unwrap().push_back(MockConnection {
            rx: tokio::sync::Mutex::new(rx),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        });
        ConnHandle { tx, sent, closed }
    }

    fn dialed_urls(&self) -> Vec<String> {
        self.dialed.lock().unwrap().clone()
    }
}

impl Dialer for MockDialer {
    type Connection = MockConnection;

    async fn dial(
        &self,
        url: &str,
    ) -> Result<MockConnection, TransportError> {
        self.dialed.lock().unwrap().push(url.to_string());
        self.queue.lock().unwrap().pop_front().ok_or_else(|| {
            TransportError::ConnectFailed("no scripted connection".into())
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    registry: ConnectionRegistry<MockConnection>,
    dialer: MockDialer,
    endpoints: Endpoints,
    store: Arc<Mutex<SessionStore>>,
    pending: Arc<Mutex<PendingChoice>>,
    dispatcher: Arc<RoomEventDispatcher>,
    config: HandshakeConfig,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(Mutex::new(SessionStore::new(Box::new(
            MemoryStorage::new(),
        ))));
        let pending = Arc::new(Mutex::new(PendingChoice::new()));
        let dispatcher = Arc::new(RoomEventDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&pending),
        ));
        Self {
            registry: ConnectionRegistry::new(Arc::new(TracingNotifier)),
            dialer: MockDialer::new(),
            endpoints: Endpoints::new("http://localhost:8080"),
            store,
            pending,
            dispatcher,
            config: HandshakeConfig::default(),
        }
    }

    fn handler(&self) -> Arc<dyn EnvelopeHandler> {
        Arc::clone(&self.dispatcher) as Arc<dyn EnvelopeHandler>
    }

    async fn join(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<RoomSnapshot>, SessionError> {
        join_room(
            &self.registry,
            &self.dialer,
            &self.endpoints,
            room_id,
            "t0k3n",
            Some(self.handler()),
            &self.config,
        )
        .await
    }
}

/// Polls `check` until it holds or the test has clearly hung.
async fn eventually(check: impl Fn() -> bool, what: &str) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

// ---------------------------------------------------------------------------
// Handshakes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_room_settles_on_confirmation() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"room_created","data":{"id":"R1"}}"#);

    let room_id = create_room(
        &harness.registry,
        &harness.dialer,
        &harness.endpoints,
        "t0k3n",
        Some(harness.handler()),
        &harness.config,
    )
    .await
    .expect("create should settle ok");

    assert_eq!(room_id, RoomId::new("R1"));
    assert!(harness.registry.is_connected(&room_id));
    assert_eq!(
        harness.dialer.dialed_urls(),
        vec!["ws://localhost:8080/room/join?token=t0k3n"]
    );
}

#[tokio::test]
async fn test_join_announces_then_settles_on_confirmation() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R2","status":"waiting"}}"#);

    let room_id = RoomId::new("R2");
    let snapshot = harness.join(&room_id).await.expect("join should settle");

    assert_eq!(
        snapshot.and_then(|room| room.status),
        Some("waiting".to_string())
    );
    assert!(harness.registry.is_connected(&room_id));
    // The join announcement went out on the new socket.
    assert_eq!(handle.sent_text(), vec![r#"{"type":"join_room"}"#]);
    assert_eq!(
        harness.dialer.dialed_urls(),
        vec!["ws://localhost:8080/room/R2/join?token=t0k3n"]
    );
}

#[tokio::test]
async fn test_join_rejection_leaves_no_registration() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"error","message":"room full"}"#);

    let room_id = RoomId::new("R3");
    let err = harness.join(&room_id).await.unwrap_err();

    assert!(matches!(err, SessionError::Rejected(msg) if msg == "room full"));
    assert!(!harness.registry.is_connected(&room_id));
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_join_close_before_confirmation_reports_code() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push_close(Some(CloseInfo {
        code: 1006,
        reason: String::new(),
    }));

    let err = harness.join(&RoomId::new("R4")).await.unwrap_err();

    match err {
        SessionError::ClosedDuringHandshake(msg) => {
            assert_eq!(msg, "1006 (Unknown reason)");
        }
        other => panic!("expected close error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_times_out_when_server_stays_silent() {
    let mut harness = Harness::new();
    harness.config.timeout = Duration::from_millis(50);
    // Keep the handle alive so recv pends rather than closing.
    let _handle = harness.dialer.script();

    let err = harness.join(&RoomId::new("R5")).await.unwrap_err();
    assert!(matches!(err, SessionError::Timeout));
}

#[tokio::test]
async fn test_dial_failure_surfaces_as_connection_error() {
    let harness = Harness::new();
    // Nothing scripted: the dial itself fails.
    let err = harness.join(&RoomId::new("R6")).await.unwrap_err();
    assert!(matches!(err, SessionError::Connection(_)));
}

#[tokio::test]
async fn test_steady_state_traffic_during_handshake_does_not_settle() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"room_updated","data":{"status":"waiting"}}"#);
    handle.push(r#"{"type":"joined_room","data":{"id":"R7"}}"#);

    let room_id = RoomId::new("R7");
    harness.join(&room_id).await.expect("join should settle");
    assert!(harness.registry.is_connected(&room_id));
}

// ---------------------------------------------------------------------------
// Steady state: pump, dispatch, handler swap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_room_updates_flow_into_the_store() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);

    let room_id = RoomId::new("R1");
    let snapshot = harness.join(&room_id).await.unwrap().unwrap();
    harness.store.lock().unwrap().save_room(snapshot).unwrap();

    handle.push(r#"{"type":"room_updated","data":{"status":"in_progress"}}"#);

    let store = Arc::clone(&harness.store);
    eventually(
        move || {
            store
                .lock()
                .unwrap()
                .current()
                .and_then(|room| room.status.clone())
                .as_deref()
                == Some("in_progress")
        },
        "room update to reach the store",
    )
    .await;
}

#[tokio::test]
async fn test_game_choice_negotiation_over_the_wire() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);
    let room_id = RoomId::new("R1");
    harness.join(&room_id).await.unwrap();

    handle.push(
        r#"{"type":"game_chosen","data":{"game_type":"tictactoe","player_id":"p2","player_name":"Bob"}}"#,
    );
    let pending = Arc::clone(&harness.pending);
    eventually(
        move || pending.lock().unwrap().is_pending(),
        "proposal to arrive",
    )
    .await;

    handle.push(r#"{"type":"game_accepted"}"#);
    let pending = Arc::clone(&harness.pending);
    eventually(
        move || !pending.lock().unwrap().is_pending(),
        "proposal to clear",
    )
    .await;
}

#[tokio::test]
async fn test_handler_swap_delivers_each_frame_exactly_once() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);
    let room_id = RoomId::new("R1");

    let first: Arc<Mutex<Vec<String>>> = Arc::default();
    let second: Arc<Mutex<Vec<String>>> = Arc::default();

    let sink = Arc::clone(&first);
    let first_handler: Arc<dyn EnvelopeHandler> =
        Arc::new(move |envelope: Envelope| {
            sink.lock().unwrap().push(envelope.kind);
        });
    join_room(
        &harness.registry,
        &harness.dialer,
        &harness.endpoints,
        &room_id,
        "t0k3n",
        Some(first_handler),
        &harness.config,
    )
    .await
    .unwrap();

    handle.push(r#"{"type":"room_updated"}"#);
    let watched = Arc::clone(&first);
    eventually(
        move || watched.lock().unwrap().len() == 1,
        "first handler to see the frame",
    )
    .await;

    let sink = Arc::clone(&second);
    harness.registry.set_message_handler(
        &room_id,
        Arc::new(move |envelope: Envelope| {
            sink.lock().unwrap().push(envelope.kind);
        }),
    );

    handle.push(r#"{"type":"move_made"}"#);
    let watched = Arc::clone(&second);
    eventually(
        move || watched.lock().unwrap().len() == 1,
        "second handler to see the frame",
    )
    .await;

    // No double delivery in either direction.
    assert_eq!(*first.lock().unwrap(), vec!["room_updated"]);
    assert_eq!(*second.lock().unwrap(), vec!["move_made"]);
}

#[tokio::test]
async fn test_frame_already_waiting_at_registration_reaches_the_handler() {
    // A server can push its first frame the instant the socket opens, so
    // the frame may be sitting in the connection before add_connection
    // runs. Registration must not lose it. Repeated because the original
    // hazard was a startup race.
    for _ in 0..50 {
        let harness = Harness::new();
        let handle = harness.dialer.script();
        handle.push(r#"{"type":"room_updated","data":{"status":"x"}}"#);
        let conn = harness
            .dialer
            .dial("ws://test")
            .await
            .expect("scripted dial");

        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&seen);
        harness.registry.add_connection(
            RoomId::new("R1"),
            Arc::new(conn),
            Some(Arc::new(move |envelope: Envelope| {
                sink.lock().unwrap().push(envelope.kind);
            })),
        );

        let watched = Arc::clone(&seen);
        eventually(
            move || watched.lock().unwrap().len() == 1,
            "the queued first frame to be delivered",
        )
        .await;
        assert_eq!(*seen.lock().unwrap(), vec!["room_updated"]);
    }
}

#[tokio::test]
async fn test_connect_registers_and_replaces_per_room() {
    let harness = Harness::new();
    let room_id = RoomId::new("R1");

    let first = harness.dialer.script();
    harness
        .registry
        .connect(&harness.dialer, "ws://one", room_id.clone())
        .await
        .expect("first connect should succeed");
    assert!(harness.registry.is_connected(&room_id));

    // A second connect for the same room tears the first down before
    // dialing; never two live sockets per id.
    let second = harness.dialer.script();
    harness
        .registry
        .connect(&harness.dialer, "ws://two", room_id.clone())
        .await
        .expect("second connect should succeed");

    assert!(harness.registry.is_connected(&room_id));
    assert!(first.is_closed());
    assert!(!second.is_closed());
    assert_eq!(
        harness.dialer.dialed_urls(),
        vec!["ws://one", "ws://two"]
    );
}

#[tokio::test]
async fn test_connect_failure_leaves_no_entry() {
    let harness = Harness::new();
    let room_id = RoomId::new("R1");

    // Nothing scripted: the dial fails.
    let err = harness
        .registry
        .connect(&harness.dialer, "ws://unreachable", room_id.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Connection(_)));
    assert!(!harness.registry.is_connected(&room_id));
}

#[tokio::test]
async fn test_send_routes_commands_to_the_room_connection() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);
    let room_id = RoomId::new("R1");
    harness.join(&room_id).await.unwrap();

    harness
        .registry
        .send(
            &room_id,
            &ClientCommand::ChooseGame {
                game_type: "tictactoe".into(),
            },
        )
        .await
        .expect("send should succeed");

    let sent = handle.sent_text();
    assert_eq!(
        sent.last().map(String::as_str),
        Some(r#"{"type":"choose_game","game_type":"tictactoe"}"#)
    );
}

#[tokio::test]
async fn test_send_to_unknown_room_is_not_connected() {
    let harness = Harness::new();
    let err = harness
        .registry
        .send(&RoomId::new("nope"), &ClientCommand::JoinRoom)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotConnected(_)));
}

#[tokio::test]
async fn test_peer_close_unregisters_the_room() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);
    let room_id = RoomId::new("R1");
    harness.join(&room_id).await.unwrap();

    handle.push_close(None);

    let registry = harness.registry.clone();
    let watched = room_id.clone();
    eventually(
        move || !registry.is_connected(&watched),
        "registry entry to clear after close",
    )
    .await;
}

#[tokio::test]
async fn test_rejoin_replaces_the_old_connection() {
    let harness = Harness::new();
    let first = harness.dialer.script();
    first.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);
    let room_id = RoomId::new("R1");
    harness.join(&room_id).await.unwrap();

    let second = harness.dialer.script();
    second.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);
    harness.join(&room_id).await.unwrap();

    assert!(harness.registry.is_connected(&room_id));
    let watched = first.clone();
    eventually(
        move || watched.is_closed(),
        "replaced connection to be closed",
    )
    .await;
    assert!(!second.is_closed());
}

#[tokio::test]
async fn test_undecodable_frames_are_dropped_without_killing_the_pump() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);
    let room_id = RoomId::new("R1");
    let snapshot = harness.join(&room_id).await.unwrap().unwrap();
    harness.store.lock().unwrap().save_room(snapshot).unwrap();

    handle
        .tx
        .send(Incoming::Frame(b"{{{ not json".to_vec()))
        .unwrap();
    handle.push(r#"{"type":"room_updated","data":{"status":"ok"}}"#);

    let store = Arc::clone(&harness.store);
    eventually(
        move || {
            store
                .lock()
                .unwrap()
                .current()
                .and_then(|room| room.status.clone())
                .as_deref()
                == Some("ok")
        },
        "pump to survive the bad frame",
    )
    .await;
    assert!(harness.registry.is_connected(&room_id));
}

// ---------------------------------------------------------------------------
// Reconnection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sync_connection_skips_dialing_when_already_connected() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);
    let room_id = RoomId::new("R1");
    harness.join(&room_id).await.unwrap();

    let reconnector = Reconnector::new();
    reconnector
        .sync_connection(
            &harness.registry,
            &harness.dialer,
            &harness.endpoints,
            "t0k3n",
            &room_id,
            harness.handler(),
            &harness.store,
            &harness.config,
        )
        .await
        .expect("already connected is ok");

    assert_eq!(harness.dialer.dialed_urls().len(), 1);
}

#[tokio::test]
async fn test_sync_connection_rejoins_a_restored_room() {
    let harness = Harness::new();
    let handle = harness.dialer.script();
    handle.push(r#"{"type":"joined_room","data":{"id":"R1"}}"#);

    let room_id = RoomId::new("R1");
    let reconnector = Reconnector::new();
    reconnector
        .sync_connection(
            &harness.registry,
            &harness.dialer,
            &harness.endpoints,
            "t0k3n",
            &room_id,
            harness.handler(),
            &harness.store,
            &harness.config,
        )
        .await
        .expect("rejoin should succeed");

    assert!(harness.registry.is_connected(&room_id));
}

#[tokio::test]
async fn test_failed_reconnect_discards_the_session() {
    let harness = Harness::new();
    harness
        .store
        .lock()
        .unwrap()
        .save_room(RoomSnapshot::with_id(RoomId::new("R1")))
        .unwrap();

    let handle = harness.dialer.script();
    handle.push(r#"{"type":"error","message":"room not found"}"#);

    let room_id = RoomId::new("R1");
    let reconnector = Reconnector::new();
    let err = reconnector
        .sync_connection(
            &harness.registry,
            &harness.dialer,
            &harness.endpoints,
            "t0k3n",
            &room_id,
            harness.handler(),
            &harness.store,
            &harness.config,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Rejected(_)));
    // The fatal failure clears the cached session; no retry follows.
    assert!(harness.store.lock().unwrap().current().is_none());
    assert_eq!(harness.dialer.dialed_urls().len(), 1);
}
