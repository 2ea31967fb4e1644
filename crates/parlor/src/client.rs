//! The high-level room client.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use parlor_api::RoomApiClient;
use parlor_protocol::{
    ClientCommand, PendingGameChoice, RoomId, RoomSnapshot,
};
use parlor_session::{
    create_room, join_room, revalidate, ChoiceResolution,
    ConnectionRegistry, EnvelopeHandler, HandshakeConfig, MemoryStorage,
    Notifier, PendingChoice, Reconnector, RoomEventDispatcher,
    SessionStore, SnapshotStorage, TracingNotifier,
};
use parlor_transport::{Dialer, Endpoints, WebSocketDialer};

use crate::error::ParlorError;

/// Builder for [`RoomClient`].
///
/// The token is whatever credential the server's upgrade handler and REST
/// middleware validate; the client never interprets it.
pub struct RoomClientBuilder {
    base_url: String,
    token: String,
    storage: Box<dyn SnapshotStorage>,
    notifier: Arc<dyn Notifier>,
    handshake: HandshakeConfig,
}

impl RoomClientBuilder {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            token: token.to_string(),
            storage: Box::new(MemoryStorage::new()),
            notifier: Arc::new(TracingNotifier),
            handshake: HandshakeConfig::default(),
        }
    }

    /// Sets the durable snapshot mirror. The default is in-memory only;
    /// sessions then don't survive a process restart.
    pub fn storage(mut self, storage: Box<dyn SnapshotStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Mirrors the snapshot to a JSON file at `path`.
    pub fn storage_path(
        self,
        path: impl Into<std::path::PathBuf>,
    ) -> Self {
        self.storage(Box::new(parlor_session::FileStorage::new(path)))
    }

    /// Sets the sink for transient server notices.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Overrides the handshake timeout (default 10 seconds).
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake.timeout = timeout;
        self
    }

    /// Builds a client that dials real WebSocket connections.
    pub fn build(self) -> RoomClient<WebSocketDialer> {
        self.build_with_dialer(WebSocketDialer)
    }

    /// Builds a client over a custom [`Dialer`].
    pub fn build_with_dialer<D: Dialer>(self, dialer: D) -> RoomClient<D> {
        let store = Arc::new(Mutex::new(SessionStore::new(self.storage)));
        let pending = Arc::new(Mutex::new(PendingChoice::new()));
        let dispatcher = Arc::new(RoomEventDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&pending),
        ));
        RoomClient {
            registry: ConnectionRegistry::new(self.notifier),
            dialer,
            endpoints: Endpoints::new(&self.base_url),
            api: RoomApiClient::new(&self.base_url, &self.token),
            token: self.token,
            store,
            pending,
            dispatcher,
            reconnector: Reconnector::new(),
            handshake: self.handshake,
        }
    }
}

/// A client for one player's room session.
///
/// Owns the live connection, the cached room snapshot and its durable
/// mirror, and the pending game proposal. All methods take `&self`; the
/// client can be shared behind an `Arc` and driven from multiple tasks.
pub struct RoomClient<D: Dialer> {
    registry: ConnectionRegistry<D::Connection>,
    dialer: D,
    endpoints: Endpoints,
    api: RoomApiClient,
    token: String,
    store: Arc<Mutex<SessionStore>>,
    pending: Arc<Mutex<PendingChoice>>,
    dispatcher: Arc<RoomEventDispatcher>,
    reconnector: Reconnector,
    handshake: HandshakeConfig,
}

impl<D: Dialer> RoomClient<D> {
    fn handler(&self) -> Arc<dyn EnvelopeHandler> {
        Arc::clone(&self.dispatcher) as Arc<dyn EnvelopeHandler>
    }

    fn active_room_id(&self) -> Result<RoomId, ParlorError> {
        self.store
            .lock()
            .expect("session store poisoned")
            .room_id()
            .cloned()
            .ok_or(ParlorError::NoActiveRoom)
    }

    /// Creates a new room and connects to it.
    ///
    /// The room's full state is fetched over REST after the handshake;
    /// when that fetch fails the session continues with a minimal
    /// snapshot, since the live connection is already established and
    /// updates will fill in the rest.
    pub async fn create_room(&self) -> Result<RoomId, ParlorError> {
        let room_id = create_room(
            &self.registry,
            &self.dialer,
            &self.endpoints,
            &self.token,
            Some(self.handler()),
            &self.handshake,
        )
        .await?;

        let snapshot = match self.api.get_room(&room_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    %room_id,
                    error = %e,
                    "room lookup after create failed, starting minimal"
                );
                RoomSnapshot::with_id(room_id.clone())
            }
        };
        self.store
            .lock()
            .expect("session store poisoned")
            .save_room(snapshot)
            .map_err(ParlorError::Session)?;
        Ok(room_id)
    }

    /// Joins an existing room by id.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
    ) -> Result<RoomSnapshot, ParlorError> {
        let confirmed = join_room(
            &self.registry,
            &self.dialer,
            &self.endpoints,
            room_id,
            &self.token,
            Some(self.handler()),
            &self.handshake,
        )
        .await?;

        // The confirmation usually carries the room; fall back to REST
        // when it doesn't.
        let snapshot = match confirmed {
            Some(snapshot) => snapshot,
            None => self.api.get_room(room_id).await?,
        };
        self.store
            .lock()
            .expect("session store poisoned")
            .save_room(snapshot.clone())
            .map_err(ParlorError::Session)?;
        Ok(snapshot)
    }

    /// Leaves the active room: closes the connection, tells the server,
    /// and forgets the cached session. The server call is best-effort —
    /// the local teardown happens regardless.
    pub async fn leave_room(&self) -> Result<(), ParlorError> {
        let room_id = self.active_room_id()?;
        self.registry.disconnect(&room_id).await;
        if let Err(e) = self.api.leave_room(&room_id).await {
            tracing::warn!(%room_id, error = %e, "leave notification failed");
        }
        self.store
            .lock()
            .expect("session store poisoned")
            .remove_room()
            .map_err(ParlorError::Session)?;
        self.pending
            .lock()
            .expect("pending choice poisoned")
            .resolve(ChoiceResolution::RoomLeft);
        Ok(())
    }

    /// Proposes a game to the opponent.
    pub async fn choose_game(
        &self,
        game_type: &str,
    ) -> Result<(), ParlorError> {
        let room_id = self.active_room_id()?;
        self.registry
            .send(
                &room_id,
                &ClientCommand::ChooseGame {
                    game_type: game_type.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// Accepts the opponent's pending game proposal.
    ///
    /// The proposal is cleared as soon as the accept goes out; the
    /// server's confirmation follows as `game_started`.
    pub async fn accept_game(&self) -> Result<(), ParlorError> {
        self.answer_pending(true).await
    }

    /// Rejects the opponent's pending game proposal.
    pub async fn reject_game(&self) -> Result<(), ParlorError> {
        self.answer_pending(false).await
    }

    async fn answer_pending(&self, accept: bool) -> Result<(), ParlorError> {
        let room_id = self.active_room_id()?;
        let game_type = {
            let pending =
                self.pending.lock().expect("pending choice poisoned");
            pending
                .current()
                .map(|choice| choice.game_type.clone())
                .ok_or(ParlorError::NoPendingChoice)?
        };
        let command = if accept {
            ClientCommand::AcceptGame { game_type }
        } else {
            ClientCommand::RejectGame { game_type }
        };
        self.registry.send(&room_id, &command).await?;
        // Cleared only after the send succeeds, so a failed send leaves
        // the proposal answerable.
        let reason = if accept {
            ChoiceResolution::AcceptSent
        } else {
            ChoiceResolution::RejectSent
        };
        self.pending
            .lock()
            .expect("pending choice poisoned")
            .resolve(reason);
        Ok(())
    }

    /// Sends a game move. The payload shape is game-specific; the engine
    /// passes it through untouched.
    pub async fn send_move(
        &self,
        mv: serde_json::Value,
    ) -> Result<(), ParlorError> {
        let room_id = self.active_room_id()?;
        self.registry
            .send(&room_id, &ClientCommand::GameMove { mv })
            .await?;
        Ok(())
    }

    /// Restores a persisted session, if one exists and is still valid.
    ///
    /// Revalidates the mirrored snapshot against the server, then
    /// re-establishes the connection. Returns the restored room, or
    /// `None` when there is nothing (or nothing valid) to restore. A
    /// reconnect failure discards the session and also yields `None` —
    /// from the caller's view an unrestorable session and no session are
    /// the same thing.
    pub async fn restore_session(
        &self,
    ) -> Result<Option<RoomSnapshot>, ParlorError> {
        let Some(snapshot) = revalidate(&self.store, &self.api).await?
        else {
            return Ok(None);
        };

        match self
            .reconnector
            .sync_connection(
                &self.registry,
                &self.dialer,
                &self.endpoints,
                &self.token,
                &snapshot.id,
                self.handler(),
                &self.store,
                &self.handshake,
            )
            .await
        {
            Ok(()) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(error = %e, "session restore failed");
                Ok(None)
            }
        }
    }

    /// Enters the matchmaking queue. A `match_found` notice arrives over
    /// the room connection when the server pairs this player.
    pub async fn join_queue(&self) -> Result<(), ParlorError> {
        self.api.join_queue().await?;
        Ok(())
    }

    /// Leaves the matchmaking queue.
    pub async fn leave_queue(&self) -> Result<(), ParlorError> {
        self.api.leave_queue().await?;
        Ok(())
    }

    /// The cached room snapshot, if a session is active.
    pub fn room(&self) -> Option<RoomSnapshot> {
        self.store
            .lock()
            .expect("session store poisoned")
            .current()
            .cloned()
    }

    /// The opponent's outstanding game proposal, if any.
    pub fn pending_choice(&self) -> Option<PendingGameChoice> {
        self.pending
            .lock()
            .expect("pending choice poisoned")
            .current()
            .cloned()
    }

    /// Whether a live connection exists for the active room.
    pub fn is_connected(&self) -> bool {
        match self.active_room_id() {
            Ok(room_id) => self.registry.is_connected(&room_id),
            Err(_) => false,
        }
    }

    /// Closes every connection. The cached session stays; a later
    /// [`restore_session`](Self::restore_session) can pick it back up.
    pub async fn shutdown(&self) {
        self.registry.disconnect_all().await;
    }
}
