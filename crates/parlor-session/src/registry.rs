//! The connection registry: live room connections and their read pumps.
//!
//! Each registered room owns one connection, one handler slot, and one
//! pump task that drains inbound frames. Registering a connection for a
//! room that already has one replaces it; the old pump is aborted and the
//! old socket closed. The handler slot is hot-swappable: every frame is
//! delivered to whichever handler occupies the slot at delivery time, so a
//! swap never double-delivers and never drops frames into a gap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use parlor_protocol::{ClientCommand, Envelope, RoomId};
use parlor_transport::{Connection, Dialer, Incoming};
use tokio::task::JoinHandle;

use crate::error::SessionError;
use crate::notify::{Notice, Notifier};

/// Receives every decoded envelope from a room's connection.
pub trait EnvelopeHandler: Send + Sync {
    fn handle(&self, envelope: Envelope);
}

impl<F> EnvelopeHandler for F
where
    F: Fn(Envelope) + Send + Sync,
{
    fn handle(&self, envelope: Envelope) {
        self(envelope)
    }
}

/// The swappable handler position for one room. The pump clones out of
/// the slot per frame, so a swap takes effect on the next frame.
type HandlerSlot = Arc<Mutex<Option<Arc<dyn EnvelopeHandler>>>>;

struct Registered<C> {
    conn: Arc<C>,
    handler: HandlerSlot,
    pump: JoinHandle<()>,
}

/// Registry of live room connections, keyed by room id.
///
/// All mutating operations take the registry lock for a single step, so
/// concurrent connect/disconnect/swap calls interleave at operation
/// granularity and the map is never observed mid-update.
pub struct ConnectionRegistry<C: Connection> {
    inner: Arc<Mutex<HashMap<RoomId, Registered<C>>>>,
    notifier: Arc<dyn Notifier>,
}

impl<C: Connection> Clone for ConnectionRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<C: Connection> ConnectionRegistry<C> {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            notifier,
        }
    }

    /// The notification sink connections report through.
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Registers `conn` for `room_id` and starts its read pump.
    ///
    /// If the room already had a connection, the old one is replaced: its
    /// pump is aborted and its socket closed in the background.
    pub fn add_connection(
        &self,
        room_id: RoomId,
        conn: Arc<C>,
        handler: Option<Arc<dyn EnvelopeHandler>>,
    ) {
        let slot: HandlerSlot = Arc::new(Mutex::new(handler));

        // Spawn and insert under one lock: the pump's exit path takes the
        // same lock to remove the entry, so even a pump that finishes
        // immediately finds the entry it is supposed to clean up.
        let replaced = {
            let mut inner = self.inner.lock().expect("registry poisoned");
            let pump = self.spawn_pump(
                room_id.clone(),
                Arc::clone(&conn),
                Arc::clone(&slot),
            );
            inner.insert(
                room_id.clone(),
                Registered {
                    conn,
                    handler: slot,
                    pump,
                },
            )
        };
        if let Some(old) = replaced {
            tracing::debug!(%room_id, "replacing existing room connection");
            old.pump.abort();
            tokio::spawn(async move {
                let _ = old.conn.close().await;
            });
        }
    }

    /// Dials `url` and registers the resulting connection for `room_id`.
    pub async fn connect<D>(
        &self,
        dialer: &D,
        url: &str,
        room_id: RoomId,
    ) -> Result<(), SessionError>
    where
        D: Dialer<Connection = C>,
    {
        self.disconnect(&room_id).await;
        let conn = dialer.dial(url).await?;
        self.add_connection(room_id, Arc::new(conn), None);
        Ok(())
    }

    /// Closes and forgets the connection for `room_id`, if any.
    /// Disconnecting an unknown room is a no-op.
    pub async fn disconnect(&self, room_id: &RoomId) {
        let removed = {
            let mut inner = self.inner.lock().expect("registry poisoned");
            inner.remove(room_id)
        };
        if let Some(entry) = removed {
            entry.pump.abort();
            if let Err(e) = entry.conn.close().await {
                tracing::debug!(%room_id, error = %e, "close on disconnect failed");
            }
            tracing::debug!(%room_id, "room connection closed");
        }
    }

    /// Closes every registered connection.
    pub async fn disconnect_all(&self) {
        let rooms: Vec<RoomId> = {
            let inner = self.inner.lock().expect("registry poisoned");
            inner.keys().cloned().collect()
        };
        for room_id in rooms {
            self.disconnect(&room_id).await;
        }
    }

    /// The live connection for `room_id`, if registered.
    pub fn get_connection(&self, room_id: &RoomId) -> Option<Arc<C>> {
        let inner = self.inner.lock().expect("registry poisoned");
        inner.get(room_id).map(|entry| Arc::clone(&entry.conn))
    }

    pub fn is_connected(&self, room_id: &RoomId) -> bool {
        let inner = self.inner.lock().expect("registry poisoned");
        inner.contains_key(room_id)
    }

    /// Installs `handler` as the room's envelope handler, replacing any
    /// previous one. Frames already delivered stay with the old handler;
    /// subsequent frames go to the new one. No-op if the room has no
    /// connection.
    pub fn set_message_handler(
        &self,
        room_id: &RoomId,
        handler: Arc<dyn EnvelopeHandler>,
    ) {
        let inner = self.inner.lock().expect("registry poisoned");
        let Some(entry) = inner.get(room_id) else {
            tracing::debug!(%room_id, "handler set for unregistered room, ignoring");
            return;
        };
        *entry.handler.lock().expect("handler slot poisoned") =
            Some(handler);
    }

    /// Encodes and sends a command over the room's connection.
    pub async fn send(
        &self,
        room_id: &RoomId,
        command: &ClientCommand,
    ) -> Result<(), SessionError> {
        let conn = self
            .get_connection(room_id)
            .ok_or_else(|| SessionError::NotConnected(room_id.clone()))?;
        let payload = command.encode()?;
        conn.send(&payload).await?;
        Ok(())
    }

    /// Spawns the read pump for a freshly registered connection.
    ///
    /// The handler slot is captured here rather than looked up through
    /// the map per frame, so a frame that is already waiting when the
    /// connection is registered still reaches the handler.
    ///
    /// The pump exits when the connection closes or errors, then removes
    /// its own registry entry — but only if the entry still holds *this*
    /// connection. A replacement racing the pump's exit must not have its
    /// new entry torn down by the old pump.
    fn spawn_pump(
        &self,
        room_id: RoomId,
        conn: Arc<C>,
        slot: HandlerSlot,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            loop {
                match conn.recv().await {
                    Ok(Incoming::Frame(frame)) => {
                        let envelope = match Envelope::decode(&frame) {
                            Ok(envelope) => envelope,
                            Err(e) => {
                                tracing::debug!(
                                    %room_id,
                                    error = %e,
                                    "dropping undecodable frame"
                                );
                                continue;
                            }
                        };
                        if let Some(notice) =
                            Notice::from_envelope(&envelope)
                        {
                            notifier.notify(notice);
                        }
                        let handler = slot
                            .lock()
                            .expect("handler slot poisoned")
                            .clone();
                        if let Some(handler) = handler {
                            handler.handle(envelope);
                        }
                    }
                    Ok(Incoming::Closed(info)) => {
                        tracing::debug!(
                            %room_id,
                            close = ?info,
                            "room connection closed by peer"
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(
                            %room_id,
                            error = %e,
                            "room connection receive failed"
                        );
                        break;
                    }
                }
            }
            let mut map = inner.lock().expect("registry poisoned");
            if let Some(entry) = map.get(&room_id) {
                if Arc::ptr_eq(&entry.conn, &conn) {
                    map.remove(&room_id);
                }
            }
        })
    }
}
