//! Single-flight reconnection for a restored session.
//!
//! After revalidation says a persisted room still exists, the connection
//! has to be re-established. Several triggers can ask for this at once
//! (startup, focus regained, a UI retry), so the [`Reconnector`] collapses
//! concurrent requests: one attempt flies, the rest return immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use parlor_protocol::RoomId;
use parlor_transport::{Dialer, Endpoints};

use crate::error::SessionError;
use crate::handshake::{self, HandshakeConfig};
use crate::registry::{ConnectionRegistry, EnvelopeHandler};
use crate::store::SessionStore;

/// Clears the in-flight flag when the attempt ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Collapses concurrent reconnection attempts into one.
#[derive(Debug, Default)]
pub struct Reconnector {
    in_flight: AtomicBool,
}

impl Reconnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a live connection for `room_id`, joining it if necessary.
    ///
    /// Three outcomes:
    /// - Already connected: the handler is (re)installed on the existing
    ///   connection and nothing is dialed.
    /// - Another attempt is in flight: returns `Ok(())` immediately; the
    ///   winner's result stands for everyone.
    /// - Otherwise one join handshake is attempted. A failed attempt is
    ///   fatal for the session: the cached room is discarded, no retry is
    ///   scheduled, and the error is returned.
    #[allow(clippy::too_many_arguments)]
    pub async fn sync_connection<D: Dialer>(
        &self,
        registry: &ConnectionRegistry<D::Connection>,
        dialer: &D,
        endpoints: &Endpoints,
        token: &str,
        room_id: &RoomId,
        handler: Arc<dyn EnvelopeHandler>,
        store: &Arc<Mutex<SessionStore>>,
        config: &HandshakeConfig,
    ) -> Result<(), SessionError> {
        if registry.is_connected(room_id) {
            registry.set_message_handler(room_id, handler);
            return Ok(());
        }

        if self
            .in_flight
            .compare_exchange(
                false,
                true,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            tracing::debug!(%room_id, "reconnect already in flight");
            return Ok(());
        }
        let _guard = FlightGuard(&self.in_flight);

        match handshake::join_room(
            registry,
            dialer,
            endpoints,
            room_id,
            token,
            Some(handler),
            config,
        )
        .await
        {
            Ok(_snapshot) => {
                tracing::info!(%room_id, "reconnected to room");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    %room_id,
                    error = %e,
                    "reconnect failed, discarding session"
                );
                let mut store =
                    store.lock().expect("session store poisoned");
                store.remove_room()?;
                Err(e)
            }
        }
    }
}
