//! Steady-state envelope dispatch.
//!
//! [`RoomEventDispatcher`] is the default [`EnvelopeHandler`]: it owns the
//! mapping from classified server events to session-store and
//! pending-choice mutations. Handshake-terminal events that leak through
//! after settlement are ignored here; the settlement machine already
//! consumed the one that mattered.

use std::sync::{Arc, Mutex};

use parlor_protocol::{Envelope, RoomPatch, ServerEvent};

use crate::pending::{ChoiceResolution, PendingChoice};
use crate::registry::EnvelopeHandler;
use crate::store::SessionStore;

/// Routes classified server events into the session state.
///
/// Dispatch is synchronous and infallible from the pump's point of view:
/// parse failures and storage failures are logged, never propagated, so
/// one bad frame or one failed mirror write cannot kill the connection.
pub struct RoomEventDispatcher {
    store: Arc<Mutex<SessionStore>>,
    pending: Arc<Mutex<PendingChoice>>,
}

impl RoomEventDispatcher {
    pub fn new(
        store: Arc<Mutex<SessionStore>>,
        pending: Arc<Mutex<PendingChoice>>,
    ) -> Self {
        Self { store, pending }
    }

    fn apply_patch(&self, patch: RoomPatch) {
        let mut store = self.store.lock().expect("session store poisoned");
        let result = if store.current().is_some() {
            store.update_room(patch)
        } else {
            // No cached snapshot to merge into. If the patch is complete
            // enough to stand alone, promote it; otherwise drop it.
            match patch.into_snapshot() {
                Some(snapshot) => store.save_room(snapshot),
                None => {
                    tracing::debug!(
                        "dropping partial room update with no cached snapshot"
                    );
                    Ok(())
                }
            }
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to apply room update");
        }
    }

    fn resolve_pending(&self, reason: ChoiceResolution) {
        self.pending
            .lock()
            .expect("pending choice poisoned")
            .resolve(reason);
    }
}

impl EnvelopeHandler for RoomEventDispatcher {
    fn handle(&self, envelope: Envelope) {
        let event = match envelope.event() {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(
                    kind = %envelope.kind,
                    error = %e,
                    "dropping malformed envelope"
                );
                return;
            }
        };
        match event {
            ServerEvent::OpponentLeft => {
                let mut store =
                    self.store.lock().expect("session store poisoned");
                if let Err(e) = store.remove_room() {
                    tracing::warn!(error = %e, "failed to clear room");
                }
            }
            ServerEvent::RoomUpdated(patch)
            | ServerEvent::MoveMade(patch) => self.apply_patch(patch),
            ServerEvent::Joined {
                snapshot: Some(snapshot),
            } => {
                let mut store =
                    self.store.lock().expect("session store poisoned");
                if let Err(e) = store.save_room(snapshot) {
                    tracing::warn!(error = %e, "failed to save room");
                }
            }
            ServerEvent::GameStarted { game_type } => {
                self.resolve_pending(ChoiceResolution::Started);
                if game_type.is_some() {
                    self.apply_patch(RoomPatch {
                        game_name: game_type,
                        ..Default::default()
                    });
                }
            }
            ServerEvent::GameChosen(choice) => {
                self.pending
                    .lock()
                    .expect("pending choice poisoned")
                    .propose(choice);
            }
            ServerEvent::GameAccepted => {
                self.resolve_pending(ChoiceResolution::Accepted);
            }
            ServerEvent::GameRejected => {
                self.resolve_pending(ChoiceResolution::Rejected);
            }
            // Handshake-terminal events after settlement, join
            // confirmations without state, and strangers: nothing to do.
            ServerEvent::RoomCreated { .. }
            | ServerEvent::Joined { snapshot: None }
            | ServerEvent::ServerError { .. }
            | ServerEvent::Unknown => {}
        }
    }
}
