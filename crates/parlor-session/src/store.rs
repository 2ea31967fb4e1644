//! The locally cached room snapshot and its durable mirror.
//!
//! The [`SessionStore`] holds the snapshot the rest of the engine reads
//! and writes, and keeps the [`SnapshotStorage`] mirror in sync. Writes go
//! to storage first and to memory second, so the mirror never gets ahead
//! of what the process has acknowledged.

use std::future::Future;
use std::sync::Mutex;

use parlor_protocol::{RoomId, RoomPatch, RoomSnapshot};

use crate::error::SessionError;
use crate::storage::SnapshotStorage;

/// Looks up the canonical state of a room by id.
///
/// Implemented by the REST client; tests substitute fixtures. Used to
/// revalidate a persisted snapshot against the server on startup.
pub trait RoomDirectory: Send + Sync {
    fn fetch_room(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<RoomSnapshot, SessionError>> + Send;
}

/// The cached room snapshot plus its durable mirror.
pub struct SessionStore {
    current: Option<RoomSnapshot>,
    storage: Box<dyn SnapshotStorage>,
}

impl SessionStore {
    pub fn new(storage: Box<dyn SnapshotStorage>) -> Self {
        Self {
            current: None,
            storage,
        }
    }

    /// Replaces the cached snapshot with a full new value and mirrors it.
    pub fn save_room(
        &mut self,
        snapshot: RoomSnapshot,
    ) -> Result<(), SessionError> {
        self.storage.store(&snapshot)?;
        self.current = Some(snapshot);
        Ok(())
    }

    /// Forgets the room entirely, clearing the mirror too.
    pub fn remove_room(&mut self) -> Result<(), SessionError> {
        self.storage.clear()?;
        self.current = None;
        Ok(())
    }

    /// Shallow-merges a patch into the cached snapshot.
    ///
    /// A patch arriving with no snapshot cached is dropped; patches are
    /// deltas and there is nothing to apply them to. Callers that want
    /// patch-to-snapshot promotion do that explicitly via
    /// [`RoomPatch::into_snapshot`].
    pub fn update_room(
        &mut self,
        patch: RoomPatch,
    ) -> Result<(), SessionError> {
        let Some(current) = &self.current else {
            tracing::debug!("dropping room patch with no cached snapshot");
            return Ok(());
        };
        let mut merged = current.clone();
        patch.apply(&mut merged);
        self.save_room(merged)
    }

    /// The cached snapshot, if a room is active.
    pub fn current(&self) -> Option<&RoomSnapshot> {
        self.current.as_ref()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.current.as_ref().map(|room| &room.id)
    }

    /// Loads the persisted snapshot into the cache without touching the
    /// mirror. Returns what was found. A corrupt mirror is cleared and
    /// reported as absent; a session that can't be read can't be resumed.
    pub fn load_persisted(
        &mut self,
    ) -> Result<Option<RoomSnapshot>, SessionError> {
        match self.storage.load() {
            Ok(Some(snapshot)) => {
                self.current = Some(snapshot.clone());
                Ok(Some(snapshot))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable snapshot mirror");
                self.storage.clear()?;
                Ok(None)
            }
        }
    }
}

/// Revalidates any persisted session against the directory.
///
/// Loads the mirrored snapshot, then fetches the canonical room from the
/// server. A successful fetch refreshes the cache with the canonical
/// state. A failed fetch means the room is gone or unreachable; the stale
/// session is discarded silently and `Ok(None)` is returned, since an
/// expired session from a previous run is not an application error.
pub async fn revalidate<D: RoomDirectory>(
    store: &Mutex<SessionStore>,
    directory: &D,
) -> Result<Option<RoomSnapshot>, SessionError> {
    let persisted = {
        let mut store = store.lock().expect("session store poisoned");
        store.load_persisted()?
    };
    let Some(persisted) = persisted else {
        return Ok(None);
    };

    match directory.fetch_room(&persisted.id).await {
        Ok(canonical) => {
            let mut store = store.lock().expect("session store poisoned");
            store.save_room(canonical.clone())?;
            Ok(Some(canonical))
        }
        Err(e) => {
            tracing::info!(
                room_id = %persisted.id,
                error = %e,
                "persisted room no longer valid, discarding"
            );
            let mut store = store.lock().expect("session store poisoned");
            store.remove_room()?;
            Ok(None)
        }
    }
}
