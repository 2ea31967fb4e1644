//! Durable mirror for the room snapshot.
//!
//! The session store writes the current snapshot through a
//! [`SnapshotStorage`] so a restarted process can find its way back to the
//! room. [`FileStorage`] keeps one JSON file; [`MemoryStorage`] backs
//! tests and embedders that don't want persistence.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use parlor_protocol::RoomSnapshot;

/// Durable storage for the active room snapshot.
///
/// A `load` that finds nothing returns `Ok(None)` — absence is the normal
/// first-run state, not an error. `clear` on an already-empty store is a
/// no-op for the same reason.
pub trait SnapshotStorage: Send + Sync + 'static {
    fn load(&self) -> io::Result<Option<RoomSnapshot>>;
    fn store(&self, snapshot: &RoomSnapshot) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

impl<S: SnapshotStorage> SnapshotStorage for std::sync::Arc<S> {
    fn load(&self) -> io::Result<Option<RoomSnapshot>> {
        (**self).load()
    }

    fn store(&self, snapshot: &RoomSnapshot) -> io::Result<()> {
        (**self).store(snapshot)
    }

    fn clear(&self) -> io::Result<()> {
        (**self).clear()
    }
}

/// Snapshot mirror backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStorage for FileStorage {
    fn load(&self) -> io::Result<Option<RoomSnapshot>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let snapshot = serde_json::from_str(&text).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("corrupt snapshot file: {e}"),
            )
        })?;
        Ok(Some(snapshot))
    }

    fn store(&self, snapshot: &RoomSnapshot) -> io::Result<()> {
        let text = serde_json::to_string(snapshot).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(&self.path, text)
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory [`SnapshotStorage`].
///
/// Stores the serialized form rather than the struct so it exercises the
/// same encode/decode path as the file mirror.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    cell: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> io::Result<Option<RoomSnapshot>> {
        let cell = self.cell.lock().expect("storage cell poisoned");
        match cell.as_deref() {
            None => Ok(None),
            Some(text) => serde_json::from_str(text).map(Some).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            }),
        }
    }

    fn store(&self, snapshot: &RoomSnapshot) -> io::Result<()> {
        let text = serde_json::to_string(snapshot).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, e.to_string())
        })?;
        *self.cell.lock().expect("storage cell poisoned") = Some(text);
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.cell.lock().expect("storage cell poisoned") = None;
        Ok(())
    }
}
