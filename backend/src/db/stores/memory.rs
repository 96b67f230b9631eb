use std::sync::Arc;

use parking_lot::RwLock;

use super::StateStore;
use crate::db::error::{ErrorContext, PersistenceError, PersistenceResult};

/// In-memory snapshot store.
///
/// Clones share the same buffer, so a test can hand one clone to the manager
/// and inspect or tamper with the snapshot through another.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    data: Arc<RwLock<MemoryData>>,
}

#[derive(Default)]
struct MemoryData {
    snapshot: Option<String>,
    saves: usize,
    failing: bool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `snapshot`, as if saved by an earlier run.
    pub fn with_snapshot(snapshot: impl Into<String>) -> Self {
        let store = Self::new();
        store.data.write().snapshot = Some(snapshot.into());
        store
    }

    /// Current snapshot text.
    pub fn snapshot(&self) -> Option<String> {
        self.data.read().snapshot.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.data.read().saves
    }

    /// Make every subsequent save fail, for exercising the error path.
    pub fn set_failing(&self, failing: bool) {
        self.data.write().failing = failing;
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> PersistenceResult<Option<String>> {
        Ok(self.data.read().snapshot.clone())
    }

    fn save(&self, snapshot: &str) -> PersistenceResult<()> {
        let mut data = self.data.write();
        if data.failing {
            return Err(PersistenceError::io(
                std::io::Error::new(std::io::ErrorKind::Other, "memory store set to fail"),
                ErrorContext::new("save_state"),
            ));
        }
        data.snapshot = Some(snapshot.to_string());
        data.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
