//! Snapshot store implementations.
//!
//! The manager only ever sees a [`StateStore`]; the concrete store decides
//! where the snapshot text lives.
//!
//! - [`FileStateStore`]: JSON file on local disk
//! - [`MemoryStateStore`]: in-process buffer for tests and embedding

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use super::error::PersistenceResult;

/// Durable home for the scheduler snapshot.
pub trait StateStore: Send + Sync {
    /// Read the last saved snapshot. `Ok(None)` when nothing was saved yet.
    fn load(&self) -> PersistenceResult<Option<String>>;

    /// Replace the saved snapshot.
    fn save(&self, snapshot: &str) -> PersistenceResult<()>;

    /// Human-readable location, used in log lines.
    fn describe(&self) -> String;
}
