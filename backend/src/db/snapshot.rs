//! Serialized form of the task table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, PersistenceError, PersistenceResult};
use crate::models::Task;

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    tasks: BTreeMap<String, Task>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    tasks: &'a BTreeMap<String, Task>,
}

/// Encode the task table as a JSON snapshot.
pub fn encode(tasks: &BTreeMap<String, Task>) -> PersistenceResult<String> {
    serde_json::to_string(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        tasks,
    })
    .map_err(|e| PersistenceError::corrupt(e.to_string(), ErrorContext::new("encode_snapshot")))
}

/// Decode a JSON snapshot back into a task table.
///
/// Intervals and per-device schedules re-check their invariants while
/// decoding, so a snapshot with inverted or self-overlapping windows is
/// rejected as corrupt along with malformed JSON and unknown versions.
pub fn decode(content: &str) -> PersistenceResult<BTreeMap<String, Task>> {
    let snapshot: Snapshot = serde_json::from_str(content).map_err(|e| {
        PersistenceError::corrupt(e.to_string(), ErrorContext::new("decode_snapshot"))
    })?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::corrupt(
            format!("unsupported snapshot version {}", snapshot.version),
            ErrorContext::new("decode_snapshot"),
        ));
    }
    Ok(snapshot.tasks)
}
