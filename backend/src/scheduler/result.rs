//! Outcome types returned across the messaging boundary.
//!
//! Errors are plain result codes rather than panics so they can be published
//! back to the requesting agent unchanged.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::SlotConflict;

/// Conflicting holders: `agent_id -> task_id -> held windows`.
pub type ConflictMap = BTreeMap<String, BTreeMap<String, Vec<SlotConflict>>>;

/// A task that lost its reservation to a HIGH priority request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PreemptedTask {
    pub agent_id: String,
    pub task_id: String,
}

/// Request failures. `Display` yields exactly the wire result code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("TASK_ID_ALREADY_EXISTS")]
    TaskIdAlreadyExists,

    #[error("MISSING_TASK_ID")]
    MissingTaskId,

    #[error("MISSING_PRIORITY")]
    MissingPriority,

    #[error("INVALID_PRIORITY")]
    InvalidPriority,

    #[error("MISSING_AGENT_ID")]
    MissingAgentId,

    #[error("MALFORMED_REQUEST_EMPTY")]
    MalformedRequestEmpty,

    #[error("MALFORMED_REQUEST: {kind}: {detail}")]
    MalformedRequest { kind: String, detail: String },

    #[error("REQUEST_CONFLICTS_WITH_SELF")]
    RequestConflictsWithSelf,

    #[error("CONFLICTS_WITH_EXISTING_SCHEDULES")]
    ConflictsWithExistingSchedules(ConflictMap),

    #[error("TASK_ID_DOES_NOT_EXIST")]
    TaskIdDoesNotExist,

    #[error("AGENT_ID_TASK_ID_MISMATCH")]
    AgentIdTaskIdMismatch,
}

impl ScheduleError {
    pub fn malformed(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedRequest {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}

/// Payload of a [`RequestResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultData {
    /// Serializes as `{}`.
    Empty(BTreeMap<String, String>),
    Conflicts(ConflictMap),
    Preempted(BTreeSet<PreemptedTask>),
}

impl ResultData {
    pub fn empty() -> Self {
        ResultData::Empty(BTreeMap::new())
    }
}

/// `{success, data, info}` triple handed back to the messaging layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestResult {
    pub success: bool,
    pub data: ResultData,
    pub info: String,
}

impl RequestResult {
    pub fn ok(data: ResultData) -> Self {
        Self {
            success: true,
            data,
            info: String::new(),
        }
    }

    /// Preempted tasks on success, empty otherwise.
    pub fn preempted(&self) -> Option<&BTreeSet<PreemptedTask>> {
        match &self.data {
            ResultData::Preempted(tasks) => Some(tasks),
            _ => None,
        }
    }

    /// Conflict detail on a `CONFLICTS_WITH_EXISTING_SCHEDULES` failure.
    pub fn conflicts(&self) -> Option<&ConflictMap> {
        match &self.data {
            ResultData::Conflicts(map) => Some(map),
            _ => None,
        }
    }
}

impl From<ScheduleError> for RequestResult {
    fn from(err: ScheduleError) -> Self {
        let info = err.to_string();
        let data = match err {
            ScheduleError::ConflictsWithExistingSchedules(map) => ResultData::Conflicts(map),
            _ => ResultData::empty(),
        };
        Self {
            success: false,
            data,
            info,
        }
    }
}

/// Who holds a device right now and for how much longer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub agent_id: String,
    pub task_id: String,
    /// Seconds until the holder's current window ends.
    pub time_remaining: f64,
}
