//! A task: one agent's prioritized bundle of device reservations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use super::schedule::{DeviceSchedule, SlotConflictError};
use super::time::{IntervalError, TimeInterval, Timestamp};

/// Reservation priority. Governs who may preempt whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Low,
    LowPreempt,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Low => "LOW",
            Priority::LowPreempt => "LOW_PREEMPT",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH" => Ok(Priority::High),
            "LOW" => Ok(Priority::Low),
            "LOW_PREEMPT" => Ok(Priority::LowPreempt),
            other => Err(format!("Unknown priority: {}", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a task, driven purely by the clock and by preemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    PreRun,
    Running,
    Preempted,
    Finished,
}

/// One requested window on one device.
///
/// Deserializes from a `[device, start, end]` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub device: String,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl SlotRequest {
    pub fn new(device: impl Into<String>, start: Timestamp, end: Timestamp) -> Self {
        Self {
            device: device.into(),
            start,
            end,
        }
    }
}

impl From<(String, Timestamp, Timestamp)> for SlotRequest {
    fn from((device, start, end): (String, Timestamp, Timestamp)) -> Self {
        Self { device, start, end }
    }
}

/// A window held on a device, as reported in conflict details.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotConflict {
    pub device: String,
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Reasons a task cannot be built from its requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Two requests for the same device overlap.
    #[error("request conflicts with itself on device '{device}': {source}")]
    SelfConflict {
        device: String,
        #[source]
        source: SlotConflictError,
    },

    #[error("device must be a nonempty string")]
    InvalidDevice,

    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),

    #[error("task has no requests")]
    Empty,
}

impl TaskError {
    /// Short error-kind label used in `MALFORMED_REQUEST: <kind>: <detail>`.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::SelfConflict { .. } => "ScheduleError",
            TaskError::InvalidDevice | TaskError::InvalidInterval(_) | TaskError::Empty => {
                "ValueError"
            }
        }
    }
}

/// A prioritized set of reservations owned by one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    agent_id: String,
    priority: Priority,
    bounding_window: TimeInterval,
    devices: BTreeMap<String, DeviceSchedule>,
    state: TaskState,
}

impl Task {
    /// Build a task from its requests and bring it up to date with `now`.
    ///
    /// Fails on empty device names, inverted windows, or two overlapping
    /// windows on the same device.
    pub fn new(
        agent_id: impl Into<String>,
        priority: Priority,
        requests: &[SlotRequest],
        now: Timestamp,
    ) -> Result<Self, TaskError> {
        let (devices, bounding_window) = Self::populate_schedule(requests)?;
        let mut task = Self {
            agent_id: agent_id.into(),
            priority,
            bounding_window,
            devices,
            state: TaskState::PreRun,
        };
        task.make_current(now);
        Ok(task)
    }

    fn populate_schedule(
        requests: &[SlotRequest],
    ) -> Result<(BTreeMap<String, DeviceSchedule>, TimeInterval), TaskError> {
        let mut devices: BTreeMap<String, DeviceSchedule> = BTreeMap::new();
        let mut bounding: Option<TimeInterval> = None;

        for request in requests {
            if request.device.trim().is_empty() {
                return Err(TaskError::InvalidDevice);
            }
            let slot = TimeInterval::new(request.start, request.end)?;
            devices
                .entry(request.device.clone())
                .or_default()
                .schedule_slot(slot)
                .map_err(|source| TaskError::SelfConflict {
                    device: request.device.clone(),
                    source,
                })?;
            match bounding.as_mut() {
                Some(window) => window.stretch_to_include(&slot),
                None => bounding = Some(slot),
            }
        }

        let bounding = bounding.ok_or(TaskError::Empty)?;
        Ok((devices, bounding))
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn bounding_window(&self) -> TimeInterval {
        self.bounding_window
    }

    pub fn devices(&self) -> &BTreeMap<String, DeviceSchedule> {
        &self.devices
    }

    /// Bring the task up to date with `now`.
    ///
    /// Drops devices whose reservations have all elapsed, then recomputes the
    /// state from the bounding window. Preemption is sticky until the
    /// truncated window elapses.
    pub fn make_current(&mut self, now: Timestamp) {
        if self.state == TaskState::Finished {
            self.devices.clear();
            return;
        }

        self.devices.retain(|_, schedule| !schedule.finished(now));

        let window = self.bounding_window;
        self.state = match self.state {
            TaskState::Preempted if now >= window.end() => TaskState::Finished,
            TaskState::Preempted => TaskState::Preempted,
            TaskState::PreRun | TaskState::Running => {
                if window.contains_inclusive_start(now) {
                    TaskState::Running
                } else if now < window.start() {
                    TaskState::PreRun
                } else {
                    TaskState::Finished
                }
            }
            TaskState::Finished => TaskState::Finished,
        };

        if self.state == TaskState::Finished {
            self.devices.clear();
        }
    }

    /// Active window per device; devices with nothing active are omitted.
    pub fn get_current_slots(&mut self, now: Timestamp) -> BTreeMap<String, TimeInterval> {
        self.devices
            .iter_mut()
            .filter_map(|(device, schedule)| {
                schedule
                    .get_current_slot(now)
                    .map(|slot| (device.clone(), slot))
            })
            .collect()
    }

    /// Our windows that overlap `other`'s on any shared device.
    pub fn get_conflicts(&self, other: &Task) -> Vec<SlotConflict> {
        let mut results = Vec::new();
        for (device, schedule) in &self.devices {
            let Some(theirs) = other.devices.get(device) else {
                continue;
            };
            results.extend(
                schedule
                    .get_conflicts(theirs)
                    .into_iter()
                    .map(|slot| SlotConflict {
                        device: device.clone(),
                        start: slot.start(),
                        end: slot.end(),
                    }),
            );
        }
        results
    }

    /// Whether this task may preempt `other`.
    ///
    /// Only HIGH preempts, never another HIGH, and never a plain LOW task that
    /// is already running.
    pub fn check_can_preempt_other(&self, other: &Task) -> bool {
        match (self.priority, other.priority) {
            (Priority::High, Priority::High) => false,
            (Priority::High, Priority::LowPreempt) => true,
            (Priority::High, Priority::Low) => other.state != TaskState::Running,
            (Priority::Low | Priority::LowPreempt, _) => false,
        }
    }

    /// Preempt this task, leaving at most `grace` of its active windows.
    ///
    /// Returns true when the task still holds something afterwards. A task
    /// with nothing active at `now` finishes immediately.
    pub fn preempt(&mut self, grace: TimeDelta, now: Timestamp) -> bool {
        self.make_current(now);
        match self.state {
            TaskState::Preempted => return true,
            TaskState::Finished => return false,
            TaskState::PreRun | TaskState::Running => {}
        }

        let mut any_remaining = false;
        for schedule in self.devices.values_mut() {
            if !schedule.prune_to_current(grace, now).is_empty() {
                any_remaining = true;
            }
        }
        self.devices.retain(|_, schedule| !schedule.is_empty());

        if any_remaining {
            self.state = TaskState::Preempted;
            self.bounding_window = TimeInterval::starting_at(now, grace);
            true
        } else {
            self.state = TaskState::Finished;
            self.devices.clear();
            false
        }
    }

    /// Earliest upcoming boundary across all devices.
    pub fn get_next_event_time(&mut self, now: Timestamp) -> Option<Timestamp> {
        self.devices
            .values_mut()
            .filter_map(|schedule| schedule.get_next_event_time(now))
            .min()
    }
}
