//! Reservation engine.
//!
//! [`ScheduleManager`] owns every [`Task`] and arbitrates exclusive,
//! time-windowed access to devices among competing agents. It is a plain
//! synchronous data structure driven entirely by a caller-supplied `now`:
//! there are no timers or internal locks. Callers must serialize access
//! (one actor thread, or an external mutex) and poll
//! [`ScheduleManager::get_next_event_time`] to know when to come back.
//!
//! Every refresh first brings all tasks up to date with `now`, dropping
//! finished ones and recomputing which tasks are running or preempted.

pub mod requests;
pub mod result;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, error, info, warn};

use crate::db::{
    snapshot, ErrorContext, FileStateStore, PersistenceError, PersistenceResult, SchedulerConfig,
    StateStore,
};
use crate::models::{
    round_up_to_second, Priority, SlotRequest, Task, TaskError, TaskState, Timestamp,
};

pub use requests::{parse_requests, parse_timestamp, RawSlotRequest};
pub use result::{ConflictMap, DeviceState, PreemptedTask, RequestResult, ResultData, ScheduleError};

/// Longest grace period, matching what configuration can express.
const MAX_GRACE_SECONDS: i64 = u32::MAX as i64;

/// One device claimed by two tasks that must never share it.
#[derive(Debug, thiserror::Error)]
#[error("device {device} held by both task {first} and task {second}")]
struct DoubleBooking {
    device: String,
    first: String,
    second: String,
}

/// Process-wide reservation table.
pub struct ScheduleManager {
    tasks: BTreeMap<String, Task>,
    running_tasks: BTreeSet<String>,
    preempted_tasks: BTreeSet<String>,
    grace_time: TimeDelta,
    store: Option<Box<dyn StateStore>>,
}

impl ScheduleManager {
    /// Create a manager and recover whatever the store holds.
    ///
    /// With no store, persistence is disabled and the table starts empty.
    pub fn new(grace_time: TimeDelta, now: Timestamp, store: Option<Box<dyn StateStore>>) -> Self {
        let mut manager = Self {
            tasks: BTreeMap::new(),
            running_tasks: BTreeSet::new(),
            preempted_tasks: BTreeSet::new(),
            grace_time: grace_time
                .clamp(TimeDelta::zero(), TimeDelta::seconds(MAX_GRACE_SECONDS)),
            store,
        };
        manager.load_state(now);
        manager
    }

    /// Create a manager from configuration, persisting to the configured file.
    pub fn from_config(config: &SchedulerConfig, now: Timestamp) -> Self {
        let store = config
            .scheduler
            .schedule_state_file
            .as_ref()
            .map(|path| Box::new(FileStateStore::new(path)) as Box<dyn StateStore>);
        Self::new(config.scheduler.grace_time(), now, store)
    }

    pub fn grace_time(&self) -> TimeDelta {
        self.grace_time
    }

    pub fn set_grace_period(&mut self, seconds: u32) {
        self.grace_time = TimeDelta::seconds(i64::from(seconds));
    }

    /// Look up a task without refreshing.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// Task ids currently in the table.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ask for a set of device windows.
    ///
    /// Succeeds only when every conflicting holder can be preempted; those
    /// holders are then truncated to the grace period and reported in the
    /// result. Otherwise nothing changes and the conflicts are reported.
    pub fn request_slots(
        &mut self,
        agent_id: Option<&str>,
        task_id: Option<&str>,
        requests: &[SlotRequest],
        priority: Option<&str>,
        now: Timestamp,
    ) -> RequestResult {
        match self.try_request_slots(agent_id, task_id, requests, priority, now) {
            Ok(preempted) => RequestResult::ok(ResultData::Preempted(preempted)),
            Err(err) => {
                match &err {
                    ScheduleError::ConflictsWithExistingSchedules(conflicts) => warn!(
                        "Request {:?} from {:?} rejected: conflicts with {} agent(s)",
                        task_id,
                        agent_id,
                        conflicts.len()
                    ),
                    other => debug!("Request {:?} from {:?} rejected: {}", task_id, agent_id, other),
                }
                err.into()
            }
        }
    }

    fn try_request_slots(
        &mut self,
        agent_id: Option<&str>,
        task_id: Option<&str>,
        requests: &[SlotRequest],
        priority: Option<&str>,
        now: Timestamp,
    ) -> Result<BTreeSet<PreemptedTask>, ScheduleError> {
        self.cleanup(now);

        if task_id.is_some_and(|id| self.tasks.contains_key(id)) {
            return Err(ScheduleError::TaskIdAlreadyExists);
        }
        let task_id = require_nonempty(task_id, ScheduleError::MissingTaskId, "taskid")?;
        let priority: Priority = priority
            .ok_or(ScheduleError::MissingPriority)?
            .parse()
            .map_err(|_| ScheduleError::InvalidPriority)?;
        let agent_id = require_nonempty(agent_id, ScheduleError::MissingAgentId, "agentid")?;
        if requests.is_empty() {
            return Err(ScheduleError::MalformedRequestEmpty);
        }

        let new_task = Task::new(agent_id, priority, requests, now).map_err(|err| match err {
            TaskError::SelfConflict { .. } => ScheduleError::RequestConflictsWithSelf,
            other => ScheduleError::malformed(other.kind(), other.to_string()),
        })?;

        let mut conflicts = ConflictMap::new();
        let mut to_preempt = BTreeSet::new();

        for (holder_id, holder) in &self.tasks {
            let held = holder.get_conflicts(&new_task);
            if held.is_empty() {
                continue;
            }
            if new_task.check_can_preempt_other(holder) {
                to_preempt.insert(PreemptedTask {
                    agent_id: holder.agent_id().to_string(),
                    task_id: holder_id.clone(),
                });
            } else {
                conflicts
                    .entry(holder.agent_id().to_string())
                    .or_default()
                    .insert(holder_id.clone(), held);
            }
        }

        if !conflicts.is_empty() {
            return Err(ScheduleError::ConflictsWithExistingSchedules(conflicts));
        }

        info!(
            "Accepted task {} for agent {} ({}, {} preemption(s))",
            task_id,
            agent_id,
            priority,
            to_preempt.len()
        );
        self.tasks.insert(task_id.to_string(), new_task);

        for victim in &to_preempt {
            if let Some(task) = self.tasks.get_mut(&victim.task_id) {
                let lingering = task.preempt(self.grace_time, now);
                debug!(
                    "Preempted task {} of agent {} (still holding: {})",
                    victim.task_id, victim.agent_id, lingering
                );
            }
        }

        self.save_state(now);
        Ok(to_preempt)
    }

    /// Withdraw a task. Only the owning agent may cancel it.
    pub fn cancel_task(&mut self, agent_id: &str, task_id: &str, now: Timestamp) -> RequestResult {
        self.cleanup(now);

        let Some(task) = self.tasks.get(task_id) else {
            return ScheduleError::TaskIdDoesNotExist.into();
        };
        if task.agent_id() != agent_id {
            warn!(
                "Agent {} tried to cancel task {} owned by {}",
                agent_id,
                task_id,
                task.agent_id()
            );
            return ScheduleError::AgentIdTaskIdMismatch.into();
        }

        self.tasks.remove(task_id);
        info!("Cancelled task {} for agent {}", task_id, agent_id);
        self.save_state(now);
        RequestResult::ok(ResultData::empty())
    }

    /// Current holder of every device with an active window.
    ///
    /// A preempted task's grace window may overlap the window of the HIGH
    /// task that displaced it; on such a collision the preempted holder is
    /// reported.
    ///
    /// # Panics
    /// If two running tasks, or two preempted tasks, hold the same device at
    /// once. That would mean the non-overlap guarantee was broken.
    pub fn get_schedule_state(&mut self, now: Timestamp) -> BTreeMap<String, DeviceState> {
        self.cleanup(now);

        let running_ids = self.running_tasks.clone();
        let preempted_ids = self.preempted_tasks.clone();
        let collected = self.collect_device_states(&running_ids, now).and_then(|mut running| {
            running.extend(self.collect_device_states(&preempted_ids, now)?);
            Ok(running)
        });
        match collected {
            Ok(states) => states,
            Err(clash) => panic!("{}", clash),
        }
    }

    fn collect_device_states(
        &mut self,
        task_ids: &BTreeSet<String>,
        now: Timestamp,
    ) -> Result<BTreeMap<String, DeviceState>, DoubleBooking> {
        let mut states = BTreeMap::new();
        for task_id in task_ids {
            let Some(task) = self.tasks.get_mut(task_id) else {
                continue;
            };
            for (device, slot) in task.get_current_slots(now) {
                let remaining = slot.end() - now;
                let state = DeviceState {
                    agent_id: task.agent_id().to_string(),
                    task_id: task_id.clone(),
                    time_remaining: remaining.num_seconds() as f64
                        + f64::from(remaining.subsec_nanos()) / 1e9,
                };
                if let Some(previous) = states.insert(device.clone(), state) {
                    return Err(DoubleBooking {
                        device,
                        first: previous.task_id,
                        second: task_id.clone(),
                    });
                }
            }
        }
        Ok(states)
    }

    /// Earliest moment at which any task changes state.
    pub fn get_next_event_time(&mut self, now: Timestamp) -> Option<Timestamp> {
        self.tasks
            .values_mut()
            .filter_map(|task| task.get_next_event_time(now))
            .min()
    }

    /// When the caller's polling loop should next refresh the engine.
    ///
    /// The next event time, but never later than `now + publish_interval`
    /// (rounded up to the second).
    pub fn next_update_time(&mut self, now: Timestamp, publish_interval: TimeDelta) -> Timestamp {
        let latest = round_up_to_second(
            now.checked_add_signed(publish_interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        match self.get_next_event_time(now) {
            Some(next) if next < latest => next,
            _ => latest,
        }
    }

    /// Bring every task up to date with `now`.
    ///
    /// Finished tasks are dropped; the running and preempted sets are rebuilt.
    pub fn cleanup(&mut self, now: Timestamp) {
        self.running_tasks.clear();
        self.preempted_tasks.clear();

        let running = &mut self.running_tasks;
        let preempted = &mut self.preempted_tasks;
        self.tasks.retain(|task_id, task| {
            task.make_current(now);
            match task.state() {
                TaskState::Finished => {
                    debug!("Task {} finished", task_id);
                    false
                }
                TaskState::Running => {
                    running.insert(task_id.clone());
                    true
                }
                TaskState::Preempted => {
                    preempted.insert(task_id.clone());
                    true
                }
                TaskState::PreRun => true,
            }
        });
    }

    /// Replace the table with the stored snapshot.
    ///
    /// A missing snapshot leaves the table empty. An unreadable or corrupt
    /// one is logged and also leaves the table empty. A snapshot in which two
    /// tasks claim the same device window counts as corrupt, except for a
    /// preempted task's grace window overlapping the task that displaced it.
    pub fn load_state(&mut self, now: Timestamp) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let location = store.describe();

        let loaded = store
            .load()
            .and_then(|content| content.map(|c| snapshot::decode(&c)).transpose());
        let restored = match loaded {
            Ok(Some(tasks)) => self.restore(tasks, now, &location).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        match restored {
            Ok(Some(count)) => info!("Loaded {} task(s) from {}", count, location),
            Ok(None) => {
                debug!("No scheduler state at {}, starting empty", location);
                self.tasks.clear();
            }
            Err(e) => {
                error!("Scheduler state at {} is unusable, starting empty: {}", location, e);
                self.tasks.clear();
            }
        }
        self.cleanup(now);
    }

    fn restore(
        &mut self,
        tasks: BTreeMap<String, Task>,
        now: Timestamp,
        location: &str,
    ) -> PersistenceResult<usize> {
        self.tasks = tasks;
        self.cleanup(now);
        match self.find_double_booking() {
            Some(clash) => Err(PersistenceError::corrupt(
                clash.to_string(),
                ErrorContext::new("load_state").with_details(location.to_string()),
            )),
            None => Ok(self.tasks.len()),
        }
    }

    /// First pair of tasks whose windows collide on a device.
    ///
    /// A preempted task may overlap a task that is not preempted; every other
    /// pairing must be disjoint.
    fn find_double_booking(&self) -> Option<DoubleBooking> {
        let tasks: Vec<_> = self.tasks.iter().collect();
        for (i, (first_id, first)) in tasks.iter().enumerate() {
            for (second_id, second) in &tasks[i + 1..] {
                let first_preempted = first.state() == TaskState::Preempted;
                if first_preempted != (second.state() == TaskState::Preempted) {
                    continue;
                }
                if let Some(conflict) = first.get_conflicts(second).into_iter().next() {
                    return Some(DoubleBooking {
                        device: conflict.device,
                        first: (*first_id).clone(),
                        second: (*second_id).clone(),
                    });
                }
            }
        }
        None
    }

    /// Write the current table to the store. Failures are logged and ignored.
    pub fn save_state(&mut self, now: Timestamp) {
        self.cleanup(now);
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let result = snapshot::encode(&self.tasks).and_then(|content| store.save(&content));
        if let Err(e) = result {
            error!("Failed to save scheduler state to {}: {}", store.describe(), e);
        }
    }
}

fn require_nonempty<'a>(
    value: Option<&'a str>,
    missing: ScheduleError,
    field: &str,
) -> Result<&'a str, ScheduleError> {
    match value {
        None => Err(missing),
        Some("") => Err(ScheduleError::malformed(
            "TypeError",
            format!("{} must be a nonempty string", field),
        )),
        Some(value) => Ok(value),
    }
}
