//! # Actuator Scheduler
//!
//! Time-windowed, exclusive device reservation engine.
//!
//! Agents submit tasks: named, prioritized bundles of `[start, end)` windows
//! on one or more devices. The engine accepts a task only when none of its
//! windows collide with windows already held by other tasks, unless the new
//! task has enough priority to preempt the holder. Preempted tasks keep a
//! short grace window starting now and then finish.
//!
//! ## Architecture
//!
//! - [`models`]: time intervals, per-device schedules and tasks
//! - [`scheduler`]: the [`ScheduleManager`] that validates, detects
//!   conflicts, preempts and answers "who owns which device right now"
//! - [`db`]: snapshot stores, snapshot encoding and configuration
//!
//! The engine runs no timers. Every call takes the current time from the
//! caller, who is expected to poll [`ScheduleManager::get_next_event_time`]
//! and come back around that moment.
//!
//! ```
//! use actuator_scheduler::{ScheduleManager, SlotRequest};
//! use chrono::{TimeDelta, TimeZone, Utc};
//!
//! let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
//! let mut manager = ScheduleManager::new(TimeDelta::seconds(60), now, None);
//!
//! let requests = [SlotRequest::new("campus/building/rtu1", now, now + TimeDelta::minutes(30))];
//! let result = manager.request_slots(Some("agent-1"), Some("task-1"), &requests, Some("LOW"), now);
//! assert!(result.success);
//!
//! let state = manager.get_schedule_state(now);
//! assert_eq!(state["campus/building/rtu1"].task_id, "task-1");
//! ```

pub mod db;
pub mod models;
pub mod scheduler;

pub use models::{Priority, SlotRequest, Task, TaskState, TimeInterval, Timestamp};
pub use scheduler::{DeviceState, RequestResult, ScheduleError, ScheduleManager};
