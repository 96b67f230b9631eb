//! Core scheduling data types.
//!
//! - [`TimeInterval`]: half-open window with overlap-aware comparison
//! - [`DeviceSchedule`]: sorted, non-overlapping windows on one device
//! - [`Task`]: one agent's prioritized reservations across devices

pub mod schedule;
pub mod task;
pub mod time;

pub use schedule::{DeviceSchedule, SlotConflictError};
pub use task::{Priority, SlotConflict, SlotRequest, Task, TaskError, TaskState};
pub use time::{round_up_to_second, IntervalError, TimeInterval, Timestamp};
