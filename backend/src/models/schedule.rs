//! Per-device reservation list.
//!
//! A [`DeviceSchedule`] holds the windows one task has reserved on one device.
//! Windows are kept sorted by `(start, end)` and never overlap, which makes
//! both `start` and `end` non-decreasing along the list. Range queries rely on
//! that: all windows overlapping a probe form one contiguous run, found with
//! two binary searches.

use serde::{Deserialize, Serialize};

use super::time::{round_up_to_second, TimeInterval, Timestamp};
use chrono::TimeDelta;

/// A requested window overlaps one already held by the same schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("slot {requested} conflicts with existing slot {existing}")]
pub struct SlotConflictError {
    pub requested: TimeInterval,
    pub existing: TimeInterval,
}

/// Sorted, non-overlapping windows reserved on a single device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimeInterval>", into = "Vec<TimeInterval>")]
pub struct DeviceSchedule {
    slots: Vec<TimeInterval>,
}

impl TryFrom<Vec<TimeInterval>> for DeviceSchedule {
    type Error = SlotConflictError;

    fn try_from(slots: Vec<TimeInterval>) -> Result<Self, Self::Error> {
        let mut schedule = DeviceSchedule::new();
        for slot in slots {
            schedule.schedule_slot(slot)?;
        }
        Ok(schedule)
    }
}

impl From<DeviceSchedule> for Vec<TimeInterval> {
    fn from(schedule: DeviceSchedule) -> Self {
        schedule.slots
    }
}

impl DeviceSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stored windows in order.
    pub fn slots(&self) -> &[TimeInterval] {
        &self.slots
    }

    /// Index range of the stored windows overlapping `probe`.
    fn overlapping_range(&self, probe: &TimeInterval) -> std::ops::Range<usize> {
        let left = self.slots.partition_point(|slot| slot.end() <= probe.start());
        let right = self.slots.partition_point(|slot| slot.start() < probe.end());
        // A zero-length probe can leave `right < left`.
        left..right.max(left)
    }

    /// Every stored window overlapping `probe`. Empty means the probe is free.
    pub fn check_availability(&self, probe: &TimeInterval) -> Vec<TimeInterval> {
        self.slots[self.overlapping_range(probe)]
            .iter()
            .filter(|slot| slot.overlaps(probe))
            .copied()
            .collect()
    }

    /// Insert `slot`, keeping the list sorted. Fails if it overlaps a stored window.
    pub fn schedule_slot(&mut self, slot: TimeInterval) -> Result<(), SlotConflictError> {
        if let Some(existing) = self.check_availability(&slot).first() {
            return Err(SlotConflictError {
                requested: slot,
                existing: *existing,
            });
        }
        let key = (slot.start(), slot.end());
        let at = self
            .slots
            .partition_point(|stored| (stored.start(), stored.end()) <= key);
        self.slots.insert(at, slot);
        Ok(())
    }

    /// Drop every window that ends at or before `now`.
    pub fn make_current(&mut self, now: Timestamp) {
        let elapsed = self.slots.partition_point(|slot| slot.end() <= now);
        if elapsed > 0 {
            self.slots.drain(..elapsed);
        }
    }

    /// The window containing `now` (start inclusive), if any.
    pub fn get_current_slot(&mut self, now: Timestamp) -> Option<TimeInterval> {
        self.make_current(now);
        self.slots
            .first()
            .filter(|slot| slot.contains_inclusive_start(now))
            .copied()
    }

    /// Next boundary at which this schedule changes, rounded up to the second.
    ///
    /// That is the end of the current window when one is active, otherwise the
    /// start of the next one.
    pub fn get_next_event_time(&mut self, now: Timestamp) -> Option<Timestamp> {
        self.make_current(now);
        let first = self.slots.first()?;
        let next = if first.contains_inclusive_start(now) {
            first.end()
        } else {
            first.start()
        };
        Some(round_up_to_second(next))
    }

    /// Truncate for preemption.
    ///
    /// Keeps only the active window, cut to end no later than `now + grace`,
    /// and discards everything else. Returns what remains.
    pub fn prune_to_current(&mut self, grace: TimeDelta, now: Timestamp) -> &[TimeInterval] {
        match self.get_current_slot(now) {
            Some(current) => {
                let remaining = (current.end() - now).min(grace);
                self.slots = vec![TimeInterval::starting_at(now, remaining)];
            }
            None => self.slots.clear(),
        }
        &self.slots
    }

    /// Our windows that overlap something in `other`.
    pub fn get_conflicts(&self, other: &DeviceSchedule) -> Vec<TimeInterval> {
        self.slots
            .iter()
            .filter(|slot| !other.check_availability(slot).is_empty())
            .copied()
            .collect()
    }

    /// True when nothing remains after dropping elapsed windows.
    pub fn finished(&mut self, now: Timestamp) -> bool {
        self.make_current(now);
        self.slots.is_empty()
    }
}
