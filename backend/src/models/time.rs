//! Half-open time windows and the second-granularity rounding used for event times.

use std::cmp::Ordering;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type used throughout the scheduler.
pub type Timestamp = DateTime<Utc>;

/// Errors raised when building a [`TimeInterval`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("Invalid start and end values: end {end} is before start {start}")]
    Inverted { start: Timestamp, end: Timestamp },
}

/// A half-open window `[start, end)`.
///
/// # Invariants
/// `start <= end`. Zero-length windows are allowed.
///
/// Two windows that merely touch (`a.end == b.start`) do not overlap, so
/// back-to-back reservations on one device are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
    start: Timestamp,
    end: Timestamp,
}

#[derive(Deserialize)]
struct RawInterval {
    start: Timestamp,
    end: Timestamp,
}

impl TryFrom<RawInterval> for TimeInterval {
    type Error = IntervalError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        TimeInterval::new(raw.start, raw.end)
    }
}

impl TimeInterval {
    /// Create a new window, rejecting `end < start`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, IntervalError> {
        if end < start {
            return Err(IntervalError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window starting at `start` and lasting `length`.
    ///
    /// Negative lengths collapse to zero; an end past the representable
    /// range saturates at [`DateTime::<Utc>::MAX_UTC`].
    pub fn starting_at(start: Timestamp, length: TimeDelta) -> Self {
        Self {
            start,
            end: start
                .checked_add_signed(length.max(TimeDelta::zero()))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// True unless one window ends at or before the other starts.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        !(self.start >= other.end || self.end <= other.start)
    }

    /// Overlap-aware three-way comparison.
    ///
    /// `Less` when `self` ends at or before `other` starts, `Greater` when it
    /// starts at or after `other` ends, and `Equal` when the two overlap. This
    /// is not a total order and must not be used to sort.
    pub fn compare(&self, other: &TimeInterval) -> Ordering {
        if self.start >= other.end {
            Ordering::Greater
        } else if self.end <= other.start {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }

    /// `start < t < end`, both endpoints excluded.
    pub fn contains(&self, t: Timestamp) -> bool {
        self.start < t && t < self.end
    }

    /// `start <= t < end`: is `t` currently inside this window.
    pub fn contains_inclusive_start(&self, t: Timestamp) -> bool {
        self.start <= t && t < self.end
    }

    /// Grow this window to the bounding range of itself and `other`.
    pub fn stretch_to_include(&mut self, other: &TimeInterval) {
        if other.start < self.start {
            self.start = other.start;
        }
        if other.end > self.end {
            self.end = other.end;
        }
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} <-> {})", self.start, self.end)
    }
}

/// Round `t` up to the next whole second when it carries a sub-second part.
///
/// Downstream timers tend to fire a little early; rounding up keeps a wake-up
/// from landing just before the boundary it was meant for.
pub fn round_up_to_second(t: Timestamp) -> Timestamp {
    let nanos = t.nanosecond();
    if nanos == 0 {
        return t;
    }
    let truncated = t - TimeDelta::nanoseconds(i64::from(nanos));
    truncated
        .checked_add_signed(TimeDelta::seconds(1))
        .unwrap_or(t)
}
