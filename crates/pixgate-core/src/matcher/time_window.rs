//! Time-of-day window matcher
//!
//! Converts the evaluation instant into the rule's timezone and compares
//! only the time-of-day component against `[start, end]`, both endpoints
//! inclusive. A window whose start is after its end crosses midnight:
//! `22:00–06:00` matches 23:00 and 05:00 but not 12:00. An optional
//! day-of-week filter applies in the rule's timezone as well.

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use chrono_tz::Tz;

/// Set of allowed weekdays, indexed Monday = 0 .. Sunday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySet(u8);

impl DaySet {
    /// Build from Monday-based day indices; out-of-range indices are the
    /// compiler's responsibility to reject.
    pub fn from_indices(indices: impl IntoIterator<Item = u8>) -> Self {
        let mut mask = 0u8;
        for idx in indices {
            debug_assert!(idx < 7);
            mask |= 1 << idx;
        }
        DaySet(mask)
    }

    /// Whether the Monday-based day index is in the set.
    pub fn contains(&self, idx: u8) -> bool {
        idx < 7 && self.0 & (1 << idx) != 0
    }

    /// Monday-based indices in ascending order.
    pub fn indices(&self) -> Vec<u8> {
        (0..7).filter(|i| self.contains(*i)).collect()
    }
}

/// Matches when the evaluation instant falls inside the window.
#[derive(Debug, Clone)]
pub struct TimeWindowMatcher {
    tz: Tz,
    start: NaiveTime,
    end: NaiveTime,
    days_of_week: Option<DaySet>,
}

impl TimeWindowMatcher {
    /// Build from compile-time-parsed endpoints.
    pub fn new(tz: Tz, start: NaiveTime, end: NaiveTime, days_of_week: Option<DaySet>) -> Self {
        Self {
            tz,
            start,
            end,
            days_of_week,
        }
    }

    /// The window's timezone.
    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn matches(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);

        if let Some(days) = &self.days_of_week {
            let idx = local.weekday().num_days_from_monday() as u8;
            if !days.contains(idx) {
                return false;
            }
        }

        let t = local.time();
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            // Crosses midnight
            t >= self.start || t <= self.end
        }
    }
}
