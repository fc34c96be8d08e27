//! Period-of-day buckets.
//!
//! The seven buckets partition the 24-hour clock. Every consumer (the
//! in-memory clause evaluator, the SQL renderer, the CLI labels) derives its
//! boundaries from [`TimeBucket::hour_range`] so they cannot drift apart.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeBucket {
    EarlyMorning,
    Morning,
    MidMorning,
    Afternoon,
    LateAfternoon,
    Evening,
    LateNight,
}

/// `(bucket, low_hour_inclusive, high_hour_exclusive, label)` in clock order.
static BOUNDARIES: &[(TimeBucket, u32, u32, &str)] = &[
    (TimeBucket::EarlyMorning, 0, 6, "12am-6am"),
    (TimeBucket::Morning, 6, 9, "6am-9am"),
    (TimeBucket::MidMorning, 9, 12, "9am-12pm"),
    (TimeBucket::Afternoon, 12, 15, "12pm-3pm"),
    (TimeBucket::LateAfternoon, 15, 18, "3pm-6pm"),
    (TimeBucket::Evening, 18, 21, "6pm-9pm"),
    (TimeBucket::LateNight, 21, 24, "9pm-12am"),
];

impl TimeBucket {
    pub const ALL: [TimeBucket; 7] = [
        TimeBucket::EarlyMorning,
        TimeBucket::Morning,
        TimeBucket::MidMorning,
        TimeBucket::Afternoon,
        TimeBucket::LateAfternoon,
        TimeBucket::Evening,
        TimeBucket::LateNight,
    ];

    fn entry(self) -> &'static (TimeBucket, u32, u32, &'static str) {
        // BOUNDARIES is indexed in declaration order
        &BOUNDARIES[self as usize]
    }

    /// Maps a clock hour to its bucket.
    ///
    /// # Panics
    ///
    /// Panics if `hour >= 24`.
    pub fn of_hour(hour: u32) -> TimeBucket {
        assert!(hour < 24, "hour must be within 0..24, got {hour}");
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.contains_hour(hour))
            .unwrap_or_else(|| unreachable!("bucket table covers 0..24"))
    }

    /// Buckets a `NaiveTime`.
    pub fn of_time(time: NaiveTime) -> TimeBucket {
        Self::of_hour(time.hour())
    }

    /// Buckets a `HH:MM` or `HH:MM:SS` string, `None` if it does not parse.
    pub fn of_time_str(raw: &str) -> Option<TimeBucket> {
        parse_clock_time(raw).map(Self::of_time)
    }

    /// Returns `(low_hour_inclusive, high_hour_exclusive)`.
    pub fn hour_range(self) -> (u32, u32) {
        let (_, low, high, _) = *self.entry();
        (low, high)
    }

    pub fn contains_hour(self, hour: u32) -> bool {
        let (low, high) = self.hour_range();
        (low..high).contains(&hour)
    }

    pub fn label(self) -> &'static str {
        self.entry().3
    }

    /// Buckets during which congestion surcharges typically apply.
    pub fn is_rush_hour(self) -> bool {
        matches!(self, TimeBucket::Morning | TimeBucket::LateAfternoon)
    }
}

/// Free-function form of [`TimeBucket::of_hour`].
pub fn bucket_of(hour: u32) -> TimeBucket {
    TimeBucket::of_hour(hour)
}

/// Free-function form of [`TimeBucket::hour_range`].
pub fn hour_range_of(bucket: TimeBucket) -> (u32, u32) {
    bucket.hour_range()
}

pub(crate) fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeBucket {
    type Err = Error;

    /// Accepts the display label (`6am-9am`) or the variant name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        BOUNDARIES
            .iter()
            .find(|(bucket, .., label)| {
                *label == wanted || format!("{bucket:?}").to_ascii_lowercase() == wanted
            })
            .map(|(bucket, ..)| *bucket)
            .ok_or_else(|| Error::UnknownTimeBucket(s.to_string()))
    }
}
