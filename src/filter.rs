//! User trip selections and the structured clauses they render to.
//!
//! A [`FilterSpec`] never produces query text. It renders to a list of typed
//! [`Clause`] values which a query layer either evaluates directly
//! ([`Clause::matches`]) or binds as parameters ([`crate::sql::render_where`]).

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, Weekday};
use serde::Serialize;

use crate::buckets::TimeBucket;
use crate::error::{Error, Result};
use crate::trip::TripRecord;

/// A validated borough name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Borough(String);

impl Borough {
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() || name.chars().any(char::is_control) {
            return Err(Error::InvalidBorough(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Borough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which end of the trip a borough constraint applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripEnd {
    Pickup,
    Dropoff,
}

impl TripEnd {
    /// Column holding the borough for this end of the trip.
    pub fn borough_column(self) -> &'static str {
        match self {
            TripEnd::Pickup => "pickup_borough",
            TripEnd::Dropoff => "dropoff_borough",
        }
    }

    fn borough_of(self, trip: &TripRecord) -> Option<&str> {
        match self {
            TripEnd::Pickup => trip.pickup_borough.as_deref(),
            TripEnd::Dropoff => trip.dropoff_borough.as_deref(),
        }
    }
}

/// A single typed filter condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum Clause {
    /// Inclusive on both ends.
    DateBetween { start: NaiveDate, end: NaiveDate },
    /// Inclusive on both ends.
    DistanceBetween { min_miles: f64, max_miles: f64 },
    BoroughIn { end: TripEnd, boroughs: Vec<Borough> },
    WeekdayEquals { day: Weekday },
    /// `low` inclusive, `high` exclusive, as produced by [`TimeBucket::hour_range`].
    HourBetween { low: u32, high: u32 },
}

impl Clause {
    /// Evaluates the clause against a trip. A trip missing the constrained
    /// column never matches.
    pub fn matches(&self, trip: &TripRecord) -> bool {
        match self {
            Clause::DateBetween { start, end } => trip
                .pickup_date
                .is_some_and(|d| *start <= d && d <= *end),
            Clause::DistanceBetween {
                min_miles,
                max_miles,
            } => trip
                .trip_distance
                .is_some_and(|d| *min_miles <= d && d <= *max_miles),
            Clause::BoroughIn { end, boroughs } => end
                .borough_of(trip)
                .is_some_and(|v| boroughs.iter().any(|b| b.as_str() == v.trim())),
            Clause::WeekdayEquals { day } => trip.pickup_weekday() == Some(*day),
            Clause::HourBetween { low, high } => {
                trip.pickup_hour().is_some_and(|h| (*low..*high).contains(&h))
            }
        }
    }
}

/// Returns true if `trip` satisfies every clause.
pub fn matches_all(clauses: &[Clause], trip: &TripRecord) -> bool {
    clauses.iter().all(|c| c.matches(trip))
}

/// An immutable, validated trip selection.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FilterSpec {
    date_range: Option<(NaiveDate, NaiveDate)>,
    distance_range: Option<(f64, f64)>,
    pickup_boroughs: BTreeSet<Borough>,
    dropoff_boroughs: BTreeSet<Borough>,
    day_of_week: Option<Weekday>,
    time_bucket: Option<TimeBucket>,
}

impl FilterSpec {
    pub fn builder() -> FilterSpecBuilder {
        FilterSpecBuilder::default()
    }

    /// Renders the selection as clauses in a fixed order: dates, distance,
    /// pickup boroughs, dropoff boroughs, weekday, hour range.
    pub fn render(&self) -> Vec<Clause> {
        let mut clauses = Vec::new();

        if let Some((start, end)) = self.date_range {
            clauses.push(Clause::DateBetween { start, end });
        }
        if let Some((min_miles, max_miles)) = self.distance_range {
            clauses.push(Clause::DistanceBetween {
                min_miles,
                max_miles,
            });
        }
        if !self.pickup_boroughs.is_empty() {
            clauses.push(Clause::BoroughIn {
                end: TripEnd::Pickup,
                boroughs: self.pickup_boroughs.iter().cloned().collect(),
            });
        }
        if !self.dropoff_boroughs.is_empty() {
            clauses.push(Clause::BoroughIn {
                end: TripEnd::Dropoff,
                boroughs: self.dropoff_boroughs.iter().cloned().collect(),
            });
        }
        if let Some(day) = self.day_of_week {
            clauses.push(Clause::WeekdayEquals { day });
        }
        if let Some(bucket) = self.time_bucket {
            let (low, high) = bucket.hour_range();
            clauses.push(Clause::HourBetween { low, high });
        }

        clauses
    }

    pub fn matches(&self, trip: &TripRecord) -> bool {
        matches_all(&self.render(), trip)
    }
}

/// Accumulates constraints for a [`FilterSpec`]. Validation happens in
/// [`FilterSpecBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct FilterSpecBuilder {
    date_start: Option<NaiveDate>,
    date_end: Option<NaiveDate>,
    distance_range: Option<(f64, f64)>,
    pickup_boroughs: Vec<String>,
    dropoff_boroughs: Vec<String>,
    day_of_week: Option<Weekday>,
    time_bucket: Option<TimeBucket>,
}

impl FilterSpecBuilder {
    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_start = Some(start);
        self.date_end = Some(end);
        self
    }

    /// Trips on or after `start`. Without an end date the range runs to
    /// 9999-12-31.
    pub fn since(mut self, start: NaiveDate) -> Self {
        self.date_start = Some(start);
        self
    }

    /// Trips on or before `end`. Without a start date the range begins at
    /// 0001-01-01.
    pub fn until(mut self, end: NaiveDate) -> Self {
        self.date_end = Some(end);
        self
    }

    pub fn distance_range(mut self, min_miles: f64, max_miles: f64) -> Self {
        self.distance_range = Some((min_miles, max_miles));
        self
    }

    pub fn pickup_borough(mut self, name: impl Into<String>) -> Self {
        self.pickup_boroughs.push(name.into());
        self
    }

    pub fn pickup_boroughs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pickup_boroughs.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn dropoff_borough(mut self, name: impl Into<String>) -> Self {
        self.dropoff_boroughs.push(name.into());
        self
    }

    pub fn dropoff_boroughs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dropoff_boroughs.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn day_of_week(mut self, day: Weekday) -> Self {
        self.day_of_week = Some(day);
        self
    }

    pub fn time_bucket(mut self, bucket: TimeBucket) -> Self {
        self.time_bucket = Some(bucket);
        self
    }

    /// Validates the accumulated constraints.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] when the start date is after the end date or
    /// the distance range is reversed, negative or non-finite, and
    /// [`Error::InvalidBorough`] for a blank borough name.
    pub fn build(self) -> Result<FilterSpec> {
        let date_range = match (self.date_start, self.date_end) {
            (None, None) => None,
            (start, end) => Some((
                start.unwrap_or_else(earliest_date),
                end.unwrap_or_else(latest_date),
            )),
        };
        if let Some((start, end)) = date_range {
            if start > end {
                return Err(Error::InvalidRange {
                    field: "date",
                    low: start.to_string(),
                    high: end.to_string(),
                    reason: "start is after end",
                });
            }
        }

        if let Some((min, max)) = self.distance_range {
            let reason = if !min.is_finite() || !max.is_finite() {
                Some("bounds must be finite")
            } else if min < 0.0 {
                Some("bounds must not be negative")
            } else if min > max {
                Some("minimum is above maximum")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(Error::InvalidRange {
                    field: "distance",
                    low: min.to_string(),
                    high: max.to_string(),
                    reason,
                });
            }
        }

        let pickup_boroughs = collect_boroughs(&self.pickup_boroughs)?;
        let dropoff_boroughs = collect_boroughs(&self.dropoff_boroughs)?;

        Ok(FilterSpec {
            date_range,
            distance_range: self.distance_range,
            pickup_boroughs,
            dropoff_boroughs,
            day_of_week: self.day_of_week,
            time_bucket: self.time_bucket,
        })
    }
}

/// Lower bound for a filter with only an end date. Kept within the range
/// PostgreSQL `date` accepts.
fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn latest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn collect_boroughs(names: &[String]) -> Result<BTreeSet<Borough>> {
    names.iter().map(|n| Borough::new(n)).collect()
}
