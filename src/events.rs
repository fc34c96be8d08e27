//! Permitted city events.
//!
//! Events are read from a CSV export of the events table. When none is
//! configured, or it cannot be read, [`EventCalendar::sample`] supplies
//! seeded synthetic events whose peak days line up with the peaks of
//! [`MemoryTripSource::sample`](crate::source::MemoryTripSource::sample).

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A single event row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_date: Option<NaiveDate>,
    pub title: Option<String>,
    pub location: Option<String>,
    /// Free-form time span, e.g. `10:00 AM - 6:00 PM`.
    pub time: Option<String>,
}

/// A day the sample data treats as an event peak.
pub(crate) struct SampleEventDay {
    pub month: u32,
    pub day: u32,
    /// Trips added on top of the usual daily volume.
    pub extra_trips: usize,
    /// `(title, location, time)`.
    pub headline: &'static [(&'static str, &'static str, &'static str)],
}

pub(crate) static SAMPLE_EVENT_DAYS: &[SampleEventDay] = &[
    SampleEventDay {
        month: 7,
        day: 4,
        extra_trips: 12,
        headline: &[
            ("Independence Day Parade", "Manhattan", "10:00 AM - 12:00 PM"),
            ("Fireworks Show", "Brooklyn Bridge Park", "8:00 PM - 10:00 PM"),
        ],
    },
    SampleEventDay {
        month: 7,
        day: 14,
        extra_trips: 8,
        headline: &[
            ("Street Fair", "Manhattan", "10:00 AM - 6:00 PM"),
            ("Music Festival", "Brooklyn", "4:00 PM - 10:00 PM"),
        ],
    },
    SampleEventDay {
        month: 11,
        day: 23,
        extra_trips: 9,
        headline: &[("Thanksgiving Day Parade", "Manhattan", "9:00 AM - 12:00 PM")],
    },
    SampleEventDay {
        month: 12,
        day: 15,
        extra_trips: 16,
        headline: &[
            ("Holiday Market", "Manhattan", "11:00 AM - 8:00 PM"),
            ("Tree Lighting", "Manhattan", "7:00 PM - 9:00 PM"),
        ],
    },
];

const SAMPLE_SEED: u64 = 1114;

static SAMPLE_TITLES: &[&str] = &[
    "Farmers Market",
    "Block Party",
    "Gallery Opening",
    "Outdoor Concert",
    "Food Truck Rally",
    "Film Screening",
];

static SAMPLE_LOCATIONS: &[&str] = &["Manhattan", "Brooklyn", "Queens", "Bronx", "Staten Island"];

static SAMPLE_TIMES: &[&str] = &["10:00 AM - 2:00 PM", "12:00 PM - 5:00 PM", "6:00 PM - 10:00 PM"];

/// Events indexed by day.
#[derive(Debug, Clone)]
pub struct EventCalendar {
    label: String,
    by_day: BTreeMap<NaiveDate, Vec<EventRecord>>,
}

impl EventCalendar {
    /// Rows without a date are dropped; they cannot be placed on any day.
    pub fn new(events: Vec<EventRecord>) -> Self {
        Self::with_label("memory", events)
    }

    fn with_label(label: &str, events: Vec<EventRecord>) -> Self {
        let mut by_day: BTreeMap<NaiveDate, Vec<EventRecord>> = BTreeMap::new();
        for event in events {
            if let Some(date) = event.event_date {
                by_day.entry(date).or_default().push(event);
            }
        }
        Self {
            label: label.to_string(),
            by_day,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening event data {}", path.display()))?;
        let events = read_events(file).with_context(|| format!("reading {}", path.display()))?;
        debug!(path = %path.display(), rows = events.len(), "Loaded event CSV");
        Ok(Self::with_label(&format!("csv:{}", path.display()), events))
    }

    /// Synthetic June-December 2023 events: up to two background events a
    /// day plus the headline events of each peak day. Seeded, so repeated
    /// calls agree.
    pub fn sample() -> Self {
        let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
        let mut events = Vec::new();

        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap_or_default();
        let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default();
        let mut date = start;
        while date <= end {
            for _ in 0..rng.gen_range(0..=2) {
                events.push(EventRecord {
                    event_date: Some(date),
                    title: Some(pick(&mut rng, SAMPLE_TITLES).to_string()),
                    location: Some(pick(&mut rng, SAMPLE_LOCATIONS).to_string()),
                    time: Some(pick(&mut rng, SAMPLE_TIMES).to_string()),
                });
            }
            if let Some(peak) = sample_event_day(date) {
                events.extend(peak.headline.iter().map(|(title, location, time)| EventRecord {
                    event_date: Some(date),
                    title: Some(title.to_string()),
                    location: Some(location.to_string()),
                    time: Some(time.to_string()),
                }));
            }
            date += Duration::days(1);
        }

        Self::with_label("sample events", events)
    }

    pub fn describe(&self) -> &str {
        &self.label
    }

    pub fn on(&self, date: NaiveDate) -> &[EventRecord] {
        self.by_day.get(&date).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_event_day(&self, date: NaiveDate) -> bool {
        !self.on(date).is_empty()
    }

    pub fn count_on(&self, date: NaiveDate) -> usize {
        self.on(date).len()
    }
}

/// Peak-day entry for `date`, if the sample data marks it as one.
pub(crate) fn sample_event_day(date: NaiveDate) -> Option<&'static SampleEventDay> {
    SAMPLE_EVENT_DAYS
        .iter()
        .find(|peak| peak.month == date.month() && peak.day == date.day())
}

fn pick<'a>(rng: &mut StdRng, items: &'a [&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

/// Deserializes every row of an event CSV.
pub fn read_events<R: std::io::Read>(reader: R) -> Result<Vec<EventRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: EventRecord = result?;
        rows.push(record);
    }
    Ok(rows)
}

/// Opens the configured event CSV, falling back to [`EventCalendar::sample`]
/// when no path is configured or the file cannot be loaded.
pub fn open_events(path: Option<&Path>) -> EventCalendar {
    match path {
        Some(path) => match EventCalendar::open(path) {
            Ok(calendar) => {
                info!(path = %path.display(), days = calendar.by_day.len(), "Using event CSV");
                calendar
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Event data unavailable, falling back to sample events");
                EventCalendar::sample()
            }
        },
        None => {
            info!("No event data configured, using sample events");
            EventCalendar::sample()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn titles(calendar: &EventCalendar, d: NaiveDate) -> Vec<String> {
        calendar
            .on(d)
            .iter()
            .filter_map(|e| e.title.clone())
            .collect()
    }

    #[test]
    fn test_new_groups_by_day_and_drops_undated() {
        let calendar = EventCalendar::new(vec![
            EventRecord {
                event_date: Some(date(2023, 7, 14)),
                title: Some("Street Fair".into()),
                ..Default::default()
            },
            EventRecord {
                event_date: Some(date(2023, 7, 14)),
                title: Some("Music Festival".into()),
                ..Default::default()
            },
            EventRecord {
                title: Some("Undated".into()),
                ..Default::default()
            },
        ]);

        assert_eq!(calendar.count_on(date(2023, 7, 14)), 2);
        assert!(calendar.is_event_day(date(2023, 7, 14)));
        assert!(!calendar.is_event_day(date(2023, 7, 15)));
        assert!(calendar.on(date(2023, 7, 15)).is_empty());
    }

    #[test]
    fn test_read_events_csv() {
        let data = "\
event_date,title,location,time
2023-07-04,Fireworks Show,Brooklyn Bridge Park,8:00 PM - 10:00 PM
2023-07-05,Block Party,,
";
        let events = read_events(data.as_bytes()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].location, None);
        assert_eq!(events[0].time.as_deref(), Some("8:00 PM - 10:00 PM"));
    }

    #[test]
    fn test_open_events_falls_back_to_sample() {
        let missing = env::temp_dir().join("taxi_insights_missing_events.csv");
        let _ = fs::remove_file(&missing);
        let calendar = open_events(Some(missing.as_path()));
        assert_eq!(calendar.describe(), "sample events");
    }

    #[test]
    fn test_sample_is_deterministic() {
        let a = EventCalendar::sample();
        let b = EventCalendar::sample();
        assert_eq!(a.by_day, b.by_day);
    }

    #[test]
    fn test_sample_headline_days() {
        let calendar = EventCalendar::sample();
        let july_4 = titles(&calendar, date(2023, 7, 4));
        assert!(july_4.contains(&"Independence Day Parade".to_string()));
        assert!(july_4.contains(&"Fireworks Show".to_string()));

        for peak in SAMPLE_EVENT_DAYS {
            let d = date(2023, peak.month, peak.day);
            assert!(calendar.count_on(d) >= peak.headline.len());
        }
        assert!(calendar.on(date(2024, 1, 1)).is_empty());
    }
}
