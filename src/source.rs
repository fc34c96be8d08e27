//! Trip data sources.
//!
//! [`TripSource`] is the seam between the statistics layer and whatever
//! actually holds trips. [`CsvTripSource`] reads an exported trip table;
//! [`MemoryTripSource::sample`] produces deterministic synthetic trips and is
//! what the CLI falls back to when the configured store cannot be opened.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::events::sample_event_day;
use crate::filter::{Clause, matches_all};
use crate::trip::TripRecord;

/// Executes structured filters against a trip store.
pub trait TripSource: Send + Sync {
    /// Returns every trip satisfying all `clauses`.
    fn fetch(&self, clauses: &[Clause]) -> Result<Vec<TripRecord>>;

    /// Short human-readable description for logs and reports.
    fn describe(&self) -> String;
}

/// Trips loaded once from a CSV file and filtered in memory.
#[derive(Debug)]
pub struct CsvTripSource {
    path: PathBuf,
    trips: Vec<TripRecord>,
}

impl CsvTripSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).with_context(|| format!("opening trip data {}", path.display()))?;
        let trips = read_trips(file).with_context(|| format!("reading {}", path.display()))?;
        debug!(path = %path.display(), rows = trips.len(), "Loaded trip CSV");
        Ok(Self { path, trips })
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

/// Deserializes every row of a trip CSV.
pub fn read_trips<R: std::io::Read>(reader: R) -> Result<Vec<TripRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: TripRecord = result?;
        rows.push(record);
    }
    Ok(rows)
}

impl TripSource for CsvTripSource {
    fn fetch(&self, clauses: &[Clause]) -> Result<Vec<TripRecord>> {
        Ok(filter_trips(&self.trips, clauses))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

fn filter_trips(trips: &[TripRecord], clauses: &[Clause]) -> Vec<TripRecord> {
    let rows: Vec<TripRecord> = trips
        .iter()
        .filter(|t| matches_all(clauses, t))
        .cloned()
        .collect();
    debug!(
        clauses = clauses.len(),
        scanned = trips.len(),
        matched = rows.len(),
        "Filtered trips"
    );
    rows
}

const SAMPLE_SEED: u64 = 2023;
const SAMPLE_TRIPS_PER_DAY: usize = 40;

/// `(borough, share of pickups in percent, zones)`.
static SAMPLE_BOROUGHS: &[(&str, u32, &[&str])] = &[
    (
        "Manhattan",
        65,
        &["Midtown Center", "Upper East Side South", "Times Sq/Theatre District", "East Village"],
    ),
    ("Brooklyn", 15, &["Williamsburg (North Side)", "Park Slope", "Downtown Brooklyn/MetroTech"]),
    ("Queens", 12, &["JFK Airport", "LaGuardia Airport", "Astoria"]),
    ("Bronx", 5, &["Mott Haven/Port Morris", "Fordham South"]),
    ("Staten Island", 3, &["St. George/New Brighton"]),
];

/// Trips held in memory, either supplied by the caller or generated by
/// [`MemoryTripSource::sample`].
#[derive(Debug, Clone)]
pub struct MemoryTripSource {
    label: String,
    trips: Vec<TripRecord>,
}

impl MemoryTripSource {
    pub fn new(trips: Vec<TripRecord>) -> Self {
        Self {
            label: "memory".to_string(),
            trips,
        }
    }

    /// Synthetic June-December 2023 trips, busier on the days
    /// [`EventCalendar::sample`](crate::events::EventCalendar::sample) holds
    /// its headline events.
    ///
    /// The generator is seeded, so two calls always produce the same trips.
    /// Values are plausible fixtures, not statistics derived from real data.
    pub fn sample() -> Self {
        Self::sample_with_seed(SAMPLE_SEED)
    }

    pub fn sample_with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trips = Vec::new();

        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap_or_default();
        let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default();
        let mut date = start;
        while date <= end {
            for _ in 0..trips_on(date) {
                trips.push(sample_trip(&mut rng, date));
            }
            date += Duration::days(1);
        }

        Self {
            label: "sample data".to_string(),
            trips,
        }
    }
}

fn trips_on(date: NaiveDate) -> usize {
    SAMPLE_TRIPS_PER_DAY + sample_event_day(date).map_or(0, |peak| peak.extra_trips)
}

fn sample_trip(rng: &mut StdRng, date: NaiveDate) -> TripRecord {
    let pickup = pick_borough(rng);
    let dropoff = if rng.gen_bool(0.7) {
        pickup
    } else {
        pick_borough(rng)
    };

    let hour: u32 = rng.gen_range(0..24);
    let minute: u32 = rng.gen_range(0..60);
    let distance = round2(rng.gen_range(0.3..22.0));
    let fare = round2(3.0 + 2.5 * distance + rng.gen_range(-1.5..4.0));
    let tip = if rng.gen_bool(0.75) {
        round2(fare * rng.gen_range(0.05..0.3))
    } else {
        0.0
    };
    let extra = match hour {
        16..=19 => 2.5,
        20..=23 | 0..=5 => 1.0,
        _ => 0.0,
    };
    let tolls = if pickup.0 != dropoff.0 && rng.gen_bool(0.3) {
        6.94
    } else {
        0.0
    };
    let congestion = if pickup.0 == "Manhattan" { 2.5 } else { 0.0 };
    let total = round2(fare + tip + extra + tolls + congestion + 1.0);

    TripRecord {
        pickup_date: Some(date),
        pickup_time: Some(format!("{hour:02}:{minute:02}:00")),
        pickup_borough: Some(pickup.0.to_string()),
        dropoff_borough: Some(dropoff.0.to_string()),
        pickup_zone: Some(pickup.1[rng.gen_range(0..pickup.1.len())].to_string()),
        dropoff_zone: Some(dropoff.1[rng.gen_range(0..dropoff.1.len())].to_string()),
        trip_distance: Some(distance),
        fare_amount: Some(fare),
        tip_amount: Some(tip),
        extra: Some(extra),
        tolls_amount: Some(tolls),
        congestion_surcharge: Some(congestion),
        total_amount: Some(total),
    }
}

fn pick_borough(rng: &mut StdRng) -> (&'static str, &'static [&'static str]) {
    let mut roll = rng.gen_range(0..100u32);
    for (name, share, zones) in SAMPLE_BOROUGHS {
        if roll < *share {
            return (*name, *zones);
        }
        roll -= share;
    }
    let (name, _, zones) = SAMPLE_BOROUGHS[0];
    (name, zones)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl TripSource for MemoryTripSource {
    fn fetch(&self, clauses: &[Clause]) -> Result<Vec<TripRecord>> {
        Ok(filter_trips(&self.trips, clauses))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Opens the configured CSV store, falling back to [`MemoryTripSource::sample`] when
/// no path is configured or the file cannot be loaded.
pub fn open_source(path: Option<&Path>) -> Box<dyn TripSource> {
    match path {
        Some(path) => match CsvTripSource::open(path) {
            Ok(source) => {
                info!(path = %path.display(), rows = source.len(), "Using trip CSV");
                Box::new(source)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Trip data unavailable, falling back to sample data");
                Box::new(MemoryTripSource::sample())
            }
        },
        None => {
            info!("No trip data configured, using sample data");
            Box::new(MemoryTripSource::sample())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterSpec;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    const CSV: &str = "\
pickup_date,pickup_time,pickup_borough,dropoff_borough,pickup_zone,dropoff_zone,trip_distance,fare_amount,tip_amount,extra,tolls_amount,congestion_surcharge,total_amount
2023-07-04,08:10:00,Manhattan,Queens,Midtown Center,JFK Airport,17.2,70.0,14.0,1.0,6.94,2.5,95.44
2023-07-04,13:00:00,Brooklyn,Brooklyn,Park Slope,Park Slope,1.1,7.9,2.0,0.0,0.0,0.0,10.9
";

    #[test]
    fn test_csv_source_filters() {
        let path = temp_path("taxi_insights_test_source.csv");
        fs::write(&path, CSV).unwrap();

        let source = CsvTripSource::open(&path).unwrap();
        assert_eq!(source.len(), 2);

        let clauses = FilterSpec::builder()
            .pickup_borough("Manhattan")
            .build()
            .unwrap()
            .render();
        let rows = source.fetch(&clauses).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dropoff_zone.as_deref(), Some("JFK Airport"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_csv_source_missing_file() {
        let err = CsvTripSource::open(temp_path("taxi_insights_does_not_exist.csv")).unwrap_err();
        assert!(format!("{err:#}").contains("taxi_insights_does_not_exist.csv"));
    }

    #[test]
    fn test_open_source_falls_back_to_sample() {
        let source = open_source(Some(Path::new("/nonexistent/trips.csv")));
        assert_eq!(source.describe(), "sample data");
        assert!(!source.fetch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_sample_is_deterministic() {
        let a = MemoryTripSource::sample();
        let b = MemoryTripSource::sample();
        assert_eq!(a.fetch(&[]).unwrap(), b.fetch(&[]).unwrap());
    }

    #[test]
    fn test_sample_covers_june_to_december() {
        let trips = MemoryTripSource::sample().fetch(&[]).unwrap();
        let first = trips.first().and_then(|t| t.pickup_date).unwrap();
        let last = trips.last().and_then(|t| t.pickup_date).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_sample_event_days_peak() {
        let sample = MemoryTripSource::sample();
        let july_4 = NaiveDate::from_ymd_opt(2023, 7, 4).unwrap();
        let july_5 = NaiveDate::from_ymd_opt(2023, 7, 5).unwrap();
        let trips = sample.fetch(&[]).unwrap();
        let count = |d: NaiveDate| trips.iter().filter(|t| t.pickup_date == Some(d)).count();
        assert!(count(july_4) > count(july_5));
    }
}
