//! Month overview: daily volume, peak day, borough share and event days.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::calendar::{self, Week};
use crate::events::{EventCalendar, EventRecord};
use crate::filter::FilterSpec;
use crate::source::TripSource;
use crate::stats::deviation;
use crate::trip::TripRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub trips: usize,
    /// At least one event was held that day.
    pub is_event: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoroughShare {
    pub borough: String,
    pub trip_count: usize,
    /// Percentage of pickups, one decimal place.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthOverview {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub total_trips: usize,
    pub avg_daily_trips: f64,
    pub peak_day: Option<DailyCount>,
    pub days: Vec<DailyCount>,
    pub borough_share: Vec<BoroughShare>,
    pub calendar: Vec<Week>,
}

/// Events and taxi demand on a single day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayEvents {
    pub date: NaiveDate,
    pub trips: usize,
    pub events: Vec<EventRecord>,
    /// Percent change of the day's trips against the month's daily average;
    /// `None` when the month has no trips.
    pub demand_change_pct: Option<f64>,
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate, u32)> {
    let days_in_month = calendar::days_in_month(year, month)?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow::anyhow!("{year}-{month} is outside the supported date range"))?;
    let last = first + chrono::Duration::days(i64::from(days_in_month) - 1);
    Ok((first, last, days_in_month))
}

fn trips_between(source: &dyn TripSource, first: NaiveDate, last: NaiveDate) -> Result<Vec<TripRecord>> {
    let spec = FilterSpec::builder().date_range(first, last).build()?;
    source.fetch(&spec.render())
}

/// Builds the overview for one month of trips.
#[tracing::instrument(skip(source, events), fields(source = %source.describe(), events = %events.describe()))]
pub fn month_overview(
    source: &dyn TripSource,
    events: &EventCalendar,
    year: i32,
    month: u32,
) -> Result<MonthOverview> {
    let (first, last, days_in_month) = month_bounds(year, month)?;
    let trips = trips_between(source, first, last)?;

    let days = daily_counts(&trips, events, first, last);
    let total_trips = trips.len();
    let avg_daily_trips = total_trips as f64 / f64::from(days_in_month);
    let peak_day = peak_day(&days);

    info!(total_trips, ?peak_day, "Built month overview");

    Ok(MonthOverview {
        year,
        month,
        month_name: calendar::month_name(month)?,
        total_trips,
        avg_daily_trips,
        peak_day,
        days,
        borough_share: borough_share(&trips),
        calendar: calendar::build(year, month)?,
    })
}

/// Lists the events held on `date` next to that day's trips.
#[tracing::instrument(skip(source, events), fields(source = %source.describe()))]
pub fn day_events(source: &dyn TripSource, events: &EventCalendar, date: NaiveDate) -> Result<DayEvents> {
    let (first, last, days_in_month) = month_bounds(date.year(), date.month())?;
    let trips = trips_between(source, first, last)?;
    let on_day = trips.iter().filter(|t| t.pickup_date == Some(date)).count();

    let avg_daily = trips.len() as f64 / f64::from(days_in_month);
    let demand_change_pct = deviation(on_day as f64, avg_daily).ok().map(|d| d * 100.0);

    Ok(DayEvents {
        date,
        trips: on_day,
        events: events.on(date).to_vec(),
        demand_change_pct,
    })
}

/// Trip counts for every date in `first..=last`, zero-filled, with the
/// days `events` lists flagged.
pub fn daily_counts(
    trips: &[TripRecord],
    events: &EventCalendar,
    first: NaiveDate,
    last: NaiveDate,
) -> Vec<DailyCount> {
    let mut counts: BTreeMap<NaiveDate, usize> = first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|d| (d, 0))
        .collect();
    for date in trips.iter().filter_map(|t| t.pickup_date) {
        if let Some(count) = counts.get_mut(&date) {
            *count += 1;
        }
    }
    counts
        .into_iter()
        .map(|(date, trips)| DailyCount {
            date,
            trips,
            is_event: events.is_event_day(date),
        })
        .collect()
}

/// Busiest day; the earliest wins a tie. `None` when no day has trips.
pub fn peak_day(days: &[DailyCount]) -> Option<DailyCount> {
    days.iter()
        .filter(|d| d.trips > 0)
        .fold(None, |best: Option<DailyCount>, d| match best {
            Some(b) if b.trips >= d.trips => Some(b),
            _ => Some(*d),
        })
}

/// Share of pickups per borough, largest first.
pub fn borough_share(trips: &[TripRecord]) -> Vec<BoroughShare> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for borough in trips.iter().filter_map(|t| t.pickup_borough.as_deref()) {
        *counts.entry(borough).or_default() += 1;
    }
    let total: usize = counts.values().sum();

    let mut shares: Vec<BoroughShare> = counts
        .into_iter()
        .map(|(borough, trip_count)| BoroughShare {
            borough: borough.to_string(),
            trip_count,
            percentage: crate::stats::pct(trip_count, total)
                .map(|p| (p * 10.0).round() / 10.0)
                .unwrap_or_default(),
        })
        .collect();
    shares.sort_by(|a, b| b.trip_count.cmp(&a.trip_count));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryTripSource;

    fn no_events() -> EventCalendar {
        EventCalendar::new(vec![])
    }

    fn event_on(d: NaiveDate, title: &str) -> EventRecord {
        EventRecord {
            event_date: Some(d),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn day(d: NaiveDate, trips: usize) -> DailyCount {
        DailyCount {
            date: d,
            trips,
            is_event: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trip_on(d: NaiveDate, borough: &str) -> TripRecord {
        TripRecord {
            pickup_date: Some(d),
            pickup_borough: Some(borough.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_daily_counts_zero_fill() {
        let trips = vec![trip_on(date(2023, 2, 3), "Queens"), trip_on(date(2023, 2, 3), "Queens")];
        let days = daily_counts(&trips, &no_events(), date(2023, 2, 1), date(2023, 2, 28));
        assert_eq!(days.len(), 28);
        assert_eq!(days[2].trips, 2);
        assert_eq!(days.iter().map(|d| d.trips).sum::<usize>(), 2);
        assert!(days.iter().all(|d| !d.is_event));
    }

    #[test]
    fn test_daily_counts_flag_event_days() {
        let events = EventCalendar::new(vec![event_on(date(2023, 2, 14), "Parade")]);
        let days = daily_counts(&[], &events, date(2023, 2, 1), date(2023, 2, 28));
        let flagged: Vec<NaiveDate> = days.iter().filter(|d| d.is_event).map(|d| d.date).collect();
        assert_eq!(flagged, vec![date(2023, 2, 14)]);
    }

    #[test]
    fn test_peak_day_prefers_earliest() {
        let days = vec![day(date(2023, 7, 1), 3), day(date(2023, 7, 2), 5), day(date(2023, 7, 3), 5)];
        assert_eq!(peak_day(&days).unwrap().date, date(2023, 7, 2));
        assert_eq!(peak_day(&[day(date(2023, 7, 1), 0)]), None);
    }

    #[test]
    fn test_borough_share() {
        let d = date(2023, 7, 1);
        let trips = vec![
            trip_on(d, "Manhattan"),
            trip_on(d, "Manhattan"),
            trip_on(d, "Brooklyn"),
        ];
        let shares = borough_share(&trips);
        assert_eq!(shares[0].borough, "Manhattan");
        assert_eq!(shares[0].percentage, 66.7);
        assert_eq!(shares[1].percentage, 33.3);
        assert!(borough_share(&[]).is_empty());
    }

    #[test]
    fn test_month_overview_only_counts_that_month() {
        let source = MemoryTripSource::new(vec![
            trip_on(date(2023, 7, 4), "Manhattan"),
            trip_on(date(2023, 7, 4), "Queens"),
            trip_on(date(2023, 7, 20), "Manhattan"),
            trip_on(date(2023, 8, 1), "Manhattan"),
        ]);

        let events = EventCalendar::new(vec![event_on(date(2023, 7, 4), "Fireworks Show")]);

        let overview = month_overview(&source, &events, 2023, 7).unwrap();
        assert_eq!(overview.month_name, "July");
        assert_eq!(overview.total_trips, 3);
        assert_eq!(overview.days.len(), 31);
        assert_eq!(overview.peak_day.unwrap().date, date(2023, 7, 4));
        assert!((overview.avg_daily_trips - 3.0 / 31.0).abs() < 1e-12);
        assert_eq!(overview.calendar.len(), 6);
        assert!(overview.days[3].is_event);
        assert!(overview.peak_day.unwrap().is_event);
    }

    #[test]
    fn test_day_events_demand_change() {
        let d = date(2023, 6, 10);
        let mut trips = vec![trip_on(d, "Manhattan"); 3];
        trips.extend((1..=27).map(|n| trip_on(date(2023, 6, n), "Queens")));
        let source = MemoryTripSource::new(trips);
        let events = EventCalendar::new(vec![event_on(d, "Street Fair"), event_on(d, "Concert")]);

        // 30 trips over 30 days: 1 a day on average, 4 on the 10th.
        let report = day_events(&source, &events, d).unwrap();
        assert_eq!(report.trips, 4);
        assert_eq!(report.events.len(), 2);
        assert!((report.demand_change_pct.unwrap() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_day_events_without_trips() {
        let source = MemoryTripSource::new(vec![]);
        let report = day_events(&source, &no_events(), date(2023, 6, 10)).unwrap();
        assert_eq!(report.trips, 0);
        assert!(report.events.is_empty());
        assert_eq!(report.demand_change_pct, None);
    }

    #[test]
    fn test_month_overview_invalid_month() {
        let source = MemoryTripSource::new(vec![]);
        assert!(month_overview(&source, &no_events(), 2023, 13).is_err());
    }
}
