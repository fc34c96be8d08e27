//! Longer-range views: how events line up with taxi demand, and how the
//! average fare moves month to month.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::calendar;
use crate::events::EventCalendar;
use crate::filter::FilterSpec;
use crate::source::TripSource;
use crate::stats::{Regression, deviation, linear_regression, mean};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyCorrelation {
    pub date: NaiveDate,
    pub taxi_trips: usize,
    pub events: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub first: NaiveDate,
    pub last: NaiveDate,
    pub days: Vec<DailyCorrelation>,
    /// Fit of daily trips on daily event count. `None` unless at least two
    /// different event counts occur.
    pub regression: Option<Regression>,
    pub event_day_avg_trips: Option<f64>,
    pub other_day_avg_trips: Option<f64>,
    /// Relative lift of event days over the other days.
    pub event_day_lift: Option<f64>,
}

/// Pairs daily trip volume with the number of events held each day over
/// `first..=last`.
#[tracing::instrument(skip(source, events), fields(source = %source.describe(), events = %events.describe()))]
pub fn correlation(
    source: &dyn TripSource,
    events: &EventCalendar,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<CorrelationReport> {
    let spec = FilterSpec::builder().date_range(first, last).build()?;
    let trips = source.fetch(&spec.render())?;

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

    let days: Vec<DailyCorrelation> = counts
        .into_iter()
        .map(|(date, taxi_trips)| DailyCorrelation {
            date,
            taxi_trips,
            events: events.count_on(date),
        })
        .collect();

    let points: Vec<(f64, f64)> = days
        .iter()
        .map(|d| (d.events as f64, d.taxi_trips as f64))
        .collect();

    let (event_days, other_days): (Vec<_>, Vec<_>) = days.iter().partition(|d| d.events > 0);
    let avg_trips = |group: &[&DailyCorrelation]| {
        mean(&group.iter().map(|d| d.taxi_trips as f64).collect::<Vec<_>>())
    };
    let event_day_avg_trips = avg_trips(&event_days);
    let other_day_avg_trips = avg_trips(&other_days);
    let event_day_lift = match (event_day_avg_trips, other_day_avg_trips) {
        (Some(on), Some(off)) => deviation(on, off).ok(),
        _ => None,
    };

    let regression = linear_regression(&points);
    info!(
        days = days.len(),
        event_days = event_days.len(),
        r_value = regression.map(|r| r.r_value),
        "Correlated events with taxi demand"
    );

    Ok(CorrelationReport {
        first,
        last,
        regression,
        event_day_avg_trips,
        other_day_avg_trips,
        event_day_lift,
        days,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPrice {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub trips: usize,
    /// `None` for a month without a usable total.
    pub avg_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTrend {
    pub borough: Option<String>,
    pub months: Vec<MonthlyPrice>,
    pub avg_total: Option<f64>,
    pub min_avg_total: Option<f64>,
    pub max_avg_total: Option<f64>,
    /// Percent change from the first to the last month with a price.
    pub change_pct: Option<f64>,
}

/// Average total fare per calendar month over `first..=last`, optionally
/// restricted to one pickup borough.
#[tracing::instrument(skip(source), fields(source = %source.describe()))]
pub fn price_trend(
    source: &dyn TripSource,
    first: NaiveDate,
    last: NaiveDate,
    borough: Option<&str>,
) -> Result<PriceTrend> {
    let mut builder = FilterSpec::builder().date_range(first, last);
    if let Some(b) = borough {
        builder = builder.pickup_borough(b);
    }
    let trips = source.fetch(&builder.build()?.render())?;

    let mut by_month: BTreeMap<(i32, u32), (usize, Vec<f64>)> = BTreeMap::new();
    let mut cursor = NaiveDate::from_ymd_opt(first.year(), first.month(), 1);
    while let Some(month_start) = cursor.filter(|d| *d <= last) {
        by_month.insert((month_start.year(), month_start.month()), (0, Vec::new()));
        cursor = month_start.checked_add_months(chrono::Months::new(1));
    }

    let mut all_totals = Vec::new();
    for trip in &trips {
        let Some(date) = trip.pickup_date else {
            continue;
        };
        let Some((count, totals)) = by_month.get_mut(&(date.year(), date.month())) else {
            continue;
        };
        *count += 1;
        if let Some(total) = trip.total_amount.filter(|v| v.is_finite()) {
            totals.push(total);
            all_totals.push(total);
        }
    }

    let months = by_month
        .into_iter()
        .map(|((year, month), (trips, totals))| {
            Ok(MonthlyPrice {
                year,
                month,
                month_name: calendar::month_name(month)?,
                trips,
                avg_total: mean(&totals),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let priced: Vec<f64> = months.iter().filter_map(|m| m.avg_total).collect();
    let change_pct = match (priced.first(), priced.last()) {
        (Some(start), Some(end)) if priced.len() > 1 => {
            deviation(*end, *start).ok().map(|d| d * 100.0)
        }
        _ => None,
    };

    Ok(PriceTrend {
        borough: borough.map(str::to_string),
        avg_total: mean(&all_totals),
        min_avg_total: priced.iter().copied().reduce(f64::min),
        max_avg_total: priced.iter().copied().reduce(f64::max),
        change_pct,
        months,
    })
}
