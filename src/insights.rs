//! The three exploration modes of the insights tool.
//!
//! Each mode turns a request into a [`FilterSpec`], fetches matching trips
//! from a [`TripSource`] and reduces them to a serializable report.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Weekday;
use serde::Serialize;
use tracing::{debug, info};

use crate::buckets::TimeBucket;
use crate::filter::FilterSpec;
use crate::source::TripSource;
use crate::stats::{AggregateResult, Regression, deviation, linear_regression, mean, summarize};
use crate::trip::TripRecord;

const TOP_ZONES: usize = 10;
/// Average city taxi speed used to turn distance into time on the meter.
const AVG_SPEED_MPH: f64 = 12.0;
/// Similar trips are those within this many miles of the requested distance.
const SIMILAR_DISTANCE_MILES: f64 = 1.0;
const VERDICT_BAND: f64 = 0.1;
const GOOD_TIP_RATIO: f64 = 0.15;
const FARE_TREND_MAX_MILES: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStats {
    pub pickup_zone: String,
    pub trip_count: usize,
    pub avg_fare: Option<f64>,
    pub avg_tip: Option<f64>,
    pub avg_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub day: Weekday,
    pub time_bucket: TimeBucket,
    pub pickup_borough: Option<String>,
    /// Most lucrative pickup zones, best first.
    pub zones: Vec<ZoneStats>,
    pub avg_total: Option<f64>,
    pub avg_tip: Option<f64>,
    pub total_trips: usize,
}

/// Ranks pickup zones by average total fare for a weekday and time of day.
#[tracing::instrument(skip(source), fields(source = %source.describe()))]
pub fn best_time_and_place(
    source: &dyn TripSource,
    day: Weekday,
    time_bucket: TimeBucket,
    pickup_borough: Option<&str>,
) -> Result<Recommendation> {
    let mut builder = FilterSpec::builder().day_of_week(day).time_bucket(time_bucket);
    if let Some(borough) = pickup_borough {
        builder = builder.pickup_borough(borough);
    }
    let spec = builder.build()?;

    let trips = source.fetch(&spec.render())?;
    let zones = rank_zones(&trips, TOP_ZONES);

    let zone_totals: Vec<f64> = zones.iter().filter_map(|z| z.avg_total).collect();
    let zone_tips: Vec<f64> = zones.iter().filter_map(|z| z.avg_tip).collect();
    let total_trips = zones.iter().map(|z| z.trip_count).sum();

    info!(zones = zones.len(), total_trips, "Ranked pickup zones");

    Ok(Recommendation {
        day,
        time_bucket,
        pickup_borough: pickup_borough.map(str::to_string),
        avg_total: mean(&zone_totals),
        avg_tip: mean(&zone_tips),
        total_trips,
        zones,
    })
}

/// Groups trips by pickup zone and keeps the `limit` zones with the highest
/// average total. Trips without a zone are ignored; ties break on zone name.
pub fn rank_zones(trips: &[TripRecord], limit: usize) -> Vec<ZoneStats> {
    let mut by_zone: BTreeMap<&str, Vec<&TripRecord>> = BTreeMap::new();
    for trip in trips {
        if let Some(zone) = trip.pickup_zone.as_deref() {
            by_zone.entry(zone).or_default().push(trip);
        }
    }

    let mut zones: Vec<ZoneStats> = by_zone
        .into_iter()
        .map(|(zone, rows)| ZoneStats {
            pickup_zone: zone.to_string(),
            trip_count: rows.len(),
            avg_fare: column_mean(&rows, |t| t.fare_amount),
            avg_tip: column_mean(&rows, |t| t.tip_amount),
            avg_total: column_mean(&rows, |t| t.total_amount),
        })
        .collect();

    // zones without any total sort last
    zones.sort_by(|a, b| {
        let a_total = a.avg_total.unwrap_or(f64::NEG_INFINITY);
        let b_total = b.avg_total.unwrap_or(f64::NEG_INFINITY);
        b_total
            .total_cmp(&a_total)
            .then_with(|| a.pickup_zone.cmp(&b.pickup_zone))
    });
    zones.truncate(limit);
    zones
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitRequest {
    pub distance_miles: f64,
    pub time_bucket: TimeBucket,
    pub pickup_borough: String,
    pub dropoff_borough: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FareComponent {
    pub component: &'static str,
    pub amount: f64,
}

/// Network-wide reference values a trip is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
    pub avg_total: f64,
    pub avg_per_mile: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    AboveAverage,
    Average,
    BelowAverage,
}

impl Verdict {
    /// Classifies a relative deviation from the baseline.
    pub fn from_deviation(dev: f64) -> Self {
        if dev > VERDICT_BAND {
            Verdict::AboveAverage
        } else if dev < -VERDICT_BAND {
            Verdict::BelowAverage
        } else {
            Verdict::Average
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitReport {
    pub request: ProfitRequest,
    pub similar_trips: usize,
    pub avg_fare: Option<f64>,
    pub avg_tip: Option<f64>,
    pub avg_extra: Option<f64>,
    pub avg_tolls: Option<f64>,
    pub avg_congestion: Option<f64>,
    pub avg_total: Option<f64>,
    /// Components with a positive average, in display order.
    pub breakdown: Vec<FareComponent>,
    pub baseline: Option<Baseline>,
    pub value_deviation: Option<f64>,
    pub per_mile: Option<f64>,
    pub per_mile_deviation: Option<f64>,
    pub hourly_rate: Option<f64>,
    pub verdict: Option<Verdict>,
    pub good_tips: bool,
    pub rush_hour: bool,
}

/// Estimates what a trip of the requested shape earns, based on similar
/// historical trips. Returns `Ok(None)` when no similar trip exists.
#[tracing::instrument(skip(source), fields(source = %source.describe()))]
pub fn trip_profitability(
    source: &dyn TripSource,
    request: &ProfitRequest,
) -> Result<Option<ProfitReport>> {
    let d = request.distance_miles;
    let spec = FilterSpec::builder()
        .distance_range((d - SIMILAR_DISTANCE_MILES).max(0.0), d + SIMILAR_DISTANCE_MILES)
        .time_bucket(request.time_bucket)
        .pickup_borough(request.pickup_borough.as_str())
        .dropoff_borough(request.dropoff_borough.as_str())
        .build()?;

    let similar = source.fetch(&spec.render())?;
    if similar.is_empty() {
        info!("No similar trips found");
        return Ok(None);
    }

    let baseline = baseline(&source.fetch(&[])?);
    debug!(?baseline, similar = similar.len(), "Computed baseline");

    Ok(Some(profit_report(request, &similar, baseline)))
}

/// Builds the report for an already-fetched set of similar trips.
pub fn profit_report(
    request: &ProfitRequest,
    similar: &[TripRecord],
    baseline: Option<Baseline>,
) -> ProfitReport {
    let rows: Vec<&TripRecord> = similar.iter().collect();
    let avg_fare = column_mean(&rows, |t| t.fare_amount);
    let avg_tip = column_mean(&rows, |t| t.tip_amount);
    let avg_extra = column_mean(&rows, |t| t.extra);
    let avg_tolls = column_mean(&rows, |t| t.tolls_amount);
    let avg_congestion = column_mean(&rows, |t| t.congestion_surcharge);
    let avg_total = column_mean(&rows, |t| t.total_amount);

    let breakdown = [
        ("Base Fare", avg_fare),
        ("Tip", avg_tip),
        ("Extra", avg_extra),
        ("Tolls", avg_tolls),
        ("Congestion", avg_congestion),
    ]
    .into_iter()
    .filter_map(|(component, amount)| {
        amount
            .filter(|a| *a > 0.0)
            .map(|amount| FareComponent { component, amount })
    })
    .collect();

    let d = request.distance_miles;
    let per_mile = avg_total.filter(|_| d > 0.0).map(|t| t / d);
    let hourly_rate = avg_total
        .filter(|_| d > 0.0)
        .map(|t| t / (d / AVG_SPEED_MPH));

    let value_deviation = avg_total
        .zip(baseline)
        .and_then(|(t, b)| deviation(t, b.avg_total).ok());
    let per_mile_deviation = per_mile
        .zip(baseline)
        .and_then(|(p, b)| deviation(p, b.avg_per_mile).ok());

    let good_tips = matches!((avg_tip, avg_fare), (Some(tip), Some(fare)) if tip > fare * GOOD_TIP_RATIO);
    let rush_hour = request.time_bucket.is_rush_hour() && avg_congestion.is_some_and(|c| c > 0.0);

    ProfitReport {
        request: request.clone(),
        similar_trips: similar.len(),
        avg_fare,
        avg_tip,
        avg_extra,
        avg_tolls,
        avg_congestion,
        avg_total,
        breakdown,
        baseline,
        value_deviation,
        per_mile,
        per_mile_deviation,
        hourly_rate,
        verdict: value_deviation.map(Verdict::from_deviation),
        good_tips,
        rush_hour,
    }
}

/// Average total and average total-per-mile over trips with a positive
/// distance.
pub fn baseline(trips: &[TripRecord]) -> Option<Baseline> {
    let paired: Vec<(f64, f64)> = trips
        .iter()
        .filter_map(|t| Some((t.trip_distance?, t.total_amount?)))
        .filter(|(d, _)| *d > 0.0)
        .collect();

    let totals: Vec<f64> = paired.iter().map(|(_, t)| *t).collect();
    let per_mile: Vec<f64> = paired.iter().map(|(d, t)| t / d).collect();

    Some(Baseline {
        avg_total: mean(&totals)?,
        avg_per_mile: mean(&per_mile)?,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourStats {
    pub hour: u32,
    pub trip_count: usize,
    pub avg_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoroughPair {
    pub pickup_borough: String,
    pub dropoff_borough: String,
    pub trip_count: usize,
    pub avg_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoroughFares {
    pub borough: String,
    pub trip_count: usize,
    pub avg_fare: Option<f64>,
    pub avg_tip: Option<f64>,
    pub avg_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TipStats {
    pub trips: usize,
    pub mean_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExploreReport {
    pub filter: FilterSpec,
    pub summary: AggregateResult,
    pub by_hour: Vec<HourStats>,
    pub borough_matrix: Vec<BoroughPair>,
    pub by_pickup_borough: Vec<BoroughFares>,
    pub fare_trend: Option<Regression>,
    pub tip_percentage: Option<TipStats>,
}

/// Runs the custom filter and computes every view of the matching trips.
#[tracing::instrument(skip_all, fields(source = %source.describe()))]
pub fn explore(source: &dyn TripSource, spec: &FilterSpec) -> Result<(ExploreReport, Vec<TripRecord>)> {
    let trips = source.fetch(&spec.render())?;
    info!(trips = trips.len(), "Filtered trips for exploration");
    Ok((explore_trips(spec, &trips), trips))
}

pub fn explore_trips(spec: &FilterSpec, trips: &[TripRecord]) -> ExploreReport {
    ExploreReport {
        filter: spec.clone(),
        summary: summarize(trips),
        by_hour: trips_by_hour(trips),
        borough_matrix: borough_matrix(trips),
        by_pickup_borough: fares_by_pickup_borough(trips),
        fare_trend: fare_trend(trips),
        tip_percentage: tip_percentage(trips),
    }
}

/// Trip count and average total per pickup hour, for hours that have trips.
pub fn trips_by_hour(trips: &[TripRecord]) -> Vec<HourStats> {
    let mut by_hour: BTreeMap<u32, Vec<&TripRecord>> = BTreeMap::new();
    for trip in trips {
        if let Some(hour) = trip.pickup_hour() {
            by_hour.entry(hour).or_default().push(trip);
        }
    }
    by_hour
        .into_iter()
        .map(|(hour, rows)| HourStats {
            hour,
            trip_count: rows.len(),
            avg_total: column_mean(&rows, |t| t.total_amount),
        })
        .collect()
}

/// Pickup x dropoff borough counts, busiest pair first.
pub fn borough_matrix(trips: &[TripRecord]) -> Vec<BoroughPair> {
    let mut pairs: BTreeMap<(&str, &str), Vec<&TripRecord>> = BTreeMap::new();
    for trip in trips {
        if let (Some(p), Some(d)) = (trip.pickup_borough.as_deref(), trip.dropoff_borough.as_deref()) {
            pairs.entry((p, d)).or_default().push(trip);
        }
    }
    let mut out: Vec<BoroughPair> = pairs
        .into_iter()
        .map(|((p, d), rows)| BoroughPair {
            pickup_borough: p.to_string(),
            dropoff_borough: d.to_string(),
            trip_count: rows.len(),
            avg_total: column_mean(&rows, |t| t.total_amount),
        })
        .collect();
    // stable sort keeps the (pickup, dropoff) order among equal counts
    out.sort_by(|a, b| b.trip_count.cmp(&a.trip_count));
    out
}

/// Average fare, tip and total per pickup borough, highest average total first.
pub fn fares_by_pickup_borough(trips: &[TripRecord]) -> Vec<BoroughFares> {
    let mut by_borough: BTreeMap<&str, Vec<&TripRecord>> = BTreeMap::new();
    for trip in trips {
        if let Some(b) = trip.pickup_borough.as_deref() {
            by_borough.entry(b).or_default().push(trip);
        }
    }
    let mut out: Vec<BoroughFares> = by_borough
        .into_iter()
        .map(|(borough, rows)| BoroughFares {
            borough: borough.to_string(),
            trip_count: rows.len(),
            avg_fare: column_mean(&rows, |t| t.fare_amount),
            avg_tip: column_mean(&rows, |t| t.tip_amount),
            avg_total: column_mean(&rows, |t| t.total_amount),
        })
        .collect();
    out.sort_by(|a, b| {
        b.avg_total
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&a.avg_total.unwrap_or(f64::NEG_INFINITY))
    });
    out
}

/// Regression of total on distance over trips with `0 < distance < 30`.
pub fn fare_trend(trips: &[TripRecord]) -> Option<Regression> {
    let points: Vec<(f64, f64)> = trips
        .iter()
        .filter_map(|t| Some((t.trip_distance?, t.total_amount?)))
        .filter(|(d, _)| *d > 0.0 && *d < FARE_TREND_MAX_MILES)
        .collect();
    linear_regression(&points)
}

/// Mean tip as a percentage of the fare, each trip clipped to `[0, 100]`.
/// Trips without a positive fare are skipped.
pub fn tip_percentage(trips: &[TripRecord]) -> Option<TipStats> {
    let pcts: Vec<f64> = trips
        .iter()
        .filter_map(|t| Some((t.tip_amount?, t.fare_amount?)))
        .filter(|(_, fare)| *fare > 0.0)
        .map(|(tip, fare)| (tip / fare * 100.0).clamp(0.0, 100.0))
        .collect();
    Some(TipStats {
        trips: pcts.len(),
        mean_pct: mean(&pcts)?,
    })
}

fn column_mean(rows: &[&TripRecord], f: fn(&TripRecord) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = rows
        .iter()
        .filter_map(|t| f(t))
        .filter(|v| v.is_finite())
        .collect();
    mean(&values)
}
