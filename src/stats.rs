//! Descriptive statistics over trip records.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::trip::TripRecord;

/// Ordinary least squares fit of total fare on trip distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
}

/// Summary metrics for a set of trips. Fields are `None` when no trip
/// carried a finite value for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    pub trip_count: usize,
    pub avg_distance: Option<f64>,
    pub avg_fare: Option<f64>,
    pub avg_tip: Option<f64>,
    pub avg_total: Option<f64>,
    pub total_revenue: Option<f64>,
    pub regression: Option<Regression>,
}

impl AggregateResult {
    pub fn from_trips(rows: &[TripRecord]) -> Self {
        let column = |f: fn(&TripRecord) -> Option<f64>| -> Vec<f64> {
            rows.iter().filter_map(f).filter(|v| v.is_finite()).collect()
        };

        let totals = column(|r| r.total_amount);

        let points: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|r| Some((r.trip_distance?, r.total_amount?)))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();

        AggregateResult {
            trip_count: rows.len(),
            avg_distance: mean(&column(|r| r.trip_distance)),
            avg_fare: mean(&column(|r| r.fare_amount)),
            avg_tip: mean(&column(|r| r.tip_amount)),
            avg_total: mean(&totals),
            total_revenue: sum(&totals),
            regression: linear_regression(&points),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trip_count == 0
    }
}

/// Computes an [`AggregateResult`] over `rows`.
pub fn summarize(rows: &[TripRecord]) -> AggregateResult {
    AggregateResult::from_trips(rows)
}

/// Arithmetic mean, `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sum, `None` for empty input.
pub fn sum(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum())
    }
}

/// Fits `y = slope * x + intercept` and reports Pearson's r.
///
/// Returns `None` unless at least two distinct `x` values are present. When
/// every `y` is equal the fit is flat and `r_value` is 0.
pub fn linear_regression(points: &[(f64, f64)]) -> Option<Regression> {
    let first_x = points.first()?.0;
    if points.iter().all(|(x, _)| *x == first_x) {
        return None;
    }

    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let dx = x - x_mean;
        let dy = y - y_mean;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r_value = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    Some(Regression {
        slope,
        intercept,
        r_value,
    })
}

/// Relative deviation of `value` from `baseline`: `value / baseline - 1`.
///
/// # Errors
///
/// [`Error::DivisionByZero`] when `baseline` is zero.
pub fn deviation(value: f64, baseline: f64) -> Result<f64> {
    if baseline == 0.0 {
        return Err(Error::DivisionByZero);
    }
    Ok(value / baseline - 1.0)
}

/// `part` as a percentage of `total`, `None` when `total` is zero.
pub fn pct(part: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some((part as f64 / total as f64) * 100.0)
    }
}
