//! Error types for the filter, statistics and calendar layers.

use thiserror::Error;

/// Validation failures raised at the point of invalid input.
///
/// Undefined aggregates (an empty trip set, a regression over a single
/// distance) are reported as `None` fields on the result, not as errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid {field} range {low}..{high}: {reason}")]
    InvalidRange {
        field: &'static str,
        low: String,
        high: String,
        reason: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("month must be within 1..=12, got {0}")]
    InvalidMonth(u32),

    #[error("deviation against a zero baseline")]
    DivisionByZero,

    #[error("invalid borough name: {0:?}")]
    InvalidBorough(String),

    #[error("unknown time bucket label: {0:?}")]
    UnknownTimeBucket(String),
}

pub type Result<T> = std::result::Result<T, Error>;
