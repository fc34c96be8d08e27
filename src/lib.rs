pub mod buckets;
pub mod calendar;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod insights;
pub mod output;
pub mod overview;
pub mod source;
pub mod sql;
pub mod stats;
pub mod trends;
pub mod trip;

pub use buckets::{TimeBucket, bucket_of, hour_range_of};
pub use error::Error;
pub use events::{EventCalendar, EventRecord};
pub use filter::{Borough, Clause, FilterSpec, FilterSpecBuilder, TripEnd};
pub use stats::{AggregateResult, Regression, deviation, summarize};
pub use trip::TripRecord;
