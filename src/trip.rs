//! Trip records as returned by a [`TripSource`](crate::source::TripSource).

use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize};

use crate::buckets::parse_clock_time;

/// A single taxi trip row.
///
/// Every column is optional: a missing numeric field is left out of the
/// matching aggregate instead of being counted as zero. `NaN` and infinite
/// cells, as written by dataframe exports, read as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<String>,
    pub pickup_borough: Option<String>,
    pub dropoff_borough: Option<String>,
    pub pickup_zone: Option<String>,
    pub dropoff_zone: Option<String>,
    #[serde(default, deserialize_with = "finite")]
    pub trip_distance: Option<f64>,
    #[serde(default, deserialize_with = "finite")]
    pub fare_amount: Option<f64>,
    #[serde(default, deserialize_with = "finite")]
    pub tip_amount: Option<f64>,
    #[serde(default, deserialize_with = "finite")]
    pub extra: Option<f64>,
    #[serde(default, deserialize_with = "finite")]
    pub tolls_amount: Option<f64>,
    #[serde(default, deserialize_with = "finite")]
    pub congestion_surcharge: Option<f64>,
    #[serde(default, deserialize_with = "finite")]
    pub total_amount: Option<f64>,
}

fn finite<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.filter(|v| v.is_finite()))
}

impl TripRecord {
    /// CSV header, in field order.
    pub const COLUMNS: [&'static str; 13] = [
        "pickup_date",
        "pickup_time",
        "pickup_borough",
        "dropoff_borough",
        "pickup_zone",
        "dropoff_zone",
        "trip_distance",
        "fare_amount",
        "tip_amount",
        "extra",
        "tolls_amount",
        "congestion_surcharge",
        "total_amount",
    ];

    pub fn pickup_hour(&self) -> Option<u32> {
        self.pickup_time
            .as_deref()
            .and_then(parse_clock_time)
            .map(|t| t.hour())
    }

    pub fn pickup_weekday(&self) -> Option<Weekday> {
        self.pickup_date.map(|d| d.weekday())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pickup_hour() {
        let trip = TripRecord {
            pickup_time: Some("18:45:00".to_string()),
            ..Default::default()
        };
        assert_eq!(trip.pickup_hour(), Some(18));
    }

    #[test]
    fn test_missing_or_garbled_time() {
        assert_eq!(TripRecord::default().pickup_hour(), None);
        let trip = TripRecord {
            pickup_time: Some("late".to_string()),
            ..Default::default()
        };
        assert_eq!(trip.pickup_hour(), None);
    }

    #[test]
    fn test_pickup_weekday() {
        let trip = TripRecord {
            pickup_date: NaiveDate::from_ymd_opt(2023, 7, 4),
            ..Default::default()
        };
        assert_eq!(trip.pickup_weekday(), Some(Weekday::Tue));
    }

    #[test]
    fn test_deserialize_csv_with_blanks() {
        let data = "\
pickup_date,pickup_time,pickup_borough,dropoff_borough,pickup_zone,dropoff_zone,trip_distance,fare_amount,tip_amount,extra,tolls_amount,congestion_surcharge,total_amount
2023-07-04,08:10:00,Manhattan,Queens,Midtown Center,JFK Airport,17.2,70.0,,1.0,6.94,2.5,95.5
";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let trips: Vec<TripRecord> = rdr.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].tip_amount, None);
        assert_eq!(trips[0].trip_distance, Some(17.2));
        assert_eq!(trips[0].pickup_borough.as_deref(), Some("Manhattan"));
    }

    #[test]
    fn test_nan_cells_read_as_missing() {
        let data = "\
pickup_date,pickup_time,pickup_borough,dropoff_borough,pickup_zone,dropoff_zone,trip_distance,fare_amount,tip_amount,extra,tolls_amount,congestion_surcharge,total_amount
2023-07-04,08:10:00,Manhattan,Queens,,,NaN,70.0,nan,1.0,inf,2.5,95.5
";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let trips: Vec<TripRecord> = rdr.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(trips[0].trip_distance, None);
        assert_eq!(trips[0].tip_amount, None);
        assert_eq!(trips[0].tolls_amount, None);
        assert_eq!(trips[0].fare_amount, Some(70.0));
    }

    #[test]
    fn test_columns_match_serialized_header() {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.serialize(TripRecord::default()).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, TripRecord::COLUMNS.join(","));
    }
}
