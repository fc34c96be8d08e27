use std::path::Path;

use chrono::{NaiveDate, Weekday};
use taxi_insights::calendar;
use taxi_insights::events::{EventCalendar, open_events};
use taxi_insights::insights::{self, ProfitRequest, Verdict};
use taxi_insights::output::write_records;
use taxi_insights::overview::{day_events, month_overview};
use taxi_insights::source::{CsvTripSource, TripSource, open_source, read_trips};
use taxi_insights::sql::render_where;
use taxi_insights::trends::{correlation, price_trend};
use taxi_insights::{Error, FilterSpec, TimeBucket, deviation};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sample_trips.csv");
const EVENTS_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sample_events.csv");

fn fixture() -> CsvTripSource {
    CsvTripSource::open(FIXTURE).expect("Failed to load fixture")
}

fn events_fixture() -> EventCalendar {
    EventCalendar::open(EVENTS_FIXTURE).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_fixture_loads_with_blank_fields() {
    let source = fixture();
    assert_eq!(source.len(), 10);

    let all = source.fetch(&[]).unwrap();
    let blank = all.iter().find(|t| t.pickup_date == Some(date(2023, 7, 5))).unwrap();
    assert_eq!(blank.total_amount, None);
    assert_eq!(blank.pickup_time, None);
}

#[test]
fn test_best_time_and_place_pipeline() {
    let source = fixture();
    let rec = insights::best_time_and_place(&source, Weekday::Mon, TimeBucket::Morning, Some("Manhattan"))
        .unwrap();

    assert_eq!(rec.total_trips, 4);
    assert_eq!(rec.zones.len(), 2);
    assert_eq!(rec.zones[0].pickup_zone, "Upper East Side South");
    assert_eq!(rec.zones[1].pickup_zone, "Midtown Center");
    assert_eq!(rec.zones[1].trip_count, 3);
}

#[test]
fn test_trip_profitability_pipeline() {
    let source = fixture();
    let request = ProfitRequest {
        distance_miles: 5.0,
        time_bucket: TimeBucket::Morning,
        pickup_borough: "Manhattan".to_string(),
        dropoff_borough: "Brooklyn".to_string(),
    };

    let report = insights::trip_profitability(&source, &request).unwrap().unwrap();
    assert_eq!(report.similar_trips, 3);

    let avg_total = report.avg_total.unwrap();
    assert!((avg_total - 80.5 / 3.0).abs() < 1e-9);
    assert!((report.hourly_rate.unwrap() - avg_total * 12.0 / 5.0).abs() < 1e-9);

    let baseline = report.baseline.unwrap();
    assert!((baseline.avg_total - 353.6 / 9.0).abs() < 1e-9);
    assert_eq!(report.verdict, Some(Verdict::BelowAverage));
    assert!(report.rush_hour);
    assert!(!report.good_tips);
}

#[test]
fn test_trip_profitability_without_similar_trips() {
    let source = fixture();
    let request = ProfitRequest {
        distance_miles: 12.0,
        time_bucket: TimeBucket::LateNight,
        pickup_borough: "Bronx".to_string(),
        dropoff_borough: "Queens".to_string(),
    };
    assert!(insights::trip_profitability(&source, &request).unwrap().is_none());
}

#[test]
fn test_explore_and_export() {
    let source = fixture();
    let spec = FilterSpec::builder()
        .date_range(date(2023, 7, 1), date(2023, 7, 31))
        .pickup_borough("Manhattan")
        .build()
        .unwrap();

    let (report, trips) = insights::explore(&source, &spec).unwrap();
    assert_eq!(report.summary.trip_count, 5);
    assert_eq!(trips.len(), 5);
    assert!(report.fare_trend.is_some());

    let path = std::env::temp_dir().join("taxi_insights_integration_export.csv");
    write_records(&path, &trips).unwrap();
    let back = read_trips(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(back, trips);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_month_overview_pipeline() {
    let source = fixture();
    let overview = month_overview(&source, &events_fixture(), 2023, 7).unwrap();

    assert_eq!(overview.total_trips, 9);
    assert_eq!(overview.days.len(), 31);
    let peak = overview.peak_day.unwrap();
    assert_eq!(peak.date, date(2023, 7, 3));
    assert_eq!(peak.trips, 4);

    assert_eq!(overview.borough_share[0].borough, "Manhattan");
    assert_eq!(overview.borough_share[0].percentage, 55.6);

    let event_days: Vec<NaiveDate> = overview
        .days
        .iter()
        .filter(|d| d.is_event)
        .map(|d| d.date)
        .collect();
    assert_eq!(event_days, vec![date(2023, 7, 4), date(2023, 7, 10)]);
    assert!(!peak.is_event);
}

#[test]
fn test_day_events_pipeline() {
    let report = day_events(&fixture(), &events_fixture(), date(2023, 7, 4)).unwrap();

    assert_eq!(report.trips, 3);
    let titles: Vec<&str> = report.events.iter().filter_map(|e| e.title.as_deref()).collect();
    assert_eq!(titles, vec!["Independence Day Parade", "Fireworks Show"]);
    // 9 July trips over 31 days against 3 on the day.
    let expected = (3.0 / (9.0 / 31.0) - 1.0) * 100.0;
    assert!((report.demand_change_pct.unwrap() - expected).abs() < 1e-9);
}

#[test]
fn test_correlation_pipeline() {
    let report = correlation(&fixture(), &events_fixture(), date(2023, 7, 1), date(2023, 7, 10)).unwrap();

    assert_eq!(report.days.len(), 10);
    assert_eq!(report.days[3].events, 2);
    assert_eq!(report.days[3].taxi_trips, 3);
    assert_eq!(report.event_day_avg_trips, Some(2.0));
    assert_eq!(report.other_day_avg_trips, Some(5.0 / 8.0));
    assert!((report.event_day_lift.unwrap() - 2.2).abs() < 1e-9);
    assert!(report.regression.unwrap().slope > 0.0);
}

#[test]
fn test_price_trend_pipeline() {
    let trend = price_trend(&fixture(), date(2023, 7, 1), date(2023, 8, 31), None).unwrap();

    assert_eq!(trend.months.len(), 2);
    let july = &trend.months[0];
    assert_eq!(july.trips, 9);
    assert!((july.avg_total.unwrap() - 257.05 / 8.0).abs() < 1e-9);
    assert_eq!(trend.months[1].avg_total, Some(96.55));
    assert!(trend.change_pct.unwrap() > 100.0);

    let queens = price_trend(&fixture(), date(2023, 7, 1), date(2023, 8, 31), Some("Queens")).unwrap();
    assert_eq!(queens.months[0].avg_total, Some(94.05));
    assert_eq!(queens.months[1].trips, 0);
    assert_eq!(queens.change_pct, None);
}

#[test]
fn test_missing_events_fall_back_to_sample() {
    let events = open_events(Some(Path::new("/nonexistent/events.csv")));
    assert_eq!(events.describe(), "sample events");
    assert!(events.is_event_day(date(2023, 12, 15)));
}

#[test]
fn test_rendered_filter_matches_sql_parameters() {
    let spec = FilterSpec::builder()
        .date_range(date(2023, 7, 1), date(2023, 7, 31))
        .pickup_borough("Hell's Kitchen")
        .time_bucket(TimeBucket::Evening)
        .build()
        .unwrap();

    let query = render_where(&spec.render());
    assert!(!query.sql.contains('\''));
    // two dates, one borough, two hour bounds
    assert_eq!(query.params.len(), 5);
}

#[test]
fn test_invalid_inputs_surface_typed_errors() {
    let err = FilterSpec::builder()
        .distance_range(10.0, 2.0)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRange { field: "distance", .. }));

    assert_eq!(deviation(5.0, 0.0), Err(Error::DivisionByZero));
    assert_eq!(calendar::build(2024, 13), Err(Error::InvalidMonth(13)));
}

#[test]
fn test_missing_data_falls_back_to_sample() {
    let source = open_source(Some(Path::new("/nonexistent/taxi_trips.csv")));
    assert_eq!(source.describe(), "sample data");
    assert!(!source.fetch(&[]).unwrap().is_empty());
}
