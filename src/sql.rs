//! Parameterized SQL rendering for [`Clause`] lists.
//!
//! Every user-supplied value becomes a bound parameter; the generated text
//! only ever contains column names, operators and `$n` placeholders.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::filter::Clause;

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Date(NaiveDate),
    Float(f64),
    Int(i64),
    Text(String),
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Date(d) => write!(f, "{d}"),
            SqlParam::Float(v) => write!(f, "{v}"),
            SqlParam::Int(v) => write!(f, "{v}"),
            SqlParam::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// A WHERE fragment and its positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterizedQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

struct Binder {
    params: Vec<SqlParam>,
}

impl Binder {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }
}

/// Renders `clauses` as a PostgreSQL WHERE fragment over the `taxi_trips`
/// table. An empty list renders `TRUE`.
pub fn render_where(clauses: &[Clause]) -> ParameterizedQuery {
    let mut binder = Binder { params: Vec::new() };

    let parts: Vec<String> = clauses
        .iter()
        .map(|clause| render_clause(clause, &mut binder))
        .collect();

    let sql = if parts.is_empty() {
        "TRUE".to_string()
    } else {
        parts.join(" AND ")
    };

    ParameterizedQuery {
        sql,
        params: binder.params,
    }
}

fn render_clause(clause: &Clause, binder: &mut Binder) -> String {
    match clause {
        Clause::DateBetween { start, end } => {
            let lo = binder.bind(SqlParam::Date(*start));
            let hi = binder.bind(SqlParam::Date(*end));
            format!("pickup_date BETWEEN {lo} AND {hi}")
        }
        Clause::DistanceBetween {
            min_miles,
            max_miles,
        } => {
            let lo = binder.bind(SqlParam::Float(*min_miles));
            let hi = binder.bind(SqlParam::Float(*max_miles));
            format!("trip_distance BETWEEN {lo} AND {hi}")
        }
        Clause::BoroughIn { end, boroughs } => {
            let column = end.borough_column();
            let placeholders: Vec<String> = boroughs
                .iter()
                .map(|b| binder.bind(SqlParam::Text(b.as_str().to_string())))
                .collect();
            format!("{column} IN ({})", placeholders.join(", "))
        }
        Clause::WeekdayEquals { day } => {
            let p = binder.bind(SqlParam::Int(i64::from(day.number_from_monday())));
            format!("EXTRACT(ISODOW FROM pickup_date) = {p}")
        }
        Clause::HourBetween { low, high } => {
            // BETWEEN is inclusive, the clause's upper bound is not
            let lo = binder.bind(SqlParam::Int(i64::from(*low)));
            let hi = binder.bind(SqlParam::Int(i64::from(*high) - 1));
            format!("EXTRACT(HOUR FROM pickup_time::time) BETWEEN {lo} AND {hi}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::TimeBucket;
    use crate::filter::FilterSpec;
    use chrono::Weekday;

    #[test]
    fn test_empty_renders_true() {
        let q = render_where(&[]);
        assert_eq!(q.sql, "TRUE");
        assert!(q.params.is_empty());
    }

    #[test]
    fn test_full_filter() {
        let spec = FilterSpec::builder()
            .date_range(
                NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            )
            .distance_range(0.5, 30.0)
            .pickup_boroughs(["Manhattan", "Brooklyn"])
            .dropoff_borough("Queens")
            .day_of_week(Weekday::Fri)
            .time_bucket(TimeBucket::LateNight)
            .build()
            .unwrap();

        let q = render_where(&spec.render());
        assert_eq!(
            q.sql,
            "pickup_date BETWEEN $1 AND $2 AND trip_distance BETWEEN $3 AND $4 AND \
             pickup_borough IN ($5, $6) AND dropoff_borough IN ($7) AND \
             EXTRACT(ISODOW FROM pickup_date) = $8 AND \
             EXTRACT(HOUR FROM pickup_time::time) BETWEEN $9 AND $10"
        );
        assert_eq!(q.params.len(), 10);
        assert_eq!(q.params[4], SqlParam::Text("Brooklyn".to_string()));
        assert_eq!(q.params[7], SqlParam::Int(5));
        assert_eq!(q.params[8], SqlParam::Int(21));
        assert_eq!(q.params[9], SqlParam::Int(23));
    }

    #[test]
    fn test_quotes_never_reach_sql_text() {
        let spec = FilterSpec::builder()
            .pickup_borough("Hell's Kitchen")
            .build()
            .unwrap();
        let q = render_where(&spec.render());
        assert_eq!(q.sql, "pickup_borough IN ($1)");
        assert!(!q.sql.contains('\''));
        assert_eq!(q.params, vec![SqlParam::Text("Hell's Kitchen".to_string())]);
    }

    #[test]
    fn test_open_ended_date_binds_postgres_date() {
        let spec = FilterSpec::builder()
            .since(NaiveDate::from_ymd_opt(2023, 7, 1).unwrap())
            .build()
            .unwrap();
        let q = render_where(&spec.render());
        assert_eq!(q.sql, "pickup_date BETWEEN $1 AND $2");
        assert_eq!(q.params[1].to_string(), "9999-12-31");
    }
}
