//! Month grids for the events calendar.
//!
//! Weeks start on Sunday. Padding cells before the 1st and after the last day
//! carry no day number and are never current-month or selected.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CalendarCell {
    pub day_number: Option<u32>,
    pub in_current_month: bool,
    pub is_selected: bool,
}

impl CalendarCell {
    const PADDING: CalendarCell = CalendarCell {
        day_number: None,
        in_current_month: false,
        is_selected: false,
    };
}

pub type Week = [CalendarCell; 7];

pub const WEEKDAY_HEADER: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Gregorian leap year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => return Err(Error::InvalidMonth(month)),
    };
    Ok(days)
}

pub fn month_name(month: u32) -> Result<&'static str> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .ok_or(Error::InvalidMonth(month))
}

/// Parses a month given as `1`-`12`, a full English name or its three-letter
/// abbreviation.
pub fn parse_month(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return month_name(n).map(|_| n);
    }
    let wanted = raw.to_ascii_lowercase();
    MONTH_NAMES
        .iter()
        .position(|name| {
            let name = name.to_ascii_lowercase();
            name == wanted || (wanted.len() == 3 && name.starts_with(&wanted))
        })
        .map(|i| i as u32 + 1)
        .ok_or_else(|| Error::InvalidValue {
            field: "month",
            reason: format!("unrecognised month {raw:?}"),
        })
}

/// Builds the Sunday-first grid for `year`/`month` with nothing selected.
pub fn build(year: i32, month: u32) -> Result<Vec<Week>> {
    build_with_selection(year, month, None)
}

/// Builds the grid and marks `selected_day`, if it exists in the month.
///
/// # Errors
///
/// [`Error::InvalidMonth`] for a month outside `1..=12`, and
/// [`Error::InvalidValue`] for a year chrono cannot represent.
pub fn build_with_selection(year: i32, month: u32, selected_day: Option<u32>) -> Result<Vec<Week>> {
    let days = days_in_month(year, month)?;
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| Error::InvalidValue {
        field: "year",
        reason: format!("{year} is outside the supported calendar range"),
    })?;
    let leading = first.weekday().num_days_from_sunday() as usize;

    let mut cells = vec![CalendarCell::PADDING; leading];
    cells.extend((1..=days).map(|day| CalendarCell {
        day_number: Some(day),
        in_current_month: true,
        is_selected: selected_day == Some(day),
    }));
    let trailing = (7 - cells.len() % 7) % 7;
    cells.extend(std::iter::repeat_n(CalendarCell::PADDING, trailing));

    Ok(cells
        .chunks_exact(7)
        .map(|chunk| {
            let mut week = [CalendarCell::PADDING; 7];
            week.copy_from_slice(chunk);
            week
        })
        .collect())
}
