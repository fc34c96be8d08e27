//! Output formatting and export for reports.
//!
//! Supports pretty-printing, JSON serialization, CSV export of trips and a
//! text rendering of calendar grids.

use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::calendar::{WEEKDAY_HEADER, Week};
use crate::trip::TripRecord;

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    #[default]
    Pretty,
    Json,
}

/// Writes a report in Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(out: &mut impl Write, report: &T) -> Result<()> {
    writeln!(out, "{report:#?}")?;
    Ok(())
}

/// Writes a report as pretty-printed JSON.
pub fn print_json<T: Serialize>(out: &mut impl Write, report: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

pub fn print_report<T: Debug + Serialize>(out: &mut impl Write, format: Format, report: &T) -> Result<()> {
    debug!(?format, "Writing report");
    match format {
        Format::Pretty => print_pretty(out, report),
        Format::Json => print_json(out, report),
    }
}

/// Writes `trips` to a CSV file at `path`, replacing any existing file.
pub fn write_records(path: &Path, trips: &[TripRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    // serialize() only emits the header alongside the first row
    if trips.is_empty() {
        writer.write_record(TripRecord::COLUMNS)?;
    }
    for trip in trips {
        writer.serialize(trip)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = trips.len(), "Exported trips");
    Ok(())
}

/// Renders a Sunday-first grid. Padding cells are blank and the selected day
/// is bracketed.
pub fn format_calendar(title: &str, weeks: &[Week]) -> String {
    let mut out = format!("{title:^28}\n");
    for day in WEEKDAY_HEADER {
        out.push_str(&format!("{day:>4}"));
    }
    out.push('\n');

    for week in weeks {
        for cell in week {
            let text = match (cell.day_number, cell.is_selected) {
                (Some(n), true) => format!("[{n}]"),
                (Some(n), false) => n.to_string(),
                (None, _) => String::new(),
            };
            out.push_str(&format!("{text:>4}"));
        }
        out.push('\n');
    }
    out
}
