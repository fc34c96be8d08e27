//! CLI entry point for the taxi insights tool.
//!
//! Provides the month overview and calendar, event views (events on a day,
//! event/demand correlation, monthly price trend), the three insights modes
//! (best time & place, trip profitability, custom filter & stats) and an
//! `explain` command that shows the parameterized SQL for a filter.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use taxi_insights::{
    TimeBucket,
    calendar::{self, parse_month},
    config::Settings,
    events::{EventCalendar, open_events},
    filter::FilterSpec,
    insights::{self, ProfitRequest},
    output::{Format, format_calendar, print_report, write_records},
    overview::{self, DayEvents, MonthOverview},
    source::{TripSource, open_source},
    sql::render_where,
    trends::{self, CorrelationReport, PriceTrend},
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "taxi_insights")]
#[command(about = "Taxi trip volume, fare and profitability insights", long_about = None)]
struct Cli {
    /// Trip CSV to read; sample data is used when it is missing or unreadable
    #[arg(long, global = true, value_name = "CSV")]
    data: Option<PathBuf>,

    /// Event CSV to read; sample events are used when it is missing or unreadable
    #[arg(long, global = true, value_name = "CSV")]
    events: Option<PathBuf>,

    /// JSON settings file overriding the environment
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Pretty)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily trips, peak day and borough share for one month
    Overview {
        #[arg(long, default_value_t = 2023)]
        year: i32,

        /// Month number or name
        #[arg(long, default_value = "July", value_parser = month_arg)]
        month: u32,
    },
    /// Print the Sunday-first calendar grid for a month
    Calendar {
        #[arg(long, default_value_t = 2023)]
        year: i32,

        /// Month number or name
        #[arg(long, value_parser = month_arg)]
        month: u32,

        /// Day of the month to highlight
        #[arg(long)]
        selected: Option<u32>,
    },
    /// Events held on one day and how taxi demand compared
    Events {
        #[arg(long, default_value_t = 2023)]
        year: i32,

        /// Month number or name
        #[arg(long, value_parser = month_arg)]
        month: u32,

        #[arg(long)]
        day: u32,
    },
    /// Relate the number of events per day to taxi trips
    Correlate {
        #[arg(long, default_value = "2023-06-01")]
        from: NaiveDate,

        #[arg(long, default_value = "2023-12-31")]
        to: NaiveDate,
    },
    /// Monthly average total fare
    Prices {
        #[arg(long, default_value = "2023-06-01")]
        from: NaiveDate,

        #[arg(long, default_value = "2023-12-31")]
        to: NaiveDate,

        /// Restrict to one pickup borough
        #[arg(long)]
        borough: Option<String>,
    },
    /// Find the most profitable pickup zones for a weekday and time of day
    Recommend {
        #[arg(long, value_parser = weekday_arg)]
        day: Weekday,

        /// Time range label, e.g. "6am-9am"
        #[arg(long, value_parser = bucket_arg)]
        time: TimeBucket,

        /// Restrict to one pickup borough
        #[arg(long)]
        borough: Option<String>,
    },
    /// Estimate the earnings of a trip from similar historical trips
    Profit {
        /// Trip distance in miles
        #[arg(long, default_value_t = 5.0)]
        distance: f64,

        /// Time range label, e.g. "6am-9am"
        #[arg(long, value_parser = bucket_arg)]
        time: TimeBucket,

        /// Pickup borough (defaults to the first configured borough)
        #[arg(long)]
        pickup: Option<String>,

        /// Dropoff borough (defaults to the second configured borough)
        #[arg(long)]
        dropoff: Option<String>,
    },
    /// Summary statistics and breakdowns for a custom filter
    Explore {
        #[command(flatten)]
        filter: FilterArgs,

        /// Write the matching trips to this CSV file
        #[arg(long, value_name = "CSV")]
        export: Option<PathBuf>,
    },
    /// Show the parameterized SQL a filter renders to
    Explain {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// First pickup date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last pickup date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long, default_value_t = 0.0)]
    min_miles: f64,

    #[arg(long, default_value_t = 30.0)]
    max_miles: f64,

    /// Pickup borough; repeat for several
    #[arg(long = "pickup")]
    pickup: Vec<String>,

    /// Dropoff borough; repeat for several
    #[arg(long = "dropoff")]
    dropoff: Vec<String>,

    #[arg(long, value_parser = weekday_arg)]
    day: Option<Weekday>,

    /// Time range label, e.g. "6am-9am"
    #[arg(long, value_parser = bucket_arg)]
    time: Option<TimeBucket>,
}

impl FilterArgs {
    fn to_spec(&self) -> Result<FilterSpec> {
        let mut builder = FilterSpec::builder()
            .distance_range(self.min_miles, self.max_miles)
            .pickup_boroughs(self.pickup.iter().cloned())
            .dropoff_boroughs(self.dropoff.iter().cloned());

        if let Some(from) = self.from {
            builder = builder.since(from);
        }
        if let Some(to) = self.to {
            builder = builder.until(to);
        }
        if let Some(day) = self.day {
            builder = builder.day_of_week(day);
        }
        if let Some(bucket) = self.time {
            builder = builder.time_bucket(bucket);
        }

        Ok(builder.build()?)
    }
}

fn month_arg(raw: &str) -> Result<u32, String> {
    parse_month(raw).map_err(|e| e.to_string())
}

fn weekday_arg(raw: &str) -> Result<Weekday, String> {
    raw.trim()
        .parse::<Weekday>()
        .map_err(|_| format!("unrecognised weekday {raw:?}"))
}

fn bucket_arg(raw: &str) -> Result<TimeBucket, String> {
    raw.parse::<TimeBucket>().map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(path) = &cli.config {
        settings = settings.merge_file(path)?;
    }
    if let Some(data) = &cli.data {
        settings.trips_csv = Some(data.clone());
    }
    if let Some(events) = &cli.events {
        settings.events_csv = Some(events.clone());
    }

    // Logging setup: colored stderr + JSON rolling log file
    let log_dir = settings
        .log_file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = settings
        .log_file_path
        .file_name()
        .unwrap_or(OsStr::new("taxi_insights.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Overview { year, month } => {
            let source = open_source(settings.trips_csv.as_deref());
            let events = open_events(settings.events_csv.as_deref());
            let overview = overview::month_overview(source.as_ref(), &events, year, month)?;
            match cli.format {
                Format::Pretty => print_overview(&mut out, &overview)?,
                Format::Json => print_report(&mut out, cli.format, &overview)?,
            }
        }
        Commands::Calendar {
            year,
            month,
            selected,
        } => {
            let weeks = calendar::build_with_selection(year, month, selected)?;
            match cli.format {
                Format::Pretty => {
                    let title = format!("{} {year}", calendar::month_name(month)?);
                    write!(out, "{}", format_calendar(&title, &weeks))?;
                }
                Format::Json => print_report(&mut out, cli.format, &weeks)?,
            }
        }
        Commands::Events { year, month, day } => {
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or_else(|| anyhow::anyhow!("{year}-{month:02}-{day:02} is not a valid date"))?;
            let source = open_source(settings.trips_csv.as_deref());
            let events = open_events(settings.events_csv.as_deref());
            let report = overview::day_events(source.as_ref(), &events, date)?;
            match cli.format {
                Format::Pretty => print_day_events(&mut out, &report)?,
                Format::Json => print_report(&mut out, cli.format, &report)?,
            }
        }
        Commands::Correlate { from, to } => {
            let source = open_source(settings.trips_csv.as_deref());
            let events = open_events(settings.events_csv.as_deref());
            let report = trends::correlation(source.as_ref(), &events, from, to)?;
            match cli.format {
                Format::Pretty => print_correlation(&mut out, &events, &report)?,
                Format::Json => print_report(&mut out, cli.format, &report)?,
            }
        }
        Commands::Prices { from, to, borough } => {
            let source = open_source(settings.trips_csv.as_deref());
            let trend = trends::price_trend(source.as_ref(), from, to, borough.as_deref())?;
            match cli.format {
                Format::Pretty => print_price_trend(&mut out, &trend)?,
                Format::Json => print_report(&mut out, cli.format, &trend)?,
            }
        }
        Commands::Recommend {
            day,
            time,
            borough,
        } => {
            let source = open_source(settings.trips_csv.as_deref());
            let rec =
                insights::best_time_and_place(source.as_ref(), day, time, borough.as_deref())?;
            if rec.zones.is_empty() {
                warn!("No data found for this selection. Try different criteria.");
            }
            print_report(&mut out, cli.format, &rec)?;
        }
        Commands::Profit {
            distance,
            time,
            pickup,
            dropoff,
        } => {
            let request = ProfitRequest {
                distance_miles: distance,
                time_bucket: time,
                pickup_borough: pickup
                    .or_else(|| settings.boroughs.first().cloned())
                    .unwrap_or_else(|| "Manhattan".to_string()),
                dropoff_borough: dropoff
                    .or_else(|| settings.boroughs.get(1).cloned())
                    .unwrap_or_else(|| "Brooklyn".to_string()),
            };
            let source = open_source(settings.trips_csv.as_deref());
            match insights::trip_profitability(source.as_ref(), &request)? {
                Some(report) => print_report(&mut out, cli.format, &report)?,
                None => warn!("Not enough data for this trip profile. Try different parameters."),
            }
        }
        Commands::Explore { filter, export } => {
            let spec = filter.to_spec()?;
            let source = open_source(settings.trips_csv.as_deref());
            run_explore(&mut out, source.as_ref(), &spec, cli.format, export.as_deref())?;
        }
        Commands::Explain { filter } => {
            let spec = filter.to_spec()?;
            let query = render_where(&spec.render());
            match cli.format {
                Format::Pretty => {
                    writeln!(out, "WHERE {}", query.sql)?;
                    for (i, param) in query.params.iter().enumerate() {
                        writeln!(out, "  ${} = {}", i + 1, param)?;
                    }
                }
                Format::Json => print_report(&mut out, cli.format, &query)?,
            }
        }
    }

    Ok(())
}

#[tracing::instrument(skip(out, source, spec), fields(source = %source.describe()))]
fn run_explore(
    out: &mut impl Write,
    source: &dyn TripSource,
    spec: &FilterSpec,
    format: Format,
    export: Option<&Path>,
) -> Result<()> {
    let (report, trips) = insights::explore(source, spec)?;
    if report.summary.is_empty() {
        warn!("No data matches your filter criteria. Please adjust and try again.");
    }
    print_report(out, format, &report)?;

    if let Some(path) = export {
        write_records(path, &trips)?;
    }
    Ok(())
}

fn print_overview(out: &mut impl Write, overview: &MonthOverview) -> Result<()> {
    writeln!(out, "{} {}", overview.month_name, overview.year)?;
    writeln!(out, "  total trips:      {}", overview.total_trips)?;
    writeln!(out, "  avg daily trips:  {:.0}", overview.avg_daily_trips)?;
    match overview.peak_day {
        Some(peak) => writeln!(
            out,
            "  peak day:         {} ({} trips)",
            peak.date.format("%b %d"),
            peak.trips
        )?,
        None => writeln!(out, "  peak day:         -")?,
    }

    writeln!(out, "\nBorough share")?;
    for share in &overview.borough_share {
        writeln!(out, "  {:<15} {:>5.1}%  ({} trips)", share.borough, share.percentage, share.trip_count)?;
    }

    writeln!(out, "\nDaily trips (* event day)")?;
    for day in &overview.days {
        let marker = if day.is_event { "*" } else { " " };
        writeln!(out, "  {}{} {}", day.date.format("%b %d"), marker, day.trips)?;
    }

    let title = format!("{} {}", overview.month_name, overview.year);
    write!(out, "\n{}", format_calendar(&title, &overview.calendar))?;

    info!(month = overview.month, year = overview.year, "Overview printed");
    Ok(())
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("${v:.2}"))
}

fn print_day_events(out: &mut impl Write, report: &DayEvents) -> Result<()> {
    writeln!(out, "{}", report.date.format("%A, %B %d, %Y"))?;
    writeln!(out, "  taxi trips:     {}", report.trips)?;
    match report.demand_change_pct {
        Some(change) => writeln!(out, "  vs. month avg:  {change:+.1}%")?,
        None => writeln!(out, "  vs. month avg:  -")?,
    }

    if report.events.is_empty() {
        writeln!(out, "\nNo events")?;
        return Ok(());
    }
    writeln!(out, "\nEvents")?;
    for event in &report.events {
        writeln!(
            out,
            "  {:<30} {:<22} {}",
            event.title.as_deref().unwrap_or("(untitled)"),
            event.location.as_deref().unwrap_or("-"),
            event.time.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn print_correlation(out: &mut impl Write, events: &EventCalendar, report: &CorrelationReport) -> Result<()> {
    writeln!(out, "Events vs. taxi trips, {} to {}", report.first, report.last)?;
    writeln!(out, "  events from:           {}", events.describe())?;
    match report.regression {
        Some(fit) => {
            writeln!(out, "  correlation (r):       {:.2}", fit.r_value)?;
            writeln!(out, "  trips per extra event: {:.1}", fit.slope)?;
        }
        None => writeln!(out, "  correlation (r):       -")?,
    }
    let avg = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.0}"));
    writeln!(out, "  avg trips, event days: {}", avg(report.event_day_avg_trips))?;
    writeln!(out, "  avg trips, other days: {}", avg(report.other_day_avg_trips))?;
    if let Some(lift) = report.event_day_lift {
        writeln!(out, "  event day lift:        {:+.1}%", lift * 100.0)?;
    }
    Ok(())
}

fn print_price_trend(out: &mut impl Write, trend: &PriceTrend) -> Result<()> {
    let scope = trend.borough.as_deref().unwrap_or("all boroughs");
    writeln!(out, "Average total fare, {scope}")?;
    for month in &trend.months {
        writeln!(
            out,
            "  {:<9} {} {:>8}  ({} trips)",
            month.month_name,
            month.year,
            money(month.avg_total),
            month.trips
        )?;
    }
    writeln!(out, "\n  overall: {}", money(trend.avg_total))?;
    writeln!(out, "  range:   {} - {}", money(trend.min_avg_total), money(trend.max_avg_total))?;
    if let Some(change) = trend.change_pct {
        writeln!(out, "  change:  {change:+.1}%")?;
    }
    Ok(())
}
