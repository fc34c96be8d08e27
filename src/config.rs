//! Runtime settings.
//!
//! Values come from the process environment (after `.env` is loaded) and may
//! be overridden by a JSON settings file:
//!
//! ```json
//! {
//!   "trips_csv": "data/taxi_trips.csv",
//!   "events_csv": "data/nyc_events.csv",
//!   "boroughs": ["Manhattan", "Brooklyn", "Queens", "Bronx", "Staten Island"],
//!   "log_file_path": "logs/taxi_insights.log"
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_LOG_FILE: &str = "logs/taxi_insights.log";

pub const DEFAULT_BOROUGHS: [&str; 5] = ["Manhattan", "Brooklyn", "Queens", "Bronx", "Staten Island"];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Trip table export; `None` means run on sample data.
    pub trips_csv: Option<PathBuf>,
    /// Permitted events export; `None` means sample events.
    pub events_csv: Option<PathBuf>,
    /// Boroughs offered when the user does not name one.
    pub boroughs: Vec<String>,
    pub log_file_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trips_csv: None,
            events_csv: None,
            boroughs: DEFAULT_BOROUGHS.iter().map(|b| b.to_string()).collect(),
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// On-disk overrides; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    trips_csv: Option<PathBuf>,
    events_csv: Option<PathBuf>,
    boroughs: Option<Vec<String>>,
    log_file_path: Option<PathBuf>,
}

impl Settings {
    /// Reads `TAXI_TRIPS_CSV`, `TAXI_EVENTS_CSV`, `TAXI_BOROUGHS` and
    /// `LOG_FILE_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Settings::default();

        if let Some(path) = lookup("TAXI_TRIPS_CSV").filter(|p| !p.trim().is_empty()) {
            settings.trips_csv = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("TAXI_EVENTS_CSV").filter(|p| !p.trim().is_empty()) {
            settings.events_csv = Some(PathBuf::from(path));
        }
        if let Some(list) = lookup("TAXI_BOROUGHS") {
            let boroughs = split_list(&list);
            if !boroughs.is_empty() {
                settings.boroughs = boroughs;
            }
        }
        if let Some(path) = lookup("LOG_FILE_PATH").filter(|p| !p.trim().is_empty()) {
            settings.log_file_path = PathBuf::from(path);
        }

        settings
    }

    /// Applies the overrides in the JSON file at `path`.
    pub fn merge_file(mut self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let file: SettingsFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings file {}", path.display()))?;

        if let Some(p) = file.trips_csv {
            self.trips_csv = Some(p);
        }
        if let Some(p) = file.events_csv {
            self.events_csv = Some(p);
        }
        if let Some(b) = file.boroughs.filter(|b| !b.is_empty()) {
            self.boroughs = b;
        }
        if let Some(p) = file.log_file_path {
            self.log_file_path = p;
        }
        Ok(self)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
