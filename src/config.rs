use std::env;
use std::path::PathBuf;

use chrono::NaiveTime;
use dotenv::dotenv;
use tracing::{info, warn};

pub mod constant {
    pub const TRUCK_CAPACITY: usize = 16;
    pub const TRUCK_SPEED_MPH: f64 = 18.0;
    pub const DAY_START: (u32, u32) = (8, 0);
    pub const DISPATCH_LOOKAHEAD_MINUTES: i64 = 75;
    pub const TICK_MINUTES: i64 = 1;
    pub const MILEAGE_THRESHOLD: f64 = 140.0;
    pub const INITIAL_BUCKETS: usize = 8;
    pub const MAX_LOAD_FACTOR: f64 = 0.5;
    pub const HUB_NAME: &str = "Western Governors University";
    pub const REPORT_CSV: &str = "package_report.csv";
    pub const SUMMARY_JSON: &str = "day_summary.json";
}

/// Runtime settings resolved from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding `distances.csv`, `packages.csv`, `trucks.csv` and
    /// `corrections.csv`. `None` selects the embedded reference dataset.
    pub data_dir: Option<PathBuf>,
    pub day_start: NaiveTime,
    /// Point in time for the status snapshot printed after the run.
    pub report_at: Option<NaiveTime>,
    pub report_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let (h, m) = constant::DAY_START;
        Self {
            data_dir: None,
            day_start: NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN),
            report_at: None,
            report_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        dotenv().ok();
        let mut settings = Settings::default();

        match env::var("HUB_DATA_DIR") {
            Ok(dir) => {
                info!("Reading dataset from {dir}");
                settings.data_dir = Some(PathBuf::from(dir));
            }
            Err(_) => info!("HUB_DATA_DIR not set, using embedded reference dataset"),
        }

        if let Ok(raw) = env::var("HUB_DAY_START") {
            match parse_clock(&raw) {
                Some(t) => settings.day_start = t,
                None => warn!("HUB_DAY_START '{raw}' is not a time, keeping {}", settings.day_start),
            }
        }

        if let Ok(raw) = env::var("HUB_REPORT_AT") {
            settings.report_at = parse_clock(&raw);
            if settings.report_at.is_none() {
                warn!("HUB_REPORT_AT '{raw}' is not a time, skipping snapshot");
            }
        }

        if let Ok(dir) = env::var("HUB_REPORT_DIR") {
            settings.report_dir = PathBuf::from(dir);
        } else {
            warn!("HUB_REPORT_DIR not set, writing reports to the working directory");
        }

        settings
    }
}

/// Accepts `HH:MM` (24h) or `H:MM AM/PM`.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&raw.to_uppercase(), "%I:%M %p"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_clock_formats() {
        let t = NaiveTime::from_hms_opt(10, 20, 0).unwrap();
        assert_eq!(parse_clock("10:20"), Some(t));
        assert_eq!(parse_clock("10:20 am"), Some(t));
        assert_eq!(parse_clock(" 1:05 PM "), NaiveTime::from_hms_opt(13, 5, 0));
        assert_eq!(parse_clock("noon"), None);
    }

    #[test]
    fn default_day_starts_at_eight() {
        assert_eq!(
            Settings::default().day_start,
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
    }
}
