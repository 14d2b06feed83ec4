//! Configuration - display formats and runtime settings

use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Offset, Utc};

use crate::metrics::rolling::DEFAULT_WINDOW;

const DEFAULT_DB_PATH: &str = "bodytrend.db";
const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Calendar and label formatting used by the metrics pipeline.
///
/// Every function that derives a calendar day or a display label takes this
/// explicitly instead of reading the process locale.
#[derive(Debug, Clone)]
pub struct FormatConfig {
    /// Zone in which timestamps are mapped to calendar days
    pub tz: FixedOffset,
    /// chrono format for day bucket labels
    pub day_label: String,
    /// chrono format for week bucket labels, applied to the ISO Monday
    pub week_label: String,
    /// chrono format for month bucket labels, applied to the 1st
    pub month_label: String,
    /// chrono format for the projected goal date
    pub eta_date: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            tz: Utc.fix(),
            day_label: "%m/%d".to_string(),
            week_label: "%G-W%V".to_string(),
            month_label: "%Y-%m".to_string(),
            eta_date: "%Y-%m-%d".to_string(),
        }
    }
}

impl FormatConfig {
    /// Default formats in a fixed UTC offset (hours, may be negative)
    pub fn with_offset_hours(hours: i32) -> Option<Self> {
        Some(Self {
            tz: FixedOffset::east_opt(hours.checked_mul(3600)?)?,
            ..Self::default()
        })
    }
}

/// Render `date` with a chrono format string, falling back to ISO on a bad format
pub fn format_date(date: NaiveDate, fmt: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(fmt)).is_err() {
        return date.format("%Y-%m-%d").to_string();
    }
    out
}

/// Runtime settings for the CLI
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: String,
    pub tz_offset_hours: i32,
    /// How many recent samples are loaded for a report
    pub history_limit: usize,
    pub rolling_window: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            tz_offset_hours: 0,
            history_limit: DEFAULT_HISTORY_LIMIT,
            rolling_window: DEFAULT_WINDOW,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Reads settings through `get` so tests never touch the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = get("BODYTREND_DB").unwrap_or(defaults.db_path);

        let tz_offset_hours = match get("BODYTREND_TZ_OFFSET") {
            Some(v) => v
                .trim()
                .parse::<i32>()
                .with_context(|| format!("BODYTREND_TZ_OFFSET is not an integer: {v}"))?,
            None => defaults.tz_offset_hours,
        };
        if !(-23..=23).contains(&tz_offset_hours) {
            anyhow::bail!("BODYTREND_TZ_OFFSET out of range: {tz_offset_hours}");
        }

        let history_limit = match get("BODYTREND_HISTORY_LIMIT") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("BODYTREND_HISTORY_LIMIT is not a count: {v}"))?,
            None => defaults.history_limit,
        };

        let rolling_window = match get("BODYTREND_ROLLING_WINDOW") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("BODYTREND_ROLLING_WINDOW is not a count: {v}"))?,
            None => defaults.rolling_window,
        };

        Ok(Self {
            db_path,
            tz_offset_hours,
            history_limit,
            rolling_window,
        })
    }

    pub fn format_config(&self) -> Result<FormatConfig> {
        FormatConfig::with_offset_hours(self.tz_offset_hours)
            .with_context(|| format!("invalid UTC offset: {}h", self.tz_offset_hours))
    }
}
