//! Raw sample normalization and per-day deduplication

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FormatConfig;

/// Numeric timestamps below this are taken as seconds, the rest as milliseconds.
///
/// Known limitation: a millisecond value from before 2001-09-09 is
/// misread as seconds. Kept for compatibility with stored data.
pub const SECONDS_THRESHOLD: f64 = 1e12;

/// Timestamp as it comes from storage: epoch number (unit ambiguous) or text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Number(f64),
    Text(String),
}

impl From<i64> for RawTimestamp {
    fn from(value: i64) -> Self {
        RawTimestamp::Number(value as f64)
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

/// Body measurement record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSample {
    #[serde(default)]
    pub id: Option<i64>,
    pub ts: RawTimestamp,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub body_fat: Option<f64>,
    #[serde(default)]
    pub muscle: Option<f64>,
    #[serde(default)]
    pub waist: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RawSample {
    pub fn new(ts: impl Into<RawTimestamp>, weight: Option<f64>, body_fat: Option<f64>) -> Self {
        Self {
            id: None,
            ts: ts.into(),
            weight,
            body_fat,
            muscle: None,
            waist: None,
            notes: None,
        }
    }
}

/// Sample with a canonical millisecond timestamp and its calendar day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSample {
    pub ts: i64,
    pub date: NaiveDate,
    pub weight: Option<f64>,
    pub body_fat: Option<f64>,
}

/// Apply the seconds/milliseconds heuristic to an epoch number
pub fn epoch_to_millis(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value < SECONDS_THRESHOLD {
        value * 1000.0
    } else {
        value
    };
    let millis = millis.round();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    Some(millis as i64)
}

/// Resolve a stored timestamp to epoch milliseconds.
///
/// Text without an explicit offset is read as local time in `tz`.
pub fn resolve_millis(ts: &RawTimestamp, tz: &FixedOffset) -> Option<i64> {
    match ts {
        RawTimestamp::Number(n) => epoch_to_millis(*n),
        RawTimestamp::Text(s) => parse_text_millis(s.trim(), tz),
    }
}

fn parse_text_millis(s: &str, tz: &FixedOffset) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    let naive = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
}

/// Calendar day of an epoch-millisecond instant in `tz`
pub fn local_date(millis: i64, tz: &FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(tz).date_naive())
}

/// Convert raw records to canonical samples.
///
/// Records whose timestamp cannot be resolved are skipped.
pub fn normalize(raw: &[RawSample], cfg: &FormatConfig) -> Vec<NormalizedSample> {
    raw.iter()
        .filter_map(|r| {
            let Some(ts) = resolve_millis(&r.ts, &cfg.tz) else {
                debug!(id = ?r.id, ts = ?r.ts, "skipping sample with unreadable timestamp");
                return None;
            };
            let Some(date) = local_date(ts, &cfg.tz) else {
                debug!(id = ?r.id, ts, "skipping sample outside calendar range");
                return None;
            };
            Some(NormalizedSample {
                ts,
                date,
                weight: r.weight,
                body_fat: r.body_fat,
            })
        })
        .collect()
}

/// Keep only the latest sample (by timestamp) for each calendar day.
///
/// Output is ascending by date. When two samples share a timestamp exactly,
/// the one later in the input wins.
pub fn dedupe_daily(samples: &[NormalizedSample]) -> Vec<NormalizedSample> {
    let mut sorted: Vec<&NormalizedSample> = samples.iter().collect();
    sorted.sort_by_key(|s| s.ts);

    let mut by_day: BTreeMap<NaiveDate, &NormalizedSample> = BTreeMap::new();
    for s in sorted {
        by_day.insert(s.date, s);
    }

    by_day.into_values().cloned().collect()
}
