//! Day / ISO-week / month bucketing of daily samples

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use clap::ValueEnum;
use serde::Serialize;

use super::normalize::{NormalizedSample, dedupe_daily};
use crate::config::{FormatConfig, format_date};

/// Aggregation period for a chart series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
}

/// One aggregated point of a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketPoint {
    pub key: String,
    pub label: String,
    pub weight_avg: Option<f64>,
    pub body_fat_avg: Option<f64>,
    /// Number of daily samples in the bucket
    pub count: usize,
    pub date_for_sort: NaiveDate,
}

/// Round half away from zero to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Rounded mean of the given values, `None` when there are none
pub(crate) fn mean1(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| round1(sum / n as f64))
}

/// Bucket samples for `period`
pub fn bucket(samples: &[NormalizedSample], period: Period, cfg: &FormatConfig) -> Vec<BucketPoint> {
    match period {
        Period::Day => bucket_by_day(samples, cfg),
        Period::Week => bucket_by_week(samples, cfg),
        Period::Month => bucket_by_month(samples, cfg),
    }
}

/// One bucket per calendar day, holding that day's latest sample
pub fn bucket_by_day(samples: &[NormalizedSample], cfg: &FormatConfig) -> Vec<BucketPoint> {
    dedupe_daily(samples)
        .into_iter()
        .map(|s| BucketPoint {
            key: s.date.format("%Y-%m-%d").to_string(),
            label: format_date(s.date, &cfg.day_label),
            weight_avg: s.weight.map(round1),
            body_fat_avg: s.body_fat.map(round1),
            count: 1,
            date_for_sort: s.date,
        })
        .collect()
}

/// One bucket per ISO week, keyed by ISO week-year and week number
pub fn bucket_by_week(samples: &[NormalizedSample], cfg: &FormatConfig) -> Vec<BucketPoint> {
    group(samples, |date| {
        let iso = date.iso_week();
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        (
            format!("{}-W{:02}", iso.year(), iso.week()),
            monday,
            format_date(monday, &cfg.week_label),
        )
    })
}

/// One bucket per calendar month
pub fn bucket_by_month(samples: &[NormalizedSample], cfg: &FormatConfig) -> Vec<BucketPoint> {
    group(samples, |date| {
        let first = date.with_day(1).unwrap_or(date);
        (
            format!("{:04}-{:02}", date.year(), date.month()),
            first,
            format_date(first, &cfg.month_label),
        )
    })
}

#[derive(Default)]
struct Accumulator {
    label: String,
    date_for_sort: Option<NaiveDate>,
    weights: Vec<f64>,
    body_fats: Vec<f64>,
    count: usize,
}

/// Group deduplicated daily samples by the key `keyer` assigns.
///
/// `keyer` returns (key, sort date, label); the first member seen fixes the
/// sort date and label of its group.
fn group<F>(samples: &[NormalizedSample], keyer: F) -> Vec<BucketPoint>
where
    F: Fn(NaiveDate) -> (String, NaiveDate, String),
{
    let mut groups: HashMap<String, Accumulator> = HashMap::new();

    for s in dedupe_daily(samples) {
        let (key, sort_date, label) = keyer(s.date);
        let acc = groups.entry(key).or_default();
        if acc.date_for_sort.is_none() {
            acc.date_for_sort = Some(sort_date);
            acc.label = label;
        }
        acc.weights.extend(s.weight);
        acc.body_fats.extend(s.body_fat);
        acc.count += 1;
    }

    let mut points: Vec<BucketPoint> = groups
        .into_iter()
        .filter_map(|(key, acc)| {
            Some(BucketPoint {
                key,
                label: acc.label,
                weight_avg: mean1(acc.weights),
                body_fat_avg: mean1(acc.body_fats),
                count: acc.count,
                date_for_sort: acc.date_for_sort?,
            })
        })
        .collect();

    points.sort_by(|a, b| a.date_for_sort.cmp(&b.date_for_sort).then_with(|| a.key.cmp(&b.key)));
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::normalize::{normalize, RawSample};

    fn cfg() -> FormatConfig {
        FormatConfig::default()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(day: &str, weight: Option<f64>, body_fat: Option<f64>) -> RawSample {
        RawSample::new(format!("{day}T08:00:00Z").as_str(), weight, body_fat)
    }

    fn samples(raw: &[RawSample]) -> Vec<NormalizedSample> {
        normalize(raw, &cfg())
    }

    #[test]
    fn test_round1_half_away_from_zero() {
        assert_eq!(round1(80.25), 80.3);
        assert_eq!(round1(80.24), 80.2);
        assert_eq!(round1(-0.25), -0.3);
        assert_eq!(round1(79.0), 79.0);
    }

    #[test]
    fn test_day_buckets_keep_latest_same_day_sample() {
        let raw = vec![
            RawSample::new("2024-03-10T07:00:00Z", Some(80.0), Some(20.0)),
            RawSample::new("2024-03-10T21:00:00Z", Some(80.84), None),
            RawSample::new("2024-03-10T12:00:00Z", Some(79.0), Some(19.0)),
        ];
        let buckets = bucket_by_day(&samples(&raw), &cfg());

        assert_eq!(buckets.len(), 1);
        let b = &buckets[0];
        assert_eq!(b.key, "2024-03-10");
        assert_eq!(b.label, "03/10");
        assert_eq!(b.weight_avg, Some(80.8));
        assert_eq!(b.body_fat_avg, None);
        assert_eq!(b.count, 1);
        assert_eq!(b.date_for_sort, date(2024, 3, 10));
    }

    #[test]
    fn test_day_buckets_sorted() {
        let raw = vec![
            sample("2024-03-12", Some(80.0), None),
            sample("2024-03-10", Some(81.0), None),
            sample("2024-03-11", Some(80.5), None),
        ];
        let keys: Vec<_> = bucket_by_day(&samples(&raw), &cfg())
            .into_iter()
            .map(|b| b.key)
            .collect();
        assert_eq!(keys, vec!["2024-03-10", "2024-03-11", "2024-03-12"]);
    }

    #[test]
    fn test_week_buckets_average_non_null() {
        // 2024-01-01 is a Monday; 01-08 starts the next ISO week
        let raw = vec![
            sample("2024-01-01", Some(80.0), None),
            sample("2024-01-03", Some(81.0), Some(20.0)),
            sample("2024-01-07", None, Some(21.0)),
            sample("2024-01-08", Some(79.0), None),
        ];
        let buckets = bucket_by_week(&samples(&raw), &cfg());

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, "2024-W01");
        assert_eq!(buckets[0].weight_avg, Some(80.5));
        assert_eq!(buckets[0].body_fat_avg, Some(20.5));
        assert_eq!(buckets[0].count, 3);
        assert_eq!(buckets[0].date_for_sort, date(2024, 1, 1));
        assert_eq!(buckets[1].key, "2024-W02");
        assert_eq!(buckets[1].body_fat_avg, None);
        assert_eq!(buckets[1].date_for_sort, date(2024, 1, 8));
    }

    #[test]
    fn test_week_bucket_uses_iso_week_year() {
        // 2024-12-30 belongs to ISO week 1 of 2025
        let raw = vec![
            sample("2024-12-30", Some(80.0), None),
            sample("2025-01-02", Some(80.2), None),
        ];
        let buckets = bucket_by_week(&samples(&raw), &cfg());

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].key, "2025-W01");
        assert_eq!(buckets[0].label, "2025-W01");
        assert_eq!(buckets[0].date_for_sort, date(2024, 12, 30));
        assert_eq!(buckets[0].weight_avg, Some(80.1));
    }

    #[test]
    fn test_month_buckets() {
        let raw = vec![
            sample("2024-02-28", Some(80.0), None),
            sample("2024-01-15", Some(82.0), None),
            sample("2024-01-20", Some(81.25), None),
            sample("2024-02-03", None, None),
        ];
        let buckets = bucket_by_month(&samples(&raw), &cfg());

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, "2024-01");
        assert_eq!(buckets[0].date_for_sort, date(2024, 1, 1));
        assert_eq!(buckets[0].weight_avg, Some(81.6));
        assert_eq!(buckets[1].key, "2024-02");
        assert_eq!(buckets[1].weight_avg, Some(80.0));
        assert_eq!(buckets[1].count, 2);
    }

    #[test]
    fn test_month_bucket_dedupes_days_first() {
        let raw = vec![
            RawSample::new("2024-05-02T07:00:00Z", Some(90.0), None),
            RawSample::new("2024-05-02T20:00:00Z", Some(80.0), None),
            sample("2024-05-03", Some(81.0), None),
        ];
        let buckets = bucket_by_month(&samples(&raw), &cfg());
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].weight_avg, Some(80.5));
    }

    #[test]
    fn test_bucket_dispatch_and_empty() {
        for period in [Period::Day, Period::Week, Period::Month] {
            assert!(bucket(&[], period, &cfg()).is_empty());
        }
        let raw = vec![sample("2024-01-01", Some(80.0), None)];
        assert_eq!(bucket(&samples(&raw), Period::Month, &cfg())[0].key, "2024-01");
    }
}
