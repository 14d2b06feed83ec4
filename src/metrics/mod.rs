//! Metrics module - body-metric series aggregation and projection
//!
//! Pipeline: raw samples -> normalize -> per-day dedupe -> buckets, then
//! rolling average, summary, goal projection and streaks from the buckets.

pub mod buckets;
pub mod normalize;
pub mod projection;
pub mod rolling;
pub mod streak;
pub mod summary;

pub use buckets::{BucketPoint, Period, bucket};
pub use normalize::{NormalizedSample, RawSample, RawTimestamp, dedupe_daily, normalize};
pub use projection::{GoalProjection, GoalState, Goals, Metric, TrendFit, project_goal};
pub use rolling::rolling_avg;
pub use streak::StreakSummary;
pub use summary::{Summary, calc_summary};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::config::FormatConfig;

/// Everything a chart screen needs for one period/metric selection
#[derive(Debug, Clone, Serialize)]
pub struct Overlay {
    pub period: Period,
    pub metric: Metric,
    pub today: NaiveDate,
    pub buckets: Vec<BucketPoint>,
    /// Trailing average aligned with `buckets`, day period only
    pub rolling: Option<Vec<Option<f64>>>,
    pub summary: Summary,
    pub goal: GoalProjection,
    pub streak: StreakSummary,
}

/// Normalized sample history
pub struct BodyView {
    samples: Vec<NormalizedSample>,
    cfg: FormatConfig,
    rolling_window: usize,
}

impl BodyView {
    pub fn new(raw: &[RawSample], cfg: FormatConfig) -> Self {
        let samples = normalize(raw, &cfg);
        Self {
            samples,
            cfg,
            rolling_window: rolling::DEFAULT_WINDOW,
        }
    }

    pub fn with_rolling_window(mut self, window: usize) -> Self {
        self.rolling_window = window;
        self
    }

    pub fn samples(&self) -> &[NormalizedSample] {
        &self.samples
    }

    /// Calendar day of `now` in the configured zone
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.cfg.tz).date_naive()
    }

    /// Derive the full overlay for one selection at instant `now`
    pub fn overlay(&self, period: Period, metric: Metric, goals: &Goals, now: DateTime<Utc>) -> Overlay {
        let today = self.today(now);
        let days = bucket(&self.samples, Period::Day, &self.cfg);

        let buckets = match period {
            Period::Day => days.clone(),
            _ => bucket(&self.samples, period, &self.cfg),
        };

        let rolling = (period == Period::Day).then(|| {
            let series: Vec<Option<f64>> = days.iter().map(|b| metric.of_bucket(b)).collect();
            rolling_avg(&series, self.rolling_window)
        });

        let goal = project_goal(
            metric,
            goals.for_metric(metric),
            &days,
            &self.samples,
            today,
            &self.cfg,
        );

        let streak = StreakSummary::compute(days.iter().map(|b| b.date_for_sort), today);

        Overlay {
            period,
            metric,
            today,
            summary: calc_summary(&buckets),
            buckets,
            rolling,
            goal,
            streak,
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
}

impl Overlay {
    /// Format overlay as a plain-text report
    pub fn format(&self) -> String {
        let unit = self.metric.unit();
        let mut lines = vec![format!(
            "--- {} by {:?} ({} buckets) ---",
            self.metric.name(),
            self.period,
            self.buckets.len()
        )];

        for (i, b) in self.buckets.iter().enumerate() {
            let value = fmt_opt(self.metric.of_bucket(b));
            let trend = self
                .rolling
                .as_ref()
                .and_then(|r| r.get(i).copied().flatten())
                .map(|v| format!("  avg {:.1}", v))
                .unwrap_or_default();
            lines.push(format!("{:>10} | {:>6} {} | n={}{}", b.label, value, unit, b.count, trend));
        }

        let s = &self.summary;
        let (avg, min, max) = match self.metric {
            Metric::Weight => (s.weight_avg, s.weight_min, s.weight_max),
            Metric::BodyFat => (s.body_fat_avg, s.body_fat_min, s.body_fat_max),
        };
        lines.push(format!(
            "Average: {}  Min: {}  Max: {}",
            fmt_opt(avg),
            fmt_opt(min),
            fmt_opt(max)
        ));

        lines.push(format!("Goal: {} ({})", self.goal.main, self.goal.sub));
        if let Some(fit) = self.goal.fit.filter(|f| f.is_defined()) {
            let trend_str = if fit.slope >= 0.0 {
                format!("+{:.2}", fit.slope)
            } else {
                format!("{:.2}", fit.slope)
            };
            lines.push(format!("Trend: {} {}/day over {} days", trend_str, unit, fit.points));
        }

        lines.push(format!(
            "Streak: {} days (longest {}), {} days logged this month",
            self.streak.streak_days, self.streak.longest_streak, self.streak.month_count
        ));

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 6, 18, 0, 0).unwrap()
    }

    /// Six consecutive mornings, losing 0.2 kg a day, with one duplicate day
    fn history() -> Vec<RawSample> {
        let mut raw: Vec<RawSample> = (0..6)
            .map(|i| {
                let ts = format!("2024-01-0{}T07:30:00Z", i + 1);
                RawSample::new(ts.as_str(), Some(80.0 - 0.2 * i as f64), Some(22.0))
            })
            .collect();
        raw.push(RawSample::new("2024-01-03T06:00:00Z", Some(95.0), None));
        raw
    }

    fn goals() -> Goals {
        Goals {
            weight_goal: Some(75.0),
            body_fat_goal: None,
        }
    }

    #[test]
    fn test_day_overlay() {
        let view = BodyView::new(&history(), FormatConfig::default());
        let overlay = view.overlay(Period::Day, Metric::Weight, &goals(), now());

        assert_eq!(overlay.today, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        assert_eq!(overlay.buckets.len(), 6);
        // Earlier same-day reading is superseded
        assert_eq!(overlay.buckets[2].weight_avg, Some(79.6));

        let rolling = overlay.rolling.as_ref().unwrap();
        assert_eq!(rolling.len(), overlay.buckets.len());
        assert_eq!(rolling[1], Some(79.9));

        assert_eq!(overlay.summary.weight_min, Some(79.0));
        assert_eq!(overlay.summary.weight_max, Some(80.0));
        assert!(matches!(overlay.goal.state, GoalState::Eta { .. }));
        assert_eq!(overlay.streak.streak_days, 6);
        assert_eq!(overlay.streak.month_count, 6);
    }

    #[test]
    fn test_week_overlay_has_no_rolling() {
        let view = BodyView::new(&history(), FormatConfig::default());
        let overlay = view.overlay(Period::Week, Metric::Weight, &goals(), now());

        assert!(overlay.rolling.is_none());
        assert_eq!(overlay.buckets.len(), 1);
        assert_eq!(overlay.buckets[0].count, 6);
        // Goal and streak always come from the daily series
        assert!(matches!(overlay.goal.state, GoalState::Eta { .. }));
        assert_eq!(overlay.streak.longest_streak, 6);
    }

    #[test]
    fn test_metric_without_goal() {
        let view = BodyView::new(&history(), FormatConfig::default());
        let overlay = view.overlay(Period::Day, Metric::BodyFat, &goals(), now());
        assert_eq!(overlay.goal.state, GoalState::NoGoal);
        assert_eq!(overlay.summary.body_fat_avg, Some(22.0));
    }

    #[test]
    fn test_empty_history_degrades() {
        let view = BodyView::new(&[], FormatConfig::default());
        for period in [Period::Day, Period::Week, Period::Month] {
            let overlay = view.overlay(period, Metric::Weight, &goals(), now());
            assert!(overlay.buckets.is_empty());
            assert_eq!(overlay.summary, Summary::default());
            assert_eq!(overlay.goal.state, GoalState::Insufficient { points: 0 });
            assert_eq!(overlay.streak, StreakSummary::default());
        }
    }

    #[test]
    fn test_today_uses_zone() {
        let cfg = FormatConfig::with_offset_hours(9).unwrap();
        let view = BodyView::new(&[], cfg);
        // 18:00Z is already the next day at +09:00
        assert_eq!(view.today(now()), NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
    }

    #[test]
    fn test_format_report() {
        let view = BodyView::new(&history(), FormatConfig::default());
        let text = view.overlay(Period::Day, Metric::Weight, &goals(), now()).format();

        assert!(text.contains("weight by Day"), "report: {}", text);
        assert!(text.contains("01/06"), "report: {}", text);
        assert!(text.contains("Goal: 2024-01-26"), "report: {}", text);
        assert!(text.contains("Trend: -0.20 kg/day"), "report: {}", text);
        assert!(text.contains("Streak: 6 days"), "report: {}", text);
    }

    #[test]
    fn test_overlay_serializes() {
        let view = BodyView::new(&history(), FormatConfig::default());
        let overlay = view.overlay(Period::Month, Metric::Weight, &goals(), now());
        let json = serde_json::to_value(&overlay).unwrap();

        assert_eq!(json["period"], "month");
        assert_eq!(json["metric"], "weight");
        assert_eq!(json["goal"]["state"], "eta");
        assert_eq!(json["buckets"][0]["key"], "2024-01");
        assert!(json["rolling"].is_null());
    }
}
