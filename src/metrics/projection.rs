//! Goal ETA projection using linear regression (linfa)
//!
//! Fits a least-squares line through recent daily values and classifies the
//! trend against the user's goal. States are checked in a fixed priority
//! order and the first match wins.

use chrono::{Datelike, Days, NaiveDate};
use clap::ValueEnum;
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::buckets::BucketPoint;
use super::normalize::NormalizedSample;
use crate::config::{FormatConfig, format_date};

/// How many of the latest day buckets are considered
pub const RECENT_BUCKETS: usize = 20;

/// How many of those (with a value) enter the fit
pub const FIT_POINTS: usize = 14;

/// Minimum data points required for a projection
const MIN_DATA_POINTS: usize = 3;

/// Distance to the goal that counts as reached
pub const ACHIEVED_TOLERANCE: f64 = 0.2;

/// Slack for decimal values like 75.2 - 75.0 landing just above the tolerance
const TOLERANCE_EPSILON: f64 = 1e-9;

/// Slopes (units/day) below this are treated as no trend
pub const FLAT_SLOPE: f64 = 0.01;

/// Projections are capped at ten years
pub const MAX_ETA_DAYS: f64 = 3650.0;

/// Projected dates are always at least this many days out
const MIN_ETA_DAYS: f64 = 1.0;

/// `num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAY_CE: i64 = 719_163;

/// Tracked body metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    #[default]
    Weight,
    BodyFat,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Weight => "weight",
            Metric::BodyFat => "body fat",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Weight => "kg",
            Metric::BodyFat => "%",
        }
    }

    pub fn of_bucket(&self, bucket: &BucketPoint) -> Option<f64> {
        match self {
            Metric::Weight => bucket.weight_avg,
            Metric::BodyFat => bucket.body_fat_avg,
        }
    }

    pub fn of_sample(&self, sample: &NormalizedSample) -> Option<f64> {
        match self {
            Metric::Weight => sample.weight,
            Metric::BodyFat => sample.body_fat,
        }
    }
}

/// User-set targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goals {
    pub weight_goal: Option<f64>,
    pub body_fat_goal: Option<f64>,
}

impl Goals {
    pub fn for_metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Weight => self.weight_goal,
            Metric::BodyFat => self.body_fat_goal,
        }
    }
}

/// Whole days since 1970-01-01
pub fn days_since_epoch(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAY_CE
}

/// Least-squares line `value = slope * day + intercept` with `day` counted
/// from the Unix epoch. Slope and intercept are NaN when the fit is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendFit {
    /// Units per day
    pub slope: f64,
    pub intercept: f64,
    /// Fit quality, 0-1
    pub r2: f64,
    pub points: usize,
}

impl TrendFit {
    fn undefined(points: usize) -> Self {
        Self {
            slope: f64::NAN,
            intercept: f64::NAN,
            r2: f64::NAN,
            points,
        }
    }

    /// Fit a line through dated values.
    ///
    /// Undefined for fewer than two points or when every point falls on the same day.
    pub fn fit(points: &[(NaiveDate, f64)]) -> Self {
        let n_samples = points.len();
        if n_samples < 2 {
            return Self::undefined(n_samples);
        }

        let xs: Vec<f64> = points
            .iter()
            .map(|(d, _)| days_since_epoch(*d) as f64)
            .collect();
        let mean_x = xs.iter().sum::<f64>() / n_samples as f64;
        let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
        if sxx == 0.0 {
            return Self::undefined(n_samples);
        }

        // Regress on offsets from the first day to keep the system well conditioned
        let x0 = xs[0];
        let offsets: Vec<f64> = xs.iter().map(|x| x - x0).collect();
        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

        let Ok(records) = Array2::from_shape_vec((n_samples, 1), offsets) else {
            return Self::undefined(n_samples);
        };
        let targets = Array1::from_vec(values);
        let dataset = Dataset::new(records, targets);

        let Ok(model) = LinearRegression::default().fit(&dataset) else {
            return Self::undefined(n_samples);
        };

        let slope = model.params()[0];
        let intercept = model.intercept() - slope * x0;

        let predictions = model.predict(&dataset);
        let r2 = predictions.r2(&dataset).unwrap_or(f64::NAN);

        Self {
            slope,
            intercept,
            r2,
            points: n_samples,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.slope.is_finite()
    }
}

/// Direction of a trend moving away from the goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

/// Outcome of the goal projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum GoalState {
    NoGoal,
    Insufficient {
        points: usize,
    },
    Achieved {
        latest: f64,
        goal: f64,
    },
    Flat {
        slope: f64,
    },
    Reverse {
        direction: TrendDirection,
        slope: f64,
        goal: f64,
    },
    Unknown,
    Eta {
        date: NaiveDate,
        /// Uncapped estimate
        days_needed: f64,
        goal: f64,
    },
}

/// Goal state with its display text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProjection {
    #[serde(flatten)]
    pub state: GoalState,
    pub main: String,
    pub sub: String,
    /// Trend over the qualifying points, when there were enough to fit
    pub fit: Option<TrendFit>,
}

impl GoalProjection {
    fn new(state: GoalState, metric: Metric, fit: Option<TrendFit>, cfg: &FormatConfig) -> Self {
        let (main, sub) = describe(&state, metric, cfg);
        Self {
            state,
            main,
            sub,
            fit,
        }
    }
}

fn describe(state: &GoalState, metric: Metric, cfg: &FormatConfig) -> (String, String) {
    let unit = metric.unit();
    match state {
        GoalState::NoGoal => (
            "No goal set".to_string(),
            format!("Set a {} goal to see an ETA", metric.name()),
        ),
        GoalState::Insufficient { points } => (
            "Not enough data".to_string(),
            format!("Log at least {MIN_DATA_POINTS} days ({points} so far)"),
        ),
        GoalState::Achieved { latest, goal } => (
            "Goal reached".to_string(),
            format!("{latest:.1} {unit} vs goal {goal:.1} {unit}"),
        ),
        GoalState::Flat { .. } => (
            "Holding steady".to_string(),
            "Trend is flat, no ETA yet".to_string(),
        ),
        GoalState::Reverse {
            direction, goal, ..
        } => {
            let main = match direction {
                TrendDirection::Up => "Trending up",
                TrendDirection::Down => "Trending down",
            };
            (
                main.to_string(),
                format!("Moving away from goal {goal:.1} {unit}"),
            )
        }
        GoalState::Unknown => (
            "ETA unknown".to_string(),
            "Trend cannot be projected".to_string(),
        ),
        GoalState::Eta {
            date,
            days_needed,
            goal,
        } => (
            format_date(*date, &cfg.eta_date),
            format!(
                "to reach {goal:.1} {unit} (~{} days)",
                eta_days(*days_needed)
            ),
        ),
    }
}

/// Whole days to add to today: capped, rounded to the nearest day, at least one
fn eta_days(days_needed: f64) -> u64 {
    days_needed.min(MAX_ETA_DAYS).round().max(MIN_ETA_DAYS) as u64
}

/// Most recent (by timestamp) sample value for `metric`
pub fn latest_raw_value(samples: &[NormalizedSample], metric: Metric) -> Option<f64> {
    samples
        .iter()
        .filter_map(|s| metric.of_sample(s).map(|v| (s.ts, v)))
        .max_by_key(|(ts, _)| *ts)
        .map(|(_, v)| v)
}

/// Qualifying points: the valued buckets among the last `RECENT_BUCKETS`,
/// trimmed to the last `FIT_POINTS`.
fn recent_points(day_buckets: &[BucketPoint], metric: Metric) -> Vec<(NaiveDate, f64)> {
    let start = day_buckets.len().saturating_sub(RECENT_BUCKETS);
    let valued: Vec<(NaiveDate, f64)> = day_buckets[start..]
        .iter()
        .filter_map(|b| metric.of_bucket(b).map(|v| (b.date_for_sort, v)))
        .collect();
    let skip = valued.len().saturating_sub(FIT_POINTS);
    valued.into_iter().skip(skip).collect()
}

/// Project when `goal` will be reached from the recent daily trend.
///
/// `day_buckets` must be the ascending day-period series. `samples` supplies
/// the fallback latest value. `today` anchors the projected date.
pub fn project_goal(
    metric: Metric,
    goal: Option<f64>,
    day_buckets: &[BucketPoint],
    samples: &[NormalizedSample],
    today: NaiveDate,
    cfg: &FormatConfig,
) -> GoalProjection {
    let Some(goal) = goal else {
        return GoalProjection::new(GoalState::NoGoal, metric, None, cfg);
    };

    let points = recent_points(day_buckets, metric);
    if points.len() < MIN_DATA_POINTS {
        let state = GoalState::Insufficient {
            points: points.len(),
        };
        return GoalProjection::new(state, metric, None, cfg);
    }

    let fit = TrendFit::fit(&points);
    let state = classify(goal, &points, &fit, samples, metric, today);
    GoalProjection::new(state, metric, Some(fit), cfg)
}

fn classify(
    goal: f64,
    points: &[(NaiveDate, f64)],
    fit: &TrendFit,
    samples: &[NormalizedSample],
    metric: Metric,
    today: NaiveDate,
) -> GoalState {
    let latest = points
        .last()
        .map(|(_, v)| *v)
        .or_else(|| latest_raw_value(samples, metric));
    let Some(latest) = latest else {
        return GoalState::Unknown;
    };

    if (latest - goal).abs() <= ACHIEVED_TOLERANCE + TOLERANCE_EPSILON {
        return GoalState::Achieved { latest, goal };
    }

    let slope = fit.slope;
    if !fit.is_defined() || slope.abs() < FLAT_SLOPE {
        return GoalState::Flat { slope };
    }

    if (goal - latest).signum() != slope.signum() {
        let direction = if slope > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        };
        return GoalState::Reverse {
            direction,
            slope,
            goal,
        };
    }

    let days_needed = (goal - latest) / slope;
    if !days_needed.is_finite() || days_needed < 0.0 {
        return GoalState::Unknown;
    }

    match today.checked_add_days(Days::new(eta_days(days_needed))) {
        Some(date) => GoalState::Eta {
            date,
            days_needed,
            goal,
        },
        None => GoalState::Unknown,
    }
}
