//! Logging streaks over the set of days with a sample

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    /// Consecutive logged days ending today
    pub streak_days: u32,
    /// Longest run of consecutive logged days
    pub longest_streak: u32,
    /// Logged days in the current month
    pub month_count: u32,
}

impl StreakSummary {
    pub fn compute<I>(dates: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let days: BTreeSet<NaiveDate> = dates.into_iter().collect();

        Self {
            streak_days: current_streak(&days, today),
            longest_streak: longest_streak(&days),
            month_count: days
                .iter()
                .filter(|d| d.year() == today.year() && d.month() == today.month())
                .count() as u32,
        }
    }
}

/// Walk backward from `today` (inclusive) until the first missing day
fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut count = 0;
    let mut day = today;
    while days.contains(&day) {
        count += 1;
        match day.checked_sub_signed(Duration::days(1)) {
            Some(prev) => day = prev,
            None => break,
        }
    }
    count
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;

    for &day in days {
        run = match prev {
            Some(p) if (day - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }

    longest
}
