//! Trailing moving average over a gappy series

use super::buckets::mean1;

/// Window used for the daily trend line
pub const DEFAULT_WINDOW: usize = 7;

/// Trailing mean of the last `window` entries at each index, skipping gaps.
///
/// The output is aligned index-for-index with `values`. An index whose window
/// holds no values yields `None`. A window of 0 behaves like 1.
pub fn rolling_avg(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            mean1(values[start..=i].iter().flatten().copied())
        })
        .collect()
}
