//! Min / max / average over a bucketed series

use serde::Serialize;

use super::buckets::{BucketPoint, mean1};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub weight_avg: Option<f64>,
    pub weight_min: Option<f64>,
    pub weight_max: Option<f64>,
    pub body_fat_avg: Option<f64>,
    pub body_fat_min: Option<f64>,
    pub body_fat_max: Option<f64>,
}

/// Summarize the non-null bucket averages of each metric independently
pub fn calc_summary(buckets: &[BucketPoint]) -> Summary {
    let weights: Vec<f64> = buckets.iter().filter_map(|b| b.weight_avg).collect();
    let body_fats: Vec<f64> = buckets.iter().filter_map(|b| b.body_fat_avg).collect();

    Summary {
        weight_avg: mean1(weights.iter().copied()),
        weight_min: weights.iter().copied().reduce(f64::min),
        weight_max: weights.iter().copied().reduce(f64::max),
        body_fat_avg: mean1(body_fats.iter().copied()),
        body_fat_min: body_fats.iter().copied().reduce(f64::min),
        body_fat_max: body_fats.iter().copied().reduce(f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(day: u32, weight: Option<f64>, body_fat: Option<f64>) -> BucketPoint {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        BucketPoint {
            key: date.to_string(),
            label: date.format("%m/%d").to_string(),
            weight_avg: weight,
            body_fat_avg: body_fat,
            count: 1,
            date_for_sort: date,
        }
    }

    #[test]
    fn test_empty_is_all_none() {
        assert_eq!(calc_summary(&[]), Summary::default());
    }

    #[test]
    fn test_metrics_independent() {
        let buckets = vec![
            point(1, Some(80.0), None),
            point(2, Some(81.5), Some(20.0)),
            point(3, None, Some(22.5)),
            point(4, Some(79.4), None),
        ];
        let s = calc_summary(&buckets);

        assert_eq!(s.weight_avg, Some(80.3));
        assert_eq!(s.weight_min, Some(79.4));
        assert_eq!(s.weight_max, Some(81.5));
        assert_eq!(s.body_fat_avg, Some(21.3));
        assert_eq!(s.body_fat_min, Some(20.0));
        assert_eq!(s.body_fat_max, Some(22.5));
    }

    #[test]
    fn test_all_null_body_fat() {
        let buckets = vec![point(1, Some(80.0), None), point(2, Some(80.0), None)];
        let s = calc_summary(&buckets);

        assert_eq!(s.weight_avg, Some(80.0));
        assert_eq!(s.body_fat_avg, None);
        assert_eq!(s.body_fat_min, None);
        assert_eq!(s.body_fat_max, None);
    }
}
