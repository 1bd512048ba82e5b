//! Resident-memory trend

use super::History;
use crate::models::{Trend, TrendDirection};

/// Samples per trend window
pub const TREND_WINDOW: usize = 10;

/// Relative difference under which the trend is stable
const STABLE_TOLERANCE: f64 = 0.001;

/// Compare the latest window against the one before it.
///
/// `None` until history holds two full windows.
pub fn compute(history: &History) -> Option<Trend> {
    let values: Vec<f64> = history
        .recent(TREND_WINDOW * 2)
        .map(|s| s.process.resident_set_size as f64)
        .collect();
    if values.len() < TREND_WINDOW * 2 {
        return None;
    }

    let (previous, recent) = values.split_at(values.len() - TREND_WINDOW);
    let recent_mean = mean(recent);
    let previous_mean = mean(previous);

    let change = if previous_mean == 0.0 {
        0.0
    } else {
        (recent_mean - previous_mean) / previous_mean
    };
    let direction = if change > STABLE_TOLERANCE {
        TrendDirection::Increasing
    } else if change < -STABLE_TOLERANCE {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    let confidence = if recent_mean == 0.0 {
        0.0
    } else {
        (1.0 - std_dev(recent, recent_mean) / recent_mean).max(0.0)
    };

    Some(Trend {
        direction,
        recent_mean,
        previous_mean,
        confidence,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_at;
    use std::sync::Arc;

    fn history_of(values: &[u64]) -> History {
        let mut history = History::new(100);
        for (i, v) in values.iter().enumerate() {
            history.push(Arc::new(sample_at(i as i64, *v)));
        }
        history
    }

    #[test]
    fn test_needs_two_full_windows() {
        assert!(compute(&history_of(&[100; 10])).is_none());
        assert!(compute(&history_of(&[100; 11])).is_none());
        assert!(compute(&history_of(&[100; 19])).is_none());
        assert!(compute(&history_of(&[100; 20])).is_some());
    }

    #[test]
    fn test_previous_window_is_the_ten_before_recent() {
        let mut values = vec![1_000u64; 5];
        values.extend(std::iter::repeat(100).take(10));
        values.extend(std::iter::repeat(200).take(10));

        let trend = compute(&history_of(&values)).unwrap();
        assert_eq!(trend.previous_mean, 100.0);
        assert_eq!(trend.recent_mean, 200.0);
    }

    #[test]
    fn test_increasing_trend() {
        let mut values = vec![100u64; 10];
        values.extend(std::iter::repeat(200).take(10));

        let trend = compute(&history_of(&values)).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.recent_mean, 200.0);
        assert_eq!(trend.previous_mean, 100.0);
        assert_eq!(trend.confidence, 1.0);
    }

    #[test]
    fn test_decreasing_and_stable() {
        let mut values = vec![200u64; 10];
        values.extend(std::iter::repeat(100).take(10));
        assert_eq!(
            compute(&history_of(&values)).unwrap().direction,
            TrendDirection::Decreasing
        );

        assert_eq!(
            compute(&history_of(&[500; 20])).unwrap().direction,
            TrendDirection::Stable
        );
    }

    #[test]
    fn test_noisy_window_lowers_confidence() {
        let mut values = vec![100u64; 10];
        values.extend([10, 190, 10, 190, 10, 190, 10, 190, 10, 190]);

        let trend = compute(&history_of(&values)).unwrap();
        assert!(trend.confidence < 0.2);
    }
}
