//! Memory leak heuristics
//!
//! Three independent scores are computed over the most recent window of
//! samples using relative changes in resident memory:
//! - sustained growth: share of steps that grew by more than a small epsilon
//! - staircase: jumps per plateau, capped at 1
//! - GC inefficiency: how little of the used heap collections give back
//!
//! The overall score is their mean. A least-squares slope of resident memory
//! is attached for reports.

use crate::config::LeakDetectionConfig;
use crate::models::MetricSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternScore {
    pub detected: bool,
    pub score: f64,
}

/// Result of one full detection window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakSignal {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub window_size: usize,
    pub sustained_growth: PatternScore,
    pub staircase: PatternScore,
    pub gc_inefficiency: PatternScore,
    pub overall_score: f64,
    /// Linear fit of resident memory over the window
    pub slope_bytes_per_sec: f64,
    pub mean_gc_efficiency: f64,
}

impl LeakSignal {
    pub fn any_detected(&self) -> bool {
        self.sustained_growth.detected || self.staircase.detected || self.gc_inefficiency.detected
    }
}

pub struct LeakDetector {
    config: LeakDetectionConfig,
}

impl LeakDetector {
    pub fn new(config: LeakDetectionConfig) -> Self {
        Self { config }
    }

    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    /// Run the heuristics over the last `window_size` samples.
    ///
    /// Returns `None` until the window is full.
    pub fn detect(&self, samples: &[&MetricSample]) -> Option<LeakSignal> {
        let size = self.config.window_size;
        if samples.len() < size || size < 2 {
            return None;
        }
        let window = &samples[samples.len() - size..];
        let latest = window[window.len() - 1];

        let changes = relative_changes(window);
        let sustained_growth = self.sustained_growth(&changes);
        let staircase = self.staircase(&changes);
        let mean_gc_efficiency =
            window.iter().map(|s| s.gc_efficiency()).sum::<f64>() / window.len() as f64;
        let gc_inefficiency = self.gc_inefficiency(mean_gc_efficiency);

        let overall_score = (sustained_growth.score + staircase.score + gc_inefficiency.score) / 3.0;

        Some(LeakSignal {
            timestamp: latest.timestamp,
            session_id: latest.session_id.clone(),
            window_size: size,
            sustained_growth,
            staircase,
            gc_inefficiency,
            overall_score,
            slope_bytes_per_sec: linear_regression_slope(window),
            mean_gc_efficiency,
        })
    }

    /// Whether the overall score warrants a leak alert regardless of the
    /// per-pattern flags
    pub fn is_escalation(&self, signal: &LeakSignal) -> bool {
        signal.overall_score > self.config.escalation_score
    }

    fn sustained_growth(&self, changes: &[f64]) -> PatternScore {
        if changes.is_empty() {
            return PatternScore {
                detected: false,
                score: 0.0,
            };
        }
        let growing = changes
            .iter()
            .filter(|c| **c > self.config.growth_threshold)
            .count();
        let score = growing as f64 / changes.len() as f64;

        PatternScore {
            detected: score > self.config.sustained_growth_score,
            score,
        }
    }

    fn staircase(&self, changes: &[f64]) -> PatternScore {
        let plateaus = changes
            .iter()
            .filter(|c| c.abs() < self.config.plateau_threshold)
            .count();
        let jumps = changes
            .iter()
            .filter(|c| c.abs() > self.config.jump_threshold)
            .count();

        let score = if plateaus == 0 {
            0.0
        } else {
            (jumps as f64 / plateaus as f64).min(1.0)
        };

        PatternScore {
            detected: score > self.config.staircase_score,
            score,
        }
    }

    fn gc_inefficiency(&self, mean_efficiency: f64) -> PatternScore {
        let score = (1.0 - 10.0 * mean_efficiency).clamp(0.0, 1.0);
        PatternScore {
            detected: score > self.config.gc_inefficiency_score,
            score,
        }
    }
}

impl Default for LeakDetector {
    fn default() -> Self {
        Self::new(LeakDetectionConfig::default())
    }
}

/// Relative resident-memory change for each adjacent pair
fn relative_changes(window: &[&MetricSample]) -> Vec<f64> {
    window
        .windows(2)
        .map(|pair| {
            let before = pair[0].process.resident_set_size as f64;
            let after = pair[1].process.resident_set_size as f64;
            if before == 0.0 {
                0.0
            } else {
                (after - before) / before
            }
        })
        .collect()
}

/// Least-squares slope of resident memory in bytes per second
fn linear_regression_slope(window: &[&MetricSample]) -> f64 {
    let n = window.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let t0 = window[0].timestamp;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;

    for sample in window {
        let x = (sample.timestamp - t0).num_milliseconds() as f64 / 1000.0;
        let y = sample.process.resident_set_size as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denominator
}
