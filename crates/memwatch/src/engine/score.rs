//! Aggregate health score

use crate::alerts::{Alert, AlertLevel};
use crate::models::MetricSample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLabel {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl HealthLabel {
    pub fn for_score(score: f64) -> Self {
        if score >= 0.8 {
            HealthLabel::Excellent
        } else if score >= 0.6 {
            HealthLabel::Good
        } else if score >= 0.4 {
            HealthLabel::Fair
        } else if score >= 0.2 {
            HealthLabel::Poor
        } else {
            HealthLabel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLabel::Critical => "critical",
            HealthLabel::Poor => "poor",
            HealthLabel::Fair => "fair",
            HealthLabel::Good => "good",
            HealthLabel::Excellent => "excellent",
        }
    }
}

impl std::fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score in [0, 1] from the latest sample and the alerts raised this cycle
pub fn health_score(sample: Option<&MetricSample>, new_alerts: &[Alert]) -> f64 {
    let mut score = 1.0;

    if let Some(sample) = sample {
        let utilization = sample.system.utilization;
        score -= if utilization > 0.9 {
            0.5
        } else if utilization > 0.8 {
            0.3
        } else if utilization > 0.7 {
            0.1
        } else {
            0.0
        };

        let fragmentation = sample.fragmentation.score;
        score -= if fragmentation > 0.5 {
            0.3
        } else if fragmentation > 0.3 {
            0.2
        } else if fragmentation > 0.1 {
            0.1
        } else {
            0.0
        };
    }

    let severe = new_alerts.iter().filter(|a| a.level.is_severe()).count();
    let warnings = new_alerts
        .iter()
        .filter(|a| a.level == AlertLevel::Warning)
        .count();
    score -= 0.2 * severe as f64 + 0.1 * warnings as f64;

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertCandidate, AlertType};
    use crate::testing::{sample_with, t0};

    fn alert(level: AlertLevel) -> Alert {
        Alert::from_candidate(
            AlertCandidate {
                alert_type: AlertType::SystemMemory,
                level,
                message: String::new(),
                data: serde_json::Value::Null,
            },
            t0(),
        )
    }

    #[test]
    fn test_quiet_sample_scores_full() {
        // heap 750/1000 -> fragmentation 0.125 -> -0.1
        let sample = sample_with(0, 1000, 750, 1000, 0.5);
        assert!((health_score(Some(&sample), &[]) - 0.9).abs() < 1e-9);
        assert_eq!(health_score(None, &[]), 1.0);
    }

    #[test]
    fn test_penalties_stack_and_clamp() {
        // utilization 0.92 -> -0.5, fragmentation 0.25 -> -0.1
        let sample = sample_with(0, 1000, 500, 1000, 0.92);
        let score = health_score(
            Some(&sample),
            &[alert(AlertLevel::Critical), alert(AlertLevel::Warning)],
        );
        assert!((score - 0.1).abs() < 1e-9);

        let floor = health_score(
            Some(&sample),
            &[alert(AlertLevel::Emergency), alert(AlertLevel::Critical)],
        );
        assert_eq!(floor, 0.0);
    }

    #[test]
    fn test_thresholds_are_strict() {
        // heap fully used -> no fragmentation; utilization exactly 0.7
        let sample = sample_with(0, 1000, 1000, 1000, 0.7);
        let score = health_score(Some(&sample), &[]);
        assert!(score > 0.95);
    }

    #[test]
    fn test_score_never_rises_with_utilization() {
        let scores: Vec<f64> = [0.65, 0.75, 0.85, 0.95]
            .iter()
            .map(|u| health_score(Some(&sample_with(0, 1000, 1000, 1000, *u)), &[]))
            .collect();
        for pair in scores.windows(2) {
            assert!(pair[1] <= pair[0], "{:?}", scores);
        }
        assert!(scores[3] < scores[0]);
    }

    #[test]
    fn test_label_bands() {
        assert_eq!(HealthLabel::for_score(0.8), HealthLabel::Excellent);
        assert_eq!(HealthLabel::for_score(0.79), HealthLabel::Good);
        assert_eq!(HealthLabel::for_score(0.4), HealthLabel::Fair);
        assert_eq!(HealthLabel::for_score(0.2), HealthLabel::Poor);
        assert_eq!(HealthLabel::for_score(0.19), HealthLabel::Critical);
    }
}
