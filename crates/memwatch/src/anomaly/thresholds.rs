//! Threshold tiers
//!
//! Each metric reports at most one event per tick: the highest tier reached.

use crate::alerts::AlertLevel;
use crate::config::{FragmentationBands, ThresholdConfig, ThresholdTiers};
use crate::models::{FragmentationLevel, MetricSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMetric {
    SystemMemory,
    HeapUtilization,
    Fragmentation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEvent {
    pub timestamp: DateTime<Utc>,
    pub metric: ThresholdMetric,
    pub level: AlertLevel,
    pub value: f64,
    pub threshold: f64,
}

pub struct ThresholdEvaluator {
    system: ThresholdTiers,
    heap: ThresholdTiers,
    fragmentation: FragmentationBands,
}

impl ThresholdEvaluator {
    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            system: config.system_memory,
            heap: config.heap_utilization,
            fragmentation: config.fragmentation,
        }
    }

    pub fn evaluate(&self, sample: &MetricSample) -> Vec<ThresholdEvent> {
        let mut events = Vec::new();

        let tiered = [
            (ThresholdMetric::SystemMemory, &self.system, sample.system.utilization),
            (
                ThresholdMetric::HeapUtilization,
                &self.heap,
                sample.process.heap_utilization,
            ),
        ];
        for (metric, tiers, value) in tiered {
            if let Some((level, threshold)) = highest_tier(tiers, value) {
                events.push(ThresholdEvent {
                    timestamp: sample.timestamp,
                    metric,
                    level,
                    value,
                    threshold,
                });
            }
        }

        let fragmentation = match sample.fragmentation.level {
            FragmentationLevel::High => Some((AlertLevel::Critical, self.fragmentation.high)),
            FragmentationLevel::Medium => Some((AlertLevel::Warning, self.fragmentation.medium)),
            FragmentationLevel::Low => None,
        };
        if let Some((level, threshold)) = fragmentation {
            events.push(ThresholdEvent {
                timestamp: sample.timestamp,
                metric: ThresholdMetric::Fragmentation,
                level,
                value: sample.fragmentation.score,
                threshold,
            });
        }

        events
    }
}

fn highest_tier(tiers: &ThresholdTiers, value: f64) -> Option<(AlertLevel, f64)> {
    if value >= tiers.emergency {
        Some((AlertLevel::Emergency, tiers.emergency))
    } else if value >= tiers.critical {
        Some((AlertLevel::Critical, tiers.critical))
    } else if value >= tiers.warning {
        Some((AlertLevel::Warning, tiers.warning))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_with;

    fn evaluator() -> ThresholdEvaluator {
        ThresholdEvaluator::new(&ThresholdConfig::default())
    }

    fn system_levels(utilization: f64) -> Vec<AlertLevel> {
        evaluator()
            .evaluate(&sample_with(0, 1_000, 100, 1_000, utilization))
            .into_iter()
            .filter(|e| e.metric == ThresholdMetric::SystemMemory)
            .map(|e| e.level)
            .collect()
    }

    #[test]
    fn test_only_highest_tier_is_reported() {
        assert!(system_levels(0.5).is_empty());
        assert_eq!(system_levels(0.75), vec![AlertLevel::Warning]);
        assert_eq!(system_levels(0.9), vec![AlertLevel::Critical]);
        assert_eq!(system_levels(0.99), vec![AlertLevel::Emergency]);
    }

    #[test]
    fn test_heap_tiers_are_independent() {
        // heap 95/100 = critical, system quiet
        let events = evaluator().evaluate(&sample_with(0, 100, 95, 100, 0.1));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metric, ThresholdMetric::HeapUtilization);
        assert_eq!(events[0].level, AlertLevel::Critical);
        assert_eq!(events[0].threshold, 0.92);
    }

    #[test]
    fn test_fragmentation_bands_map_to_levels() {
        // heap 50% free and rss twice the heap: score 0.5 -> high
        let events = evaluator().evaluate(&sample_with(0, 2_000, 500, 1_000, 0.1));
        let frag: Vec<_> = events
            .iter()
            .filter(|e| e.metric == ThresholdMetric::Fragmentation)
            .collect();
        assert_eq!(frag.len(), 1);
        assert_eq!(frag[0].level, AlertLevel::Critical);
    }
}
