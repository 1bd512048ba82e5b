//! Six-dimension analysis of one cycle's inputs
//!
//! Each dimension is computed independently and feeds its own rules.

use crate::alerts::AlertLevel;
use crate::anomaly::LeakSignal;
use crate::config::{FragmentationBands, OptimizationConfig, ThresholdTiers};
use crate::models::{FragmentationLevel, MetricSample, SessionRecord};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Share of the baseline efficiency that may be lost before performance
/// counts as degraded
const DEGRADATION_TOLERANCE: f64 = 0.2;
const SEVERE_DEGRADATION: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    Normal,
    Elevated,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentationUrgency {
    None,
    Moderate,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakSeverity {
    None,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionGrowth {
    None,
    Moderate,
    High,
    Excessive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    #[default]
    Normal,
    Elevated,
    Critical,
}

impl Criticality {
    /// Emergency alerts make the context critical, critical alerts elevate it
    pub fn from_alert_level(level: Option<AlertLevel>) -> Self {
        match level {
            Some(AlertLevel::Emergency) => Criticality::Critical,
            Some(AlertLevel::Critical) => Criticality::Elevated,
            _ => Criticality::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    /// 1 - max(system utilization, heap utilization, fragmentation)
    pub efficiency: f64,
    pub baseline: Option<f64>,
    /// Relative loss against the baseline (0 when at or above it)
    pub degradation: f64,
}

impl Performance {
    pub fn is_degraded(&self) -> bool {
        self.degradation > DEGRADATION_TOLERANCE
    }

    pub fn is_severe(&self) -> bool {
        self.degradation > SEVERE_DEGRADATION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub maintenance_window: bool,
    pub criticality: Criticality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub pressure: PressureLevel,
    pub utilization: f64,
    pub fragmentation: FragmentationUrgency,
    pub fragmentation_score: f64,
    pub leak: LeakSeverity,
    pub leak_score: f64,
    pub performance: Performance,
    pub session_growth: SessionGrowth,
    pub growth_ratio: f64,
    pub context: AnalysisContext,
}

pub struct Analyzer<'a> {
    pub tiers: &'a ThresholdTiers,
    pub bands: &'a FragmentationBands,
    pub config: &'a OptimizationConfig,
}

impl Analyzer<'_> {
    pub fn analyze(
        &self,
        sample: &MetricSample,
        session: Option<&SessionRecord>,
        leak: Option<&LeakSignal>,
        baseline: Option<f64>,
        criticality: Criticality,
        now: DateTime<Utc>,
    ) -> Analysis {
        let utilization = sample.system.utilization;
        let fragmentation_score = sample.fragmentation.score;
        let growth_ratio = session.map(|s| s.total_growth_ratio).unwrap_or(0.0);

        Analysis {
            pressure: self.pressure(utilization),
            utilization,
            fragmentation: match crate::sampler::fragmentation_level(fragmentation_score, self.bands) {
                FragmentationLevel::High => FragmentationUrgency::Urgent,
                FragmentationLevel::Medium => FragmentationUrgency::Moderate,
                FragmentationLevel::Low => FragmentationUrgency::None,
            },
            fragmentation_score,
            leak: self.leak_severity(leak),
            leak_score: leak.map(|l| l.overall_score).unwrap_or(0.0),
            performance: performance(sample, baseline),
            session_growth: session_growth(growth_ratio),
            growth_ratio,
            context: AnalysisContext {
                maintenance_window: self.in_maintenance_window(now),
                criticality,
            },
        }
    }

    fn pressure(&self, utilization: f64) -> PressureLevel {
        if utilization >= self.tiers.emergency {
            PressureLevel::Critical
        } else if utilization >= self.tiers.critical {
            PressureLevel::High
        } else if utilization >= self.tiers.warning {
            PressureLevel::Elevated
        } else {
            PressureLevel::Normal
        }
    }

    fn leak_severity(&self, leak: Option<&LeakSignal>) -> LeakSeverity {
        let Some(signal) = leak else {
            return LeakSeverity::None;
        };
        if signal.overall_score > self.config.leak_severity_critical {
            LeakSeverity::Critical
        } else if signal.overall_score > self.config.leak_severity_high {
            LeakSeverity::High
        } else if signal.any_detected() {
            LeakSeverity::Medium
        } else {
            LeakSeverity::None
        }
    }

    /// Hours in [start, end); a window may wrap past midnight
    fn in_maintenance_window(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        let start = self.config.maintenance_window_start_hour;
        let end = self.config.maintenance_window_end_hour;
        if start <= end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

fn performance(sample: &MetricSample, baseline: Option<f64>) -> Performance {
    let load = sample
        .system
        .utilization
        .max(sample.process.heap_utilization)
        .max(sample.fragmentation.score);
    let efficiency = (1.0 - load).clamp(0.0, 1.0);

    let degradation = match baseline {
        Some(b) if b > 0.0 => ((b - efficiency) / b).max(0.0),
        _ => 0.0,
    };

    Performance {
        efficiency,
        baseline,
        degradation,
    }
}

fn session_growth(ratio: f64) -> SessionGrowth {
    if ratio > 1.0 {
        SessionGrowth::Excessive
    } else if ratio > 0.5 {
        SessionGrowth::High
    } else if ratio > 0.2 {
        SessionGrowth::Moderate
    } else {
        SessionGrowth::None
    }
}
