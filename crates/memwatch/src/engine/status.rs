//! Status surface consumed by dashboards and the agent API

use super::HealthLabel;
use crate::alerts::Alert;
use crate::models::{MetricSample, Trend};
use crate::optimizer::Recommendation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alerts listed in `alerts.recent`
pub const RECENT_ALERTS: usize = 5;
/// Recommendations listed in `optimizations.top`
pub const TOP_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Starting,
    Running,
    /// Sampling continues without a usable metrics source
    Degraded,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub status: RunState,
    pub health_score: f64,
    pub health_status: Option<HealthLabel>,
    pub memory: MemoryStatus,
    pub monitoring: MonitoringStatus,
    pub alerts: AlertStatus,
    pub sessions: SessionStatus,
    pub optimizations: OptimizationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStatus {
    pub current: Option<MetricSample>,
    pub trend: Option<Trend>,
    pub leak_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    pub active: bool,
    pub samples_collected: u64,
    pub collection_errors: u64,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    pub total: usize,
    pub active: usize,
    pub critical: usize,
    pub warnings: usize,
    pub recent: Vec<Alert>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub total: usize,
    pub active: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationStatus {
    pub total_recommendations: usize,
    pub high_priority: usize,
    pub auto_implemented: u64,
    pub top: Vec<Recommendation>,
}
