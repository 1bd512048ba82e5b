//! Alert data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    SystemMemory,
    HeapPressure,
    MemoryFragmentation,
    MemoryLeak,
    SustainedGrowth,
    StaircasePattern,
    GcInefficiency,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::SystemMemory => "system_memory",
            AlertType::HeapPressure => "heap_pressure",
            AlertType::MemoryFragmentation => "memory_fragmentation",
            AlertType::MemoryLeak => "memory_leak",
            AlertType::SustainedGrowth => "sustained_growth",
            AlertType::StaircasePattern => "staircase_pattern",
            AlertType::GcInefficiency => "gc_inefficiency",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
    Emergency,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Emergency => "emergency",
        }
    }

    /// Critical and emergency alerts
    pub fn is_severe(&self) -> bool {
        *self >= AlertLevel::Critical
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooldown key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertKey {
    pub alert_type: AlertType,
    pub level: AlertLevel,
}

/// A condition that may become an alert if its key is out of cooldown
#[derive(Debug, Clone)]
pub struct AlertCandidate {
    pub alert_type: AlertType,
    pub level: AlertLevel,
    pub message: String,
    pub data: serde_json::Value,
}

impl AlertCandidate {
    pub fn key(&self) -> AlertKey {
        AlertKey {
            alert_type: self.alert_type,
            level: self.level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub level: AlertLevel,
    pub message: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Identifiers of the actions run on dispatch
    pub actions: Vec<String>,
}

impl Alert {
    pub fn from_candidate(candidate: AlertCandidate, now: DateTime<Utc>) -> Self {
        Self {
            id: format!(
                "{}:{}:{}",
                candidate.alert_type,
                candidate.level,
                now.timestamp_millis()
            ),
            alert_type: candidate.alert_type,
            level: candidate.level,
            message: candidate.message,
            data: candidate.data,
            timestamp: now,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved: false,
            resolved_by: None,
            resolved_at: None,
            actions: Vec::new(),
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey {
            alert_type: self.alert_type,
            level: self.level,
        }
    }
}
