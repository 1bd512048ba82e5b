//! Core data models for the memory health engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw counters supplied by the runtime for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCounters {
    pub resident_set_size: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    pub external_memory: u64,
    pub system_total: u64,
    pub system_free: u64,
    /// Bytes reclaimed by the last collection cycle (0 when unknown)
    pub gc_bytes_reclaimed: u64,
    /// Duration of the last collection cycle (0 when unknown)
    pub gc_duration_ms: f64,
}

/// Process view of one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMemory {
    pub resident_set_size: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    pub external_memory: u64,
    pub heap_utilization: f64,
    pub rss_utilization: f64,
}

/// System view of one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMemory {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcStats {
    pub bytes_reclaimed: u64,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentationLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for FragmentationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentationLevel::Low => write!(f, "low"),
            FragmentationLevel::Medium => write!(f, "medium"),
            FragmentationLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragmentation {
    pub heap_fragmentation: f64,
    pub rss_fragmentation: f64,
    pub score: f64,
    pub level: FragmentationLevel,
}

/// One immutable sampling tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub process: ProcessMemory,
    pub system: SystemMemory,
    pub gc: GcStats,
    pub fragmentation: Fragmentation,
}

impl MetricSample {
    /// Fraction of used heap reclaimed by the last collection (0 when unknown)
    pub fn gc_efficiency(&self) -> f64 {
        if self.process.heap_used == 0 {
            return 0.0;
        }
        self.gc.bytes_reclaimed as f64 / self.process.heap_used as f64
    }
}

/// Per-session memory accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub initial_memory: u64,
    pub current_memory: u64,
    pub peak_memory: u64,
    pub sample_count: u64,
    pub total_growth_ratio: f64,
}

/// Growth between two consecutive samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthRate {
    pub bytes: i64,
    pub ratio: f64,
    pub bytes_per_second: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Resident-memory trend over the last two windows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub direction: TrendDirection,
    pub recent_mean: f64,
    pub previous_mean: f64,
    pub confidence: f64,
}
