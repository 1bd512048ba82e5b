//! Engine configuration
//!
//! Every field is optional when deserialized; missing sections and keys fall
//! back to the defaults below.

use crate::error::ConfigError;
use crate::optimizer::Aggressiveness;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sampling: SamplingConfig,
    pub thresholds: ThresholdConfig,
    pub leak_detection: LeakDetectionConfig,
    pub cooldowns: CooldownConfig,
    pub actions: ActionConfig,
    pub notifications: NotificationConfig,
    pub optimization: OptimizationConfig,
    pub retention: RetentionConfig,
    pub integration: IntegrationConfig,
    pub storage: StorageConfig,
}

impl EngineConfig {
    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.system_memory.validate("system_memory")?;
        self.thresholds.heap_utilization.validate("heap_utilization")?;

        let bands = &self.thresholds.fragmentation;
        if !(0.0..=1.0).contains(&bands.medium) || bands.medium > bands.high || bands.high > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "fragmentation bands must satisfy 0 <= medium <= high <= 1 (got {} / {})",
                bands.medium, bands.high
            )));
        }

        if self.leak_detection.window_size < 2 {
            return Err(ConfigError::Invalid(
                "leak_detection.window_size must be at least 2".to_string(),
            ));
        }
        if self.sampling.history_capacity < self.leak_detection.window_size {
            return Err(ConfigError::Invalid(format!(
                "sampling.history_capacity ({}) must hold a full detection window ({})",
                self.sampling.history_capacity, self.leak_detection.window_size
            )));
        }
        if self.sampling.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sampling.interval_ms must be positive".to_string(),
            ));
        }
        let periods = [
            ("integration.status_interval_secs", self.integration.status_interval_secs),
            ("integration.sync_interval_secs", self.integration.sync_interval_secs),
            (
                "integration.automation_reset_interval_secs",
                self.integration.automation_reset_interval_secs,
            ),
            (
                "integration.pattern_prune_interval_secs",
                self.integration.pattern_prune_interval_secs,
            ),
            ("retention.sweep_interval_secs", self.retention.sweep_interval_secs),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{} must be positive", name)));
        }
        if self.retention.alert_history_trim_to > self.retention.max_alert_history {
            return Err(ConfigError::Invalid(
                "retention.alert_history_trim_to cannot exceed retention.max_alert_history"
                    .to_string(),
            ));
        }
        if self.optimization.maintenance_window_start_hour > 23
            || self.optimization.maintenance_window_end_hour > 23
        {
            return Err(ConfigError::Invalid(
                "maintenance window hours must be in 0..=23".to_string(),
            ));
        }
        if let Some(ref target) = self.notifications.webhook_url {
            url::Url::parse(target)?;
        }

        Ok(())
    }
}

/// Sampler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sampling cadence in milliseconds
    pub interval_ms: u64,
    /// Maximum retained samples (oldest dropped first)
    pub history_capacity: usize,
    /// Session used when the host never supplies one
    pub fallback_session_id: Option<String>,
    /// Upper bound on the initial wait for the metrics source
    pub readiness_timeout_ms: u64,
    /// A session is active if it produced a sample within this window
    pub session_active_window_secs: u64,
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            history_capacity: 1_000,
            fallback_session_id: None,
            readiness_timeout_ms: 5_000,
            session_active_window_secs: 300,
        }
    }
}

/// Warning/critical/emergency tiers for one metric
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdTiers {
    pub warning: f64,
    pub critical: f64,
    pub emergency: f64,
}

impl ThresholdTiers {
    pub const SYSTEM_MEMORY: Self = Self {
        warning: 0.75,
        critical: 0.85,
        emergency: 0.95,
    };

    pub const HEAP_UTILIZATION: Self = Self {
        warning: 0.85,
        critical: 0.92,
        emergency: 0.97,
    };

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.warning <= self.critical && self.critical <= self.emergency && self.warning >= 0.0
        {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "{} tiers must be ordered warning <= critical <= emergency",
                name
            )))
        }
    }
}

/// Tiers as written in a config file; omitted tiers keep the metric's default
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TierOverrides {
    warning: Option<f64>,
    critical: Option<f64>,
    emergency: Option<f64>,
}

impl TierOverrides {
    fn over(self, base: ThresholdTiers) -> ThresholdTiers {
        ThresholdTiers {
            warning: self.warning.unwrap_or(base.warning),
            critical: self.critical.unwrap_or(base.critical),
            emergency: self.emergency.unwrap_or(base.emergency),
        }
    }
}

fn system_memory_tiers<'de, D: Deserializer<'de>>(d: D) -> Result<ThresholdTiers, D::Error> {
    Ok(TierOverrides::deserialize(d)?.over(ThresholdTiers::SYSTEM_MEMORY))
}

fn heap_utilization_tiers<'de, D: Deserializer<'de>>(d: D) -> Result<ThresholdTiers, D::Error> {
    Ok(TierOverrides::deserialize(d)?.over(ThresholdTiers::HEAP_UTILIZATION))
}

/// Fragmentation level bands
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentationBands {
    pub medium: f64,
    pub high: f64,
}

impl Default for FragmentationBands {
    fn default() -> Self {
        Self {
            medium: 0.3,
            high: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    #[serde(deserialize_with = "system_memory_tiers")]
    pub system_memory: ThresholdTiers,
    #[serde(deserialize_with = "heap_utilization_tiers")]
    pub heap_utilization: ThresholdTiers,
    pub fragmentation: FragmentationBands,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            system_memory: ThresholdTiers::SYSTEM_MEMORY,
            heap_utilization: ThresholdTiers::HEAP_UTILIZATION,
            fragmentation: FragmentationBands::default(),
        }
    }
}

/// Leak heuristic parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakDetectionConfig {
    /// Samples per detection window
    pub window_size: usize,
    /// Minimum relative growth counted as "growing"
    pub growth_threshold: f64,
    /// Relative change below which a step is a plateau
    pub plateau_threshold: f64,
    /// Relative change above which a step is a jump
    pub jump_threshold: f64,
    pub sustained_growth_score: f64,
    pub staircase_score: f64,
    pub gc_inefficiency_score: f64,
    /// Overall score above which the detector escalates to a leak alert
    pub escalation_score: f64,
}

impl Default for LeakDetectionConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            growth_threshold: 0.001,
            plateau_threshold: 0.001,
            jump_threshold: 0.05,
            sustained_growth_score: 0.7,
            staircase_score: 0.3,
            gc_inefficiency_score: 0.6,
            escalation_score: 0.7,
        }
    }
}

/// Per-level cooldown periods
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub warning_secs: u64,
    pub critical_secs: u64,
    pub emergency_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            warning_secs: 300,
            critical_secs: 120,
            emergency_secs: 60,
        }
    }
}

/// Action trigger toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub auto_gc: bool,
    pub notifications: bool,
    pub emergency_shutdown: bool,
    pub memory_dump: bool,
    pub shutdown_grace_ms: u64,
}

impl ActionConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            auto_gc: true,
            notifications: true,
            emergency_shutdown: false,
            memory_dump: true,
            shutdown_grace_ms: 5_000,
        }
    }
}

/// Notification channel toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub console: bool,
    pub durable_log: bool,
    pub webhook_url: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            console: true,
            durable_log: true,
            webhook_url: None,
        }
    }
}

/// Recommendation engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub auto_optimize: bool,
    pub aggressiveness: Aggressiveness,
    pub max_automations_per_hour: u32,
    pub learning_mode: bool,
    /// Leak severity bands used by the analysis (separate from the detector)
    pub leak_severity_high: f64,
    pub leak_severity_critical: f64,
    pub maintenance_window_start_hour: u32,
    pub maintenance_window_end_hour: u32,
    pub max_learned_patterns: usize,
    pub pattern_stale_days: i64,
    pub min_pattern_success_rate: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            auto_optimize: true,
            aggressiveness: Aggressiveness::Moderate,
            max_automations_per_hour: 5,
            learning_mode: true,
            leak_severity_high: 0.6,
            leak_severity_critical: 0.7,
            maintenance_window_start_hour: 2,
            maintenance_window_end_hour: 5,
            max_learned_patterns: 100,
            pattern_stale_days: 30,
            min_pattern_success_rate: 0.3,
        }
    }
}

/// Retention of alerts and recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub retention_days: i64,
    pub max_recommendations: usize,
    pub max_alert_history: usize,
    pub alert_history_trim_to: usize,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            max_recommendations: 100,
            max_alert_history: 1_000,
            alert_history_trim_to: 500,
            sweep_interval_secs: 3_600,
        }
    }
}

/// Integration hub timers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub status_interval_secs: u64,
    pub sync_interval_secs: u64,
    pub automation_reset_interval_secs: u64,
    pub pattern_prune_interval_secs: u64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: 10,
            sync_interval_secs: 30,
            automation_reset_interval_secs: 3_600,
            pattern_prune_interval_secs: 3_600,
        }
    }
}

/// Where durable artifacts go
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    /// Pending journal entries before new ones are dropped
    pub journal_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./memwatch-data"),
            journal_capacity: 1_024,
        }
    }
}
