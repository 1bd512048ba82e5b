//! Observability for the memory health engine
//!
//! Provides:
//! - Prometheus metrics (sampling latency, memory gauges, alert and automation counters)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for sampling latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    collection_latency_seconds: Histogram,
    samples_collected: IntCounter,
    collection_errors: IntCounter,
    resident_bytes: IntGauge,
    heap_utilization: Gauge,
    system_utilization: Gauge,
    fragmentation_score: Gauge,
    leak_score: Gauge,
    alerts_fired: IntCounterVec,
    alerts_suppressed: IntCounter,
    recommendations_generated: IntCounter,
    automations_applied: IntCounterVec,
    health_score: Gauge,
    sync_failures: IntCounter,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            collection_latency_seconds: register_histogram!(
                "memwatch_collection_latency_seconds",
                "Time spent on one sampling tick",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_latency_seconds"),

            samples_collected: register_int_counter!(
                "memwatch_samples_collected_total",
                "Total number of memory samples collected"
            )
            .expect("Failed to register samples_collected"),

            collection_errors: register_int_counter!(
                "memwatch_collection_errors_total",
                "Total number of ticks skipped because counters were unavailable"
            )
            .expect("Failed to register collection_errors"),

            resident_bytes: register_int_gauge!(
                "memwatch_resident_bytes",
                "Resident set size at the last sample"
            )
            .expect("Failed to register resident_bytes"),

            heap_utilization: register_gauge!(
                "memwatch_heap_utilization_ratio",
                "Heap used over heap total at the last sample"
            )
            .expect("Failed to register heap_utilization"),

            system_utilization: register_gauge!(
                "memwatch_system_utilization_ratio",
                "System memory utilization at the last sample"
            )
            .expect("Failed to register system_utilization"),

            fragmentation_score: register_gauge!(
                "memwatch_fragmentation_score",
                "Fragmentation score at the last sample"
            )
            .expect("Failed to register fragmentation_score"),

            leak_score: register_gauge!(
                "memwatch_leak_score",
                "Overall leak score of the last full detection window"
            )
            .expect("Failed to register leak_score"),

            alerts_fired: register_int_counter_vec!(
                "memwatch_alerts_fired_total",
                "Alerts dispatched, by level",
                &["level"]
            )
            .expect("Failed to register alerts_fired"),

            alerts_suppressed: register_int_counter!(
                "memwatch_alerts_suppressed_total",
                "Alert conditions dropped by cooldown"
            )
            .expect("Failed to register alerts_suppressed"),

            recommendations_generated: register_int_counter!(
                "memwatch_recommendations_generated_total",
                "Total number of recommendations generated"
            )
            .expect("Failed to register recommendations_generated"),

            automations_applied: register_int_counter_vec!(
                "memwatch_automations_applied_total",
                "Automatic remediation attempts, by outcome",
                &["outcome"]
            )
            .expect("Failed to register automations_applied"),

            health_score: register_gauge!(
                "memwatch_health_score",
                "Aggregate health score of the last cycle"
            )
            .expect("Failed to register health_score"),

            sync_failures: register_int_counter!(
                "memwatch_sync_failures_total",
                "Failed pushes of the sync summary"
            )
            .expect("Failed to register sync_failures"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_collection_latency(&self, duration_secs: f64) {
        self.inner().collection_latency_seconds.observe(duration_secs);
    }

    /// Record the gauges of one sample
    pub fn record_sample(
        &self,
        resident_bytes: u64,
        heap_utilization: f64,
        system_utilization: f64,
        fragmentation: f64,
    ) {
        let inner = self.inner();
        inner.samples_collected.inc();
        inner
            .resident_bytes
            .set(i64::try_from(resident_bytes).unwrap_or(i64::MAX));
        inner.heap_utilization.set(heap_utilization);
        inner.system_utilization.set(system_utilization);
        inner.fragmentation_score.set(fragmentation);
    }

    pub fn inc_collection_errors(&self) {
        self.inner().collection_errors.inc();
    }

    pub fn set_leak_score(&self, score: f64) {
        self.inner().leak_score.set(score);
    }

    pub fn inc_alerts_fired(&self, level: &str) {
        self.inner().alerts_fired.with_label_values(&[level]).inc();
    }

    pub fn inc_alerts_suppressed(&self) {
        self.inner().alerts_suppressed.inc();
    }

    pub fn add_recommendations(&self, count: usize) {
        self.inner().recommendations_generated.inc_by(count as u64);
    }

    pub fn inc_automations(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner()
            .automations_applied
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn set_health_score(&self, score: f64) {
        self.inner().health_score.set(score);
    }

    pub fn inc_sync_failures(&self) {
        self.inner().sync_failures.inc();
    }
}

/// Structured logger for engine events
///
/// Consistent JSON-formatted lines for alerts, leak signals, automations and
/// lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_startup(&self, version: &str, runtime: &str) {
        info!(
            event = "engine_started",
            instance = %self.instance,
            version = %version,
            runtime = %runtime,
            "Memory health engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Memory health engine shutting down"
        );
    }

    pub fn log_alert(&self, alert_type: &str, level: &str, message: &str, actions: &[String]) {
        match level {
            "warning" => {
                info!(
                    event = "alert_fired",
                    instance = %self.instance,
                    alert_type = %alert_type,
                    level = %level,
                    actions = ?actions,
                    "{}", message
                );
            }
            _ => {
                warn!(
                    event = "alert_fired",
                    instance = %self.instance,
                    alert_type = %alert_type,
                    level = %level,
                    actions = ?actions,
                    "{}", message
                );
            }
        }
    }

    pub fn log_alert_suppressed(&self, alert_type: &str, level: &str, remaining_secs: i64) {
        tracing::debug!(
            event = "alert_suppressed",
            instance = %self.instance,
            alert_type = %alert_type,
            level = %level,
            cooldown_remaining_secs = remaining_secs,
            "Alert suppressed by cooldown"
        );
    }

    pub fn log_leak_signal(
        &self,
        session_id: &str,
        overall_score: f64,
        slope_bytes_per_sec: f64,
        escalated: bool,
    ) {
        if escalated {
            warn!(
                event = "memory_leak_detected",
                instance = %self.instance,
                session_id = %session_id,
                overall_score = overall_score,
                slope_bytes_per_sec = slope_bytes_per_sec,
                "Memory leak pattern detected"
            );
        } else {
            info!(
                event = "leak_signal",
                instance = %self.instance,
                session_id = %session_id,
                overall_score = overall_score,
                slope_bytes_per_sec = slope_bytes_per_sec,
                "Leak detection window evaluated"
            );
        }
    }

    pub fn log_automation(&self, recommendation_id: &str, rec_type: &str, success: bool, errors: &[String]) {
        if success {
            info!(
                event = "automation_applied",
                instance = %self.instance,
                recommendation_id = %recommendation_id,
                recommendation_type = %rec_type,
                "Recommendation applied automatically"
            );
        } else {
            warn!(
                event = "automation_failed",
                instance = %self.instance,
                recommendation_id = %recommendation_id,
                recommendation_type = %rec_type,
                errors = ?errors,
                "Automatic remediation did not succeed"
            );
        }
    }

    pub fn log_sync_status(&self, target: &str, connected: bool) {
        if connected {
            info!(
                event = "sync",
                instance = %self.instance,
                target = %target,
                connected = true,
                "Pushed status summary"
            );
        } else {
            warn!(
                event = "sync",
                instance = %self.instance,
                target = %target,
                connected = false,
                "Status summary push failed, retrying next interval"
            );
        }
    }

    pub fn log_emergency_shutdown(&self, reason: &str, grace_ms: u128) {
        error!(
            event = "emergency_shutdown",
            instance = %self.instance,
            reason = %reason,
            grace_ms = grace_ms as u64,
            "Emergency shutdown requested"
        );
    }
}
