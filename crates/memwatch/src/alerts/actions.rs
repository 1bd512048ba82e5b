//! Remediation actions run when an alert is dispatched
//!
//! Actions run in order and are best-effort: a failure is recorded as
//! `action_error:<message>` and the next action still runs.

use super::{Alert, AlertLevel, AlertType};
use crate::anomaly::LeakSignal;
use crate::config::ActionConfig;
use crate::error::Result;
use crate::events::{EventBus, ShutdownRequest};
use crate::journal::{Journal, LogKind};
use crate::models::MetricSample;
use crate::observability::StructuredLogger;
use crate::runtime::{capture_snapshot, RuntimeControl};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const CAPTURE_SNAPSHOT: &str = "capture_snapshot";
pub const FORCE_GC: &str = "force_gc";
pub const PERSIST_STATE: &str = "persist_state";
pub const EMERGENCY_SHUTDOWN: &str = "emergency_shutdown_requested";
pub const LEAK_REPORT: &str = "leak_report";
pub const OPTIMIZE_LAYOUT: &str = "optimize_layout";

/// Alerts included in the emergency state dump
pub(crate) const STATE_DUMP_ALERTS: usize = 10;

pub struct ActionDispatcher {
    runtime: Arc<dyn RuntimeControl>,
    journal: Journal,
    events: EventBus,
    config: ActionConfig,
    logger: StructuredLogger,
}

impl ActionDispatcher {
    pub fn new(
        runtime: Arc<dyn RuntimeControl>,
        journal: Journal,
        events: EventBus,
        config: ActionConfig,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            runtime,
            journal,
            events,
            config,
            logger,
        }
    }

    /// Run the actions for an alert and return their identifiers.
    ///
    /// `recent` is the alert history, newest first.
    pub fn dispatch(
        &self,
        alert: &Alert,
        sample: Option<&MetricSample>,
        leak: Option<&LeakSignal>,
        recent: &[&Alert],
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut executed = Vec::new();

        match (alert.level, alert.alert_type) {
            (AlertLevel::Emergency, AlertType::SystemMemory | AlertType::HeapPressure) => {
                if self.config.memory_dump {
                    record(
                        &mut executed,
                        capture_snapshot(self.runtime.as_ref(), &self.journal, now)
                            .map(|_| CAPTURE_SNAPSHOT),
                    );
                }
                if alert.alert_type == AlertType::HeapPressure && self.config.auto_gc {
                    record(&mut executed, self.force_gc());
                }
                if alert.alert_type == AlertType::SystemMemory && self.config.emergency_shutdown {
                    let state_path = match self.persist_state(alert, sample, recent, now) {
                        Ok(path) => {
                            executed.push(PERSIST_STATE.to_string());
                            Some(path)
                        }
                        Err(e) => {
                            executed.push(format!("action_error:{}", e));
                            None
                        }
                    };
                    self.request_shutdown(alert, state_path, now);
                    executed.push(EMERGENCY_SHUTDOWN.to_string());
                }
            }
            (AlertLevel::Critical, AlertType::HeapPressure | AlertType::MemoryFragmentation) => {
                if self.config.auto_gc {
                    record(&mut executed, self.force_gc());
                }
            }
            (AlertLevel::Critical, AlertType::MemoryLeak) => {
                record(&mut executed, self.leak_report(alert, sample, leak, now));
            }
            (AlertLevel::Warning, AlertType::MemoryFragmentation) => {
                info!(
                    event = "optimize_layout",
                    alert_id = %alert.id,
                    "Fragmentation advisory: consider pooling or compacting long-lived buffers"
                );
                executed.push(OPTIMIZE_LAYOUT.to_string());
            }
            _ => {}
        }

        executed
    }

    fn force_gc(&self) -> Result<&'static str> {
        let outcome = self.runtime.force_collect()?;
        info!(
            bytes_reclaimed = outcome.bytes_reclaimed,
            duration_ms = outcome.duration_ms,
            "Forced collection completed"
        );
        Ok(FORCE_GC)
    }

    fn persist_state(
        &self,
        alert: &Alert,
        sample: Option<&MetricSample>,
        recent: &[&Alert],
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let recent: Vec<&Alert> = std::iter::once(alert)
            .chain(recent.iter().copied())
            .take(STATE_DUMP_ALERTS)
            .collect();
        let body = serde_json::json!({
            "timestamp": now,
            "reason": alert.message,
            "sample": sample,
            "recentAlerts": recent,
        });
        self.journal.write_artifact(
            format!("emergency/state-{}.json", stamp(now)),
            serde_json::to_vec_pretty(&body)?,
        )
    }

    fn request_shutdown(&self, alert: &Alert, state_path: Option<PathBuf>, now: DateTime<Utc>) {
        let grace = self.config.shutdown_grace();
        self.logger
            .log_emergency_shutdown(&alert.message, grace.as_millis());
        self.events.publish_shutdown(ShutdownRequest {
            timestamp: now,
            reason: alert.message.clone(),
            grace,
            state_path,
        });
    }

    fn leak_report(
        &self,
        alert: &Alert,
        sample: Option<&MetricSample>,
        leak: Option<&LeakSignal>,
        now: DateTime<Utc>,
    ) -> Result<&'static str> {
        write_leak_report(&self.journal, Some(&alert.id), sample, leak, now)?;
        Ok(LEAK_REPORT)
    }
}

/// Queue a structured leak report under `reports/` and note it in the leak log
pub fn write_leak_report(
    journal: &Journal,
    alert_id: Option<&str>,
    sample: Option<&MetricSample>,
    leak: Option<&LeakSignal>,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let body = serde_json::json!({
        "generatedAt": now,
        "alertId": alert_id,
        "sample": sample,
        "signal": leak,
        "suggestions": leak_suggestions(leak),
    });
    let path = journal.write_artifact(
        format!("reports/leak-report-{}.json", stamp(now)),
        serde_json::to_vec_pretty(&body)?,
    )?;
    journal.append(
        LogKind::LeakDetection,
        "leak_report",
        now,
        &serde_json::json!({ "alertId": alert_id, "path": path }),
    )?;
    Ok(path)
}

/// Investigation steps matching the patterns a leak signal detected
pub fn leak_suggestions(signal: Option<&LeakSignal>) -> Vec<String> {
    let mut suggestions = Vec::new();
    if let Some(signal) = signal {
        if signal.sustained_growth.detected {
            suggestions
                .push("Review caches and collections that grow with every request".to_string());
        }
        if signal.staircase.detected {
            suggestions.push("Inspect periodic or batch jobs that retain their results".to_string());
        }
        if signal.gc_inefficiency.detected {
            suggestions.push(
                "Look for references kept alive by listeners, closures or global maps".to_string(),
            );
        }
    }
    suggestions.push("Compare heap snapshots taken a few minutes apart".to_string());
    suggestions
}

fn record(executed: &mut Vec<String>, result: Result<&'static str>) {
    match result {
        Ok(id) => executed.push(id.to_string()),
        Err(e) => executed.push(format!("action_error:{}", e)),
    }
}

fn stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}
