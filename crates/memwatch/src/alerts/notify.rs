//! Notification fan-out
//!
//! Channels are independent: each failure is logged on its own and never
//! stops delivery on the others.

use super::Alert;
use crate::config::NotificationConfig;
use crate::error::{EngineError, Result};
use crate::journal::{Journal, LogKind};
use crate::observability::StructuredLogger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Body handed to the webhook transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub target: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub level: String,
    pub message: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Transport boundary for webhook notifications
pub trait WebhookSink: Send + Sync {
    /// Hand a payload over without waiting for delivery
    fn deliver(&self, payload: WebhookPayload) -> Result<()>;
}

/// Sink that queues payloads for a host-side sender task
#[derive(Debug, Clone)]
pub struct QueuedWebhook {
    tx: mpsc::Sender<WebhookPayload>,
}

impl QueuedWebhook {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WebhookPayload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl WebhookSink for QueuedWebhook {
    fn deliver(&self, payload: WebhookPayload) -> Result<()> {
        self.tx
            .try_send(payload)
            .map_err(|e| EngineError::Notification {
                channel: "webhook".to_string(),
                message: e.to_string(),
            })
    }
}

/// Channels that accepted or rejected one notification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationReport {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

pub struct Notifier {
    console: bool,
    durable: bool,
    webhook: Option<(String, Arc<dyn WebhookSink>)>,
    journal: Journal,
    logger: StructuredLogger,
}

impl Notifier {
    /// The webhook channel is enabled only with both a target and a sink
    pub fn new(
        config: &NotificationConfig,
        sink: Option<Arc<dyn WebhookSink>>,
        journal: Journal,
        logger: StructuredLogger,
    ) -> Self {
        let webhook = match (config.webhook_url.clone(), sink) {
            (Some(target), Some(sink)) => Some((target, sink)),
            (Some(target), None) => {
                warn!(target = %target, "Webhook target configured without a transport; channel disabled");
                None
            }
            _ => None,
        };

        Self {
            console: config.console,
            durable: config.durable_log,
            webhook,
            journal,
            logger,
        }
    }

    pub fn notify(&self, alert: &Alert, now: DateTime<Utc>) -> NotificationReport {
        let mut report = NotificationReport::default();

        if self.console {
            self.logger.log_alert(
                alert.alert_type.as_str(),
                alert.level.as_str(),
                &alert.message,
                &alert.actions,
            );
            report.delivered.push("console");
        }

        if self.durable {
            let entry = serde_json::json!({
                "alertId": alert.id,
                "type": alert.alert_type,
                "level": alert.level,
                "message": alert.message,
            });
            match self
                .journal
                .append(LogKind::Notifications, "notification", now, &entry)
            {
                Ok(()) => report.delivered.push("durable_log"),
                Err(e) => report.failed.push(("durable_log", e.to_string())),
            }
        }

        if let Some((ref target, ref sink)) = self.webhook {
            let payload = WebhookPayload {
                target: target.clone(),
                alert_type: alert.alert_type.to_string(),
                level: alert.level.to_string(),
                message: alert.message.clone(),
                data: alert.data.clone(),
                timestamp: alert.timestamp,
            };
            match sink.deliver(payload) {
                Ok(()) => report.delivered.push("webhook"),
                Err(e) => report.failed.push(("webhook", e.to_string())),
            }
        }

        for (channel, error) in &report.failed {
            warn!(
                event = "notification_failed",
                alert_id = %alert.id,
                channel = %channel,
                error = %error,
                "Notification channel failed"
            );
            if *channel != "durable_log" {
                let _ = self.journal.append(
                    LogKind::Notifications,
                    "notification_failed",
                    now,
                    &serde_json::json!({ "alertId": alert.id, "channel": channel, "error": error }),
                );
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertCandidate, AlertLevel, AlertType};
    use crate::testing::t0;

    struct FailingSink;

    impl WebhookSink for FailingSink {
        fn deliver(&self, _payload: WebhookPayload) -> Result<()> {
            Err(EngineError::Notification {
                channel: "webhook".into(),
                message: "connection refused".into(),
            })
        }
    }

    fn alert() -> Alert {
        Alert::from_candidate(
            AlertCandidate {
                alert_type: AlertType::SystemMemory,
                level: AlertLevel::Critical,
                message: "System memory at 90%".into(),
                data: serde_json::json!({"value": 0.9}),
            },
            t0(),
        )
    }

    fn config_with_webhook() -> NotificationConfig {
        NotificationConfig {
            webhook_url: Some("https://hooks.example.com/memwatch".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_webhook_payload_is_queued() {
        let (sink, mut rx) = QueuedWebhook::new(4);
        let notifier = Notifier::new(
            &config_with_webhook(),
            Some(Arc::new(sink)),
            Journal::disabled(),
            StructuredLogger::new("test"),
        );

        let report = notifier.notify(&alert(), t0());
        assert_eq!(report.delivered, vec!["console", "durable_log", "webhook"]);

        let payload = rx.try_recv().unwrap();
        assert_eq!(payload.alert_type, "system_memory");
        assert_eq!(payload.level, "critical");
        assert_eq!(payload.data["value"], 0.9);
    }

    #[test]
    fn test_webhook_failure_is_isolated() {
        let notifier = Notifier::new(
            &config_with_webhook(),
            Some(Arc::new(FailingSink)),
            Journal::disabled(),
            StructuredLogger::new("test"),
        );

        let report = notifier.notify(&alert(), t0());
        assert_eq!(report.delivered, vec!["console", "durable_log"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "webhook");
    }

    #[test]
    fn test_durable_failure_does_not_block_webhook() {
        let dir = tempfile::TempDir::new().unwrap();
        let (journal, worker) = Journal::new(dir.path(), 4);
        drop(worker);
        let (sink, mut rx) = QueuedWebhook::new(4);
        let notifier = Notifier::new(
            &config_with_webhook(),
            Some(Arc::new(sink)),
            journal,
            StructuredLogger::new("test"),
        );

        let report = notifier.notify(&alert(), t0());
        assert_eq!(report.failed[0].0, "durable_log");
        assert!(report.delivered.contains(&"webhook"));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_webhook_without_sink_is_disabled() {
        let notifier = Notifier::new(
            &config_with_webhook(),
            None,
            Journal::disabled(),
            StructuredLogger::new("test"),
        );
        let report = notifier.notify(&alert(), t0());
        assert!(!report.delivered.contains(&"webhook"));
        assert!(report.failed.is_empty());
    }
}
