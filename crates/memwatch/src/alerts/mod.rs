//! Alert lifecycle
//!
//! This module provides:
//! - Cooldown-gated alert creation per (type, level) key
//! - Severity-keyed remediation actions
//! - Notification fan-out (console, durable log, webhook)
//! - Bounded history with acknowledge/resolve and retention sweeps

mod actions;
mod manager;
mod notify;
mod types;

pub use actions::{leak_suggestions, write_leak_report, ActionDispatcher};
pub use manager::AlertManager;
pub use notify::{NotificationReport, Notifier, QueuedWebhook, WebhookPayload, WebhookSink};
pub use types::{Alert, AlertCandidate, AlertKey, AlertLevel, AlertType};
