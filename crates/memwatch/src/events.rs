//! Typed event channels
//!
//! One broadcast channel per category. Publishing never blocks and never
//! fails: with no subscribers the event is dropped, and slow subscribers see
//! `RecvError::Lagged` rather than holding up the engine.

use crate::alerts::Alert;
use crate::anomaly::{LeakSignal, ThresholdEvent};
use crate::models::MetricSample;
use crate::optimizer::Recommendation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// A recoverable failure inside one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub message: String,
}

/// Request from the emergency path to stop the host process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownRequest {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub grace: Duration,
    /// State dump written before the request was raised
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    samples: broadcast::Sender<Arc<MetricSample>>,
    leaks: broadcast::Sender<LeakSignal>,
    thresholds: broadcast::Sender<ThresholdEvent>,
    alerts: broadcast::Sender<Alert>,
    recommendations: broadcast::Sender<Recommendation>,
    errors: broadcast::Sender<ErrorEvent>,
    shutdown: broadcast::Sender<ShutdownRequest>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            samples: broadcast::channel(CHANNEL_CAPACITY).0,
            leaks: broadcast::channel(CHANNEL_CAPACITY).0,
            thresholds: broadcast::channel(CHANNEL_CAPACITY).0,
            alerts: broadcast::channel(CHANNEL_CAPACITY).0,
            recommendations: broadcast::channel(CHANNEL_CAPACITY).0,
            errors: broadcast::channel(CHANNEL_CAPACITY).0,
            shutdown: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn publish_sample(&self, sample: Arc<MetricSample>) {
        let _ = self.samples.send(sample);
    }

    pub fn publish_leak(&self, signal: LeakSignal) {
        let _ = self.leaks.send(signal);
    }

    pub fn publish_threshold(&self, event: ThresholdEvent) {
        let _ = self.thresholds.send(event);
    }

    pub fn publish_alert(&self, alert: Alert) {
        let _ = self.alerts.send(alert);
    }

    pub fn publish_recommendation(&self, recommendation: Recommendation) {
        let _ = self.recommendations.send(recommendation);
    }

    pub fn publish_error(&self, component: &str, message: impl Into<String>, now: DateTime<Utc>) {
        let _ = self.errors.send(ErrorEvent {
            timestamp: now,
            component: component.to_string(),
            message: message.into(),
        });
    }

    pub fn publish_shutdown(&self, request: ShutdownRequest) {
        let _ = self.shutdown.send(request);
    }

    pub fn subscribe_samples(&self) -> broadcast::Receiver<Arc<MetricSample>> {
        self.samples.subscribe()
    }

    pub fn subscribe_leaks(&self) -> broadcast::Receiver<LeakSignal> {
        self.leaks.subscribe()
    }

    pub fn subscribe_thresholds(&self) -> broadcast::Receiver<ThresholdEvent> {
        self.thresholds.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    pub fn subscribe_recommendations(&self) -> broadcast::Receiver<Recommendation> {
        self.recommendations.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.errors.subscribe()
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<ShutdownRequest> {
        self.shutdown.subscribe()
    }
}
