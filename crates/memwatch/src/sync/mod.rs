//! Best-effort push of the engine summary to external collaborators
//!
//! Each sync tick the runner hands the current [`SyncSummary`] to every
//! registered target on its own task. A failed push is logged and counted;
//! the next tick simply tries again.

use crate::engine::HealthLabel;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Small derived view shared with collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub timestamp: DateTime<Utc>,
    pub instance: String,
    pub health_score: f64,
    pub health_status: HealthLabel,
    pub active_alerts: usize,
    pub recommendations: usize,
    pub sessions: usize,
}

#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn push(&self, summary: &SyncSummary) -> Result<()>;
}

/// Publishes every summary on a watch channel
pub struct WatchSyncTarget {
    tx: watch::Sender<Option<SyncSummary>>,
}

impl WatchSyncTarget {
    pub fn new() -> (Self, watch::Receiver<Option<SyncSummary>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SyncTarget for WatchSyncTarget {
    fn name(&self) -> &str {
        "watch"
    }

    async fn push(&self, summary: &SyncSummary) -> Result<()> {
        self.tx
            .send(Some(summary.clone()))
            .map_err(|_| anyhow::anyhow!("no summary subscribers left"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::t0;

    fn summary() -> SyncSummary {
        SyncSummary {
            timestamp: t0(),
            instance: "host-a".into(),
            health_score: 0.9,
            health_status: HealthLabel::Excellent,
            active_alerts: 1,
            recommendations: 3,
            sessions: 2,
        }
    }

    #[tokio::test]
    async fn test_watch_target_publishes_latest() {
        let (target, mut rx) = WatchSyncTarget::new();
        target.push(&summary()).await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().recommendations, 3);
    }

    #[test]
    fn test_watch_target_fails_without_receivers() {
        let (target, rx) = WatchSyncTarget::new();
        drop(rx);
        assert!(tokio_test::block_on(target.push(&summary())).is_err());
    }

    #[test]
    fn test_summary_wire_names() {
        let value = serde_json::to_value(summary()).unwrap();
        assert_eq!(value["healthStatus"], "excellent");
        assert_eq!(value["activeAlerts"], 1);
    }
}
