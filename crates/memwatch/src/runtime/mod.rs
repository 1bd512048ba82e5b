//! Runtime capability used by the engine
//!
//! The engine never reaches into process internals directly. Everything it
//! needs from the host runtime goes through [`RuntimeControl`]:
//! - raw memory counters for a sampling tick
//! - a forced collection cycle
//! - a heap snapshot (binary when the runtime can produce one, JSON otherwise)

mod procfs;
mod reported;

pub use procfs::{HeapCounters, HeapProbe, ProcFsRuntime};
pub use reported::ReportedRuntime;

use crate::error::{EngineError, Result};
use crate::journal::Journal;
use crate::models::RawCounters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Delay between probes while waiting for the first counters
const READINESS_POLL: Duration = Duration::from_millis(250);

/// Hook that runs a collection cycle and returns the bytes it reclaimed
pub type ReclaimHook = Arc<dyn Fn() -> anyhow::Result<u64> + Send + Sync>;

/// Result of a forced collection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollectOutcome {
    pub bytes_reclaimed: u64,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    Binary,
    Json,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Binary => "heapsnapshot",
            SnapshotFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeapSnapshot {
    pub format: SnapshotFormat,
    pub bytes: Vec<u8>,
}

/// Capability interface over the host runtime
pub trait RuntimeControl: Send + Sync {
    /// Counters for the current tick
    fn current_counters(&self) -> Result<RawCounters>;

    /// Run a collection cycle now
    fn force_collect(&self) -> Result<CollectOutcome>;

    /// Capture a heap snapshot
    fn snapshot(&self) -> Result<HeapSnapshot>;
}

/// Wait until the runtime can report counters, bounded by `timeout`.
///
/// Returns [`EngineError::NotReady`] when the bound elapses; callers are
/// expected to continue in degraded mode.
pub async fn wait_for_counters(
    runtime: &dyn RuntimeControl,
    timeout: Duration,
) -> Result<RawCounters> {
    let probe = async {
        loop {
            match runtime.current_counters() {
                Ok(counters) => return counters,
                Err(e) => {
                    debug!(error = %e, "Metrics source not ready yet");
                    tokio::time::sleep(READINESS_POLL).await;
                }
            }
        }
    };

    tokio::time::timeout(timeout, probe)
        .await
        .map_err(|_| EngineError::NotReady(timeout))
}

/// Take a heap snapshot and queue it under `snapshots/`
pub fn capture_snapshot(
    runtime: &dyn RuntimeControl,
    journal: &Journal,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let snapshot = runtime.snapshot()?;
    let path = journal.write_artifact(
        format!(
            "snapshots/heap-{}.{}",
            now.format("%Y%m%dT%H%M%S%.3fZ"),
            snapshot.format.extension()
        ),
        snapshot.bytes,
    )?;
    info!(path = %path.display(), format = ?snapshot.format, "Heap snapshot captured");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;

    #[tokio::test]
    async fn test_wait_returns_once_counters_available() {
        let runtime = FakeRuntime::new();
        runtime.push(FakeRuntime::counters(100, 50, 80, 0.5));

        let counters = wait_for_counters(&runtime, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(counters.resident_set_size, 100);
    }

    #[tokio::test]
    async fn test_wait_times_out_into_not_ready() {
        let runtime = FakeRuntime::new();
        runtime.set_unavailable(true);

        let timeout = Duration::from_millis(300);
        let err = wait_for_counters(&runtime, timeout).await.unwrap_err();
        assert!(matches!(err, EngineError::NotReady(d) if d == timeout));
    }

    #[tokio::test]
    async fn test_capture_snapshot_writes_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let (journal, mut worker) = Journal::new(dir.path(), 4);
        let runtime = FakeRuntime::new();

        let path = capture_snapshot(&runtime, &journal, Utc::now()).unwrap();
        assert!(path.starts_with(dir.path().join("snapshots")));
        assert_eq!(path.extension().unwrap(), "heapsnapshot");

        worker.flush_pending().await;
        assert_eq!(std::fs::read(&path).unwrap().len(), 16);
    }
}
