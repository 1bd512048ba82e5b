//! Runtime fed by the host process
//!
//! Hosts with their own allocator statistics push counters before each tick.

use super::{CollectOutcome, HeapSnapshot, ReclaimHook, RuntimeControl, SnapshotFormat};
use crate::error::{EngineError, Result};
use crate::models::RawCounters;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Default)]
pub struct ReportedRuntime {
    latest: Mutex<Option<RawCounters>>,
    reclaim: Option<ReclaimHook>,
}

impl ReportedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reclaim_hook(mut self, hook: ReclaimHook) -> Self {
        self.reclaim = Some(hook);
        self
    }

    /// Replace the counters returned by the next tick
    pub fn report(&self, counters: RawCounters) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(counters);
    }
}

impl RuntimeControl for ReportedRuntime {
    fn current_counters(&self) -> Result<RawCounters> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .ok_or_else(|| EngineError::CountersUnavailable("host has not reported yet".into()))
    }

    fn force_collect(&self) -> Result<CollectOutcome> {
        let started = Instant::now();
        let reclaimed = match self.reclaim {
            Some(ref hook) => hook().map_err(|e| EngineError::Action(format!("{:#}", e)))?,
            None => 0,
        };
        Ok(CollectOutcome {
            bytes_reclaimed: reclaimed,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    fn snapshot(&self) -> Result<HeapSnapshot> {
        let counters = self.current_counters()?;
        Ok(HeapSnapshot {
            format: SnapshotFormat::Json,
            bytes: serde_json::to_vec_pretty(&serde_json::json!({
                "source": "reported",
                "counters": counters,
            }))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unavailable_until_reported() {
        let runtime = ReportedRuntime::new();
        assert!(runtime.current_counters().is_err());

        runtime.report(RawCounters {
            resident_set_size: 42,
            ..Default::default()
        });
        assert_eq!(runtime.current_counters().unwrap().resident_set_size, 42);
    }

    #[test]
    fn test_reclaim_hook_errors_become_action_errors() {
        let runtime = ReportedRuntime::new()
            .with_reclaim_hook(Arc::new(|| Err(anyhow::anyhow!("allocator busy"))));
        let err = runtime.force_collect().unwrap_err();
        assert!(matches!(err, EngineError::Action(ref m) if m.contains("allocator busy")));
    }

    #[test]
    fn test_collect_without_hook_is_noop() {
        let runtime = ReportedRuntime::new();
        assert_eq!(runtime.force_collect().unwrap().bytes_reclaimed, 0);
    }
}
