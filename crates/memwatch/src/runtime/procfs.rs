//! Linux procfs runtime
//!
//! Reads process counters from `/proc/self/status` and system counters from
//! `/proc/meminfo`. Without a heap probe the heap view is approximated:
//! - heap used = anonymous resident memory (`RssAnon`)
//! - heap total = resident set (`VmRSS`)
//! - external = file-backed plus shared resident memory

use super::{CollectOutcome, HeapSnapshot, ReclaimHook, RuntimeControl, SnapshotFormat};
use crate::error::{EngineError, Result};
use crate::models::{GcStats, RawCounters};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Heap counters reported by an allocator-aware probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapCounters {
    pub heap_total: u64,
    pub heap_used: u64,
}

pub type HeapProbe = Arc<dyn Fn() -> Option<HeapCounters> + Send + Sync>;

/// Runtime backed by the procfs of the current process
pub struct ProcFsRuntime {
    proc_path: PathBuf,
    heap_probe: Option<HeapProbe>,
    reclaim: Option<ReclaimHook>,
    last_gc: Mutex<GcStats>,
}

impl ProcFsRuntime {
    pub fn new() -> Self {
        Self::with_proc_path("/proc")
    }

    /// Create a runtime over a custom proc root (for testing)
    pub fn with_proc_path(proc_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
            heap_probe: None,
            reclaim: None,
            last_gc: Mutex::new(GcStats::default()),
        }
    }

    pub fn with_heap_probe(mut self, probe: HeapProbe) -> Self {
        self.heap_probe = Some(probe);
        self
    }

    pub fn with_reclaim_hook(mut self, hook: ReclaimHook) -> Self {
        self.reclaim = Some(hook);
        self
    }

    /// Parse `Key:   value kB` lines into bytes
    pub fn parse_kb_table(content: &str) -> HashMap<String, u64> {
        let mut values = HashMap::new();

        for line in content.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let mut parts = rest.split_whitespace();
            let Some(Ok(value)) = parts.next().map(str::parse::<u64>) else {
                continue;
            };
            let bytes = match parts.next() {
                Some("kB") => value * 1024,
                _ => value,
            };
            values.insert(key.trim().to_string(), bytes);
        }

        values
    }

    fn read_table(&self, relative: &str) -> anyhow::Result<HashMap<String, u64>> {
        let path = self.proc_path.join(relative);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::parse_kb_table(&content))
    }

    fn read_counters(&self) -> anyhow::Result<RawCounters> {
        let status = self.read_table("self/status")?;
        let meminfo = self.read_table("meminfo")?;

        let field = |table: &HashMap<String, u64>, key: &str| -> anyhow::Result<u64> {
            table
                .get(key)
                .copied()
                .with_context(|| format!("Missing {} in procfs", key))
        };

        let rss = field(&status, "VmRSS")?;
        let anon = status.get("RssAnon").copied().unwrap_or(rss);
        let external = status.get("RssFile").copied().unwrap_or(0)
            + status.get("RssShmem").copied().unwrap_or(0);

        let system_total = field(&meminfo, "MemTotal")?;
        let system_free = meminfo
            .get("MemAvailable")
            .or_else(|| meminfo.get("MemFree"))
            .copied()
            .unwrap_or(0);

        let heap = self
            .heap_probe
            .as_ref()
            .and_then(|probe| probe())
            .unwrap_or(HeapCounters {
                heap_total: rss,
                heap_used: anon.min(rss),
            });

        let gc = *self.last_gc.lock().unwrap_or_else(|e| e.into_inner());

        Ok(RawCounters {
            resident_set_size: rss,
            heap_total: heap.heap_total,
            heap_used: heap.heap_used,
            external_memory: external,
            system_total,
            system_free,
            gc_bytes_reclaimed: gc.bytes_reclaimed,
            gc_duration_ms: gc.duration_ms,
        })
    }
}

impl Default for ProcFsRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeControl for ProcFsRuntime {
    fn current_counters(&self) -> Result<RawCounters> {
        self.read_counters()
            .map_err(|e| EngineError::CountersUnavailable(format!("{:#}", e)))
    }

    fn force_collect(&self) -> Result<CollectOutcome> {
        let hook = self
            .reclaim
            .as_ref()
            .ok_or(EngineError::Unsupported("forced collection"))?;

        let started = Instant::now();
        let reclaimed = hook().map_err(|e| EngineError::Action(format!("{:#}", e)))?;
        let outcome = CollectOutcome {
            bytes_reclaimed: reclaimed,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        *self.last_gc.lock().unwrap_or_else(|e| e.into_inner()) = GcStats {
            bytes_reclaimed: outcome.bytes_reclaimed,
            duration_ms: outcome.duration_ms,
        };
        Ok(outcome)
    }

    fn snapshot(&self) -> Result<HeapSnapshot> {
        let path = self.proc_path.join("self/status");
        let status = std::fs::read_to_string(&path)?;
        let counters = self.current_counters()?;

        let body = serde_json::json!({
            "source": "procfs",
            "counters": counters,
            "status": Self::parse_kb_table(&status),
        });

        Ok(HeapSnapshot {
            format: SnapshotFormat::Json,
            bytes: serde_json::to_vec_pretty(&body)?,
        })
    }
}
