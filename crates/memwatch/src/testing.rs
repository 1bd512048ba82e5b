//! Test doubles shared by the unit tests

use crate::config::FragmentationBands;
use crate::error::{EngineError, Result};
use crate::models::{MetricSample, RawCounters};
use crate::runtime::{CollectOutcome, HeapSnapshot, RuntimeControl, SnapshotFormat};
use crate::sampler::build_sample;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const SYSTEM_TOTAL: u64 = 16 * 1024 * 1024 * 1024;

/// Scripted runtime: returns queued counters in order, then repeats the last
#[derive(Default)]
pub struct FakeRuntime {
    queue: Mutex<VecDeque<RawCounters>>,
    last: Mutex<Option<RawCounters>>,
    unavailable: AtomicBool,
    fail_collect: AtomicBool,
    fail_snapshot: AtomicBool,
    collect_calls: AtomicUsize,
    snapshot_calls: AtomicUsize,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters with the given process view and system utilization
    pub fn counters(rss: u64, heap_used: u64, heap_total: u64, utilization: f64) -> RawCounters {
        RawCounters {
            resident_set_size: rss,
            heap_total,
            heap_used,
            external_memory: 0,
            system_total: SYSTEM_TOTAL,
            system_free: (SYSTEM_TOTAL as f64 * (1.0 - utilization)).round() as u64,
            gc_bytes_reclaimed: 0,
            gc_duration_ms: 0.0,
        }
    }

    pub fn push(&self, counters: RawCounters) {
        self.queue.lock().unwrap().push_back(counters);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_collect_failure(&self, fail: bool) {
        self.fail_collect.store(fail, Ordering::SeqCst);
    }

    pub fn set_snapshot_failure(&self, fail: bool) {
        self.fail_snapshot.store(fail, Ordering::SeqCst);
    }

    pub fn collect_calls(&self) -> usize {
        self.collect_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }
}

impl RuntimeControl for FakeRuntime {
    fn current_counters(&self) -> Result<RawCounters> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::CountersUnavailable("fake runtime offline".into()));
        }

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.ok_or_else(|| EngineError::CountersUnavailable("nothing scripted".into()))
    }

    fn force_collect(&self) -> Result<CollectOutcome> {
        self.collect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_collect.load(Ordering::SeqCst) {
            return Err(EngineError::Action("collector crashed".into()));
        }
        Ok(CollectOutcome {
            bytes_reclaimed: 1_024,
            duration_ms: 1.5,
        })
    }

    fn snapshot(&self) -> Result<HeapSnapshot> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_snapshot.load(Ordering::SeqCst) {
            return Err(EngineError::Action("snapshot unavailable".into()));
        }
        Ok(HeapSnapshot {
            format: SnapshotFormat::Binary,
            bytes: vec![0xAB; 16],
        })
    }
}

pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
        .map(|t| t.with_timezone(&Utc))
        .unwrap()
}

/// Sample `secs` after [`t0`] with the given process view and system utilization
pub fn sample_with(
    secs: i64,
    rss: u64,
    heap_used: u64,
    heap_total: u64,
    utilization: f64,
) -> MetricSample {
    build_sample(
        &FakeRuntime::counters(rss, heap_used, heap_total, utilization),
        &FragmentationBands::default(),
        "test-session".to_string(),
        t0() + Duration::seconds(secs),
    )
}

/// Sample with a half-used heap and a quiet system
pub fn sample_at(secs: i64, rss: u64) -> MetricSample {
    sample_with(secs, rss, rss / 2, rss, 0.4)
}

/// Sample whose last collection reclaimed `efficiency` of the used heap
pub fn sample_with_gc(secs: i64, rss: u64, efficiency: f64) -> MetricSample {
    let mut sample = sample_at(secs, rss);
    sample.gc.bytes_reclaimed = (sample.process.heap_used as f64 * efficiency) as u64;
    sample
}
