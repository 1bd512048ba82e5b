//! Periodic sampling and detection
//!
//! Each tick, in order:
//! - collect raw counters from the runtime
//! - score fragmentation and append the sample to the history
//! - update the sample's session record
//! - compute growth against the previous sample
//! - run leak detection once the window is full
//! - evaluate threshold tiers
//! - publish the sample
//!
//! A collection failure publishes an error event and skips the tick.

mod fragmentation;
mod history;
mod sessions;
pub mod trend;

pub use fragmentation::{assess as assess_fragmentation, level_for as fragmentation_level};
pub use history::History;
pub use sessions::SessionTracker;

use crate::anomaly::{LeakDetector, LeakSignal, ThresholdEvaluator, ThresholdEvent};
use crate::config::{EngineConfig, FragmentationBands};
use crate::error::Result;
use crate::events::EventBus;
use crate::health::components;
use crate::journal::{Journal, LogKind};
use crate::models::{
    Fragmentation, GcStats, GrowthRate, MetricSample, ProcessMemory, RawCounters, SessionRecord,
    SystemMemory, Trend,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::runtime::RuntimeControl;
use crate::scheduler::{Scheduler, TaskId, TaskKind};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Everything one successful tick produced
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub sample: Arc<MetricSample>,
    pub growth: Option<GrowthRate>,
    pub leak: Option<LeakSignal>,
    /// Overall leak score crossed the escalation score
    pub leak_escalated: bool,
    pub thresholds: Vec<ThresholdEvent>,
}

pub struct Sampler {
    runtime: Arc<dyn RuntimeControl>,
    interval: Duration,
    bands: FragmentationBands,
    history: History,
    sessions: SessionTracker,
    detector: LeakDetector,
    evaluator: ThresholdEvaluator,
    events: EventBus,
    journal: Journal,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    session_id: Option<String>,
    fallback_session: String,
    task: Option<TaskId>,
    collection_errors: u64,
    last_error: Option<String>,
}

impl Sampler {
    pub fn new(
        config: &EngineConfig,
        runtime: Arc<dyn RuntimeControl>,
        events: EventBus,
        journal: Journal,
        logger: StructuredLogger,
    ) -> Self {
        let fallback_session = config
            .sampling
            .fallback_session_id
            .clone()
            .unwrap_or_else(|| format!("process-{}", std::process::id()));

        Self {
            runtime,
            interval: config.sampling.interval(),
            bands: config.thresholds.fragmentation,
            history: History::new(config.sampling.history_capacity),
            sessions: SessionTracker::new(),
            detector: LeakDetector::new(config.leak_detection.clone()),
            evaluator: ThresholdEvaluator::new(&config.thresholds),
            events,
            journal,
            metrics: EngineMetrics::new(),
            logger,
            session_id: None,
            fallback_session,
            task: None,
            collection_errors: 0,
            last_error: None,
        }
    }

    /// Register the sampling task. Starting twice only logs a warning.
    pub fn start(&mut self, scheduler: &mut Scheduler, now: DateTime<Utc>) -> bool {
        if let Some(id) = self.task {
            if scheduler.is_registered(id) {
                warn!(
                    event = "sampler_already_running",
                    "Sampler start requested while already running"
                );
                return false;
            }
        }

        self.task = Some(scheduler.register(TaskKind::Sample, self.interval, now));
        debug!(interval_ms = self.interval.as_millis() as u64, "Sampler started");
        true
    }

    /// Cancel the sampling task; the history is kept
    pub fn stop(&mut self, scheduler: &mut Scheduler) -> bool {
        match self.task.take() {
            Some(id) => {
                scheduler.cancel(id);
                debug!(samples = self.history.len(), "Sampler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Session attributed to the next samples; `None` reverts to the fallback
    pub fn set_session_id(&mut self, session_id: Option<String>) {
        self.session_id = session_id.filter(|s| !s.is_empty());
    }

    pub fn current_session(&self) -> &str {
        self.session_id.as_deref().unwrap_or(&self.fallback_session)
    }

    /// Collect counters from the runtime and process them
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let started = Instant::now();

        let counters = match self.runtime.current_counters() {
            Ok(counters) => counters,
            Err(e) => {
                self.collection_errors += 1;
                self.last_error = Some(e.to_string());
                self.metrics.inc_collection_errors();
                warn!(
                    event = "collection_failed",
                    error = %e,
                    consecutive = self.collection_errors,
                    "Skipping sampling tick"
                );
                self.events.publish_error(components::SAMPLER, e.to_string(), now);
                return Err(e);
            }
        };

        let outcome = self.ingest(counters, now);
        self.metrics
            .observe_collection_latency(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Process counters gathered elsewhere
    pub fn ingest(&mut self, counters: RawCounters, now: DateTime<Utc>) -> TickOutcome {
        self.last_error = None;

        let session_id = self.current_session().to_string();
        let sample = Arc::new(build_sample(&counters, &self.bands, session_id, now));
        let previous = self.history.latest().cloned();

        self.history.push(Arc::clone(&sample));
        self.sessions
            .observe(&sample.session_id, sample.process.resident_set_size, now);

        let growth = previous.map(|p| growth_between(&p, &sample));

        let window = self.detector.window_size();
        let (leak, leak_escalated) = if self.history.len() >= window {
            let recent: Vec<&MetricSample> = self.history.recent(window).collect();
            match self.detector.detect(&recent) {
                Some(signal) => {
                    let escalated = self.detector.is_escalation(&signal);
                    self.record_leak(&signal, escalated);
                    (Some(signal), escalated)
                }
                None => (None, false),
            }
        } else {
            (None, false)
        };

        let thresholds = self.evaluator.evaluate(&sample);
        for event in &thresholds {
            self.events.publish_threshold(event.clone());
        }

        self.metrics.record_sample(
            sample.process.resident_set_size,
            sample.process.heap_utilization,
            sample.system.utilization,
            sample.fragmentation.score,
        );
        self.events.publish_sample(Arc::clone(&sample));

        TickOutcome {
            sample,
            growth,
            leak,
            leak_escalated,
            thresholds,
        }
    }

    fn record_leak(&self, signal: &LeakSignal, escalated: bool) {
        self.metrics.set_leak_score(signal.overall_score);
        self.events.publish_leak(signal.clone());

        if signal.any_detected() || escalated {
            self.logger.log_leak_signal(
                &signal.session_id,
                signal.overall_score,
                signal.slope_bytes_per_sec,
                escalated,
            );
            let event = if escalated {
                "leak_escalated"
            } else {
                "leak_pattern_detected"
            };
            if let Err(e) = self
                .journal
                .append(LogKind::LeakDetection, event, signal.timestamp, signal)
            {
                warn!(error = %e, "Failed to journal leak signal");
            }
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub fn latest(&self) -> Option<&Arc<MetricSample>> {
        self.history.latest()
    }

    pub fn current_session_record(&self) -> Option<&SessionRecord> {
        self.sessions.get(self.current_session())
    }

    pub fn trend(&self) -> Option<Trend> {
        trend::compute(&self.history)
    }

    pub fn samples_collected(&self) -> u64 {
        self.history.total_appended()
    }

    pub fn collection_errors(&self) -> u64 {
        self.collection_errors
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn runtime(&self) -> &Arc<dyn RuntimeControl> {
        &self.runtime
    }
}

/// Turn raw counters into an immutable sample
pub fn build_sample(
    counters: &RawCounters,
    bands: &FragmentationBands,
    session_id: String,
    now: DateTime<Utc>,
) -> MetricSample {
    let fragmentation: Fragmentation = assess_fragmentation(counters, bands);
    let system_used = counters.system_total.saturating_sub(counters.system_free);

    MetricSample {
        timestamp: now,
        session_id,
        process: ProcessMemory {
            resident_set_size: counters.resident_set_size,
            heap_total: counters.heap_total,
            heap_used: counters.heap_used,
            external_memory: counters.external_memory,
            heap_utilization: fraction(counters.heap_used, counters.heap_total),
            rss_utilization: fraction(counters.resident_set_size, counters.system_total),
        },
        system: SystemMemory {
            total: counters.system_total,
            free: counters.system_free,
            used: system_used,
            utilization: fraction(system_used, counters.system_total),
        },
        gc: GcStats {
            bytes_reclaimed: counters.gc_bytes_reclaimed,
            duration_ms: counters.gc_duration_ms,
        },
        fragmentation,
    }
}

fn growth_between(previous: &MetricSample, current: &MetricSample) -> GrowthRate {
    let before = previous.process.resident_set_size;
    let after = current.process.resident_set_size;
    let bytes = after as i64 - before as i64;
    let ratio = if before == 0 {
        0.0
    } else {
        bytes as f64 / before as f64
    };
    let elapsed = (current.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0;

    GrowthRate {
        bytes,
        ratio,
        bytes_per_second: if elapsed > 0.0 { bytes as f64 / elapsed } else { 0.0 },
    }
}

fn fraction(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing::{t0, FakeRuntime};
    use chrono::Duration as ChronoDuration;

    fn sampler_with(runtime: Arc<FakeRuntime>, config: &EngineConfig) -> (Sampler, EventBus) {
        let events = EventBus::new();
        let sampler = Sampler::new(
            config,
            runtime,
            events.clone(),
            Journal::disabled(),
            StructuredLogger::new("test"),
        );
        (sampler, events)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + ChronoDuration::seconds(secs)
    }

    #[test]
    fn test_tick_builds_sample_and_session() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.push(FakeRuntime::counters(1_000, 600, 800, 0.5));
        let (mut sampler, events) = sampler_with(runtime, &EngineConfig::default());
        let mut samples = events.subscribe_samples();

        let outcome = sampler.tick(at(0)).unwrap();

        assert!((outcome.sample.process.heap_utilization - 0.75).abs() < 1e-9);
        assert!((outcome.sample.system.utilization - 0.5).abs() < 1e-6);
        assert!(outcome.growth.is_none());
        assert!(outcome.leak.is_none());
        assert_eq!(sampler.sessions().len(), 1);
        assert!(sampler.current_session().starts_with("process-"));
        assert_eq!(samples.try_recv().unwrap().timestamp, at(0));
    }

    #[test]
    fn test_growth_between_ticks() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.push(FakeRuntime::counters(1_000, 500, 1_000, 0.5));
        runtime.push(FakeRuntime::counters(1_100, 500, 1_000, 0.5));
        let (mut sampler, _) = sampler_with(runtime, &EngineConfig::default());

        sampler.tick(at(0)).unwrap();
        let growth = sampler.tick(at(5)).unwrap().growth.unwrap();

        assert_eq!(growth.bytes, 100);
        assert!((growth.ratio - 0.1).abs() < 1e-9);
        assert!((growth.bytes_per_second - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_leak_signal_once_window_full() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.push(FakeRuntime::counters(1_000_000, 500_000, 1_000_000, 0.5));
        let (mut sampler, events) = sampler_with(runtime, &EngineConfig::default());
        let mut leaks = events.subscribe_leaks();

        for i in 0..9 {
            assert!(sampler.tick(at(i * 5)).unwrap().leak.is_none());
        }
        let outcome = sampler.tick(at(45)).unwrap();

        let signal = outcome.leak.unwrap();
        assert_eq!(signal.window_size, 10);
        assert!(signal.gc_inefficiency.detected);
        assert_eq!(leaks.try_recv().unwrap().overall_score, signal.overall_score);
    }

    #[test]
    fn test_collection_failure_skips_tick() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_unavailable(true);
        let (mut sampler, events) = sampler_with(runtime.clone(), &EngineConfig::default());
        let mut errors = events.subscribe_errors();

        let err = sampler.tick(at(0)).unwrap_err();
        assert!(matches!(err, EngineError::CountersUnavailable(_)));
        assert!(sampler.history().is_empty());
        assert_eq!(sampler.collection_errors(), 1);
        assert_eq!(errors.try_recv().unwrap().component, components::SAMPLER);

        runtime.set_unavailable(false);
        runtime.push(FakeRuntime::counters(1_000, 500, 1_000, 0.5));
        assert!(sampler.tick(at(5)).is_ok());
        assert!(sampler.last_error().is_none());
    }

    #[test]
    fn test_start_twice_is_noop_and_stop_keeps_history() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.push(FakeRuntime::counters(1_000, 500, 1_000, 0.5));
        let (mut sampler, _) = sampler_with(runtime, &EngineConfig::default());
        let mut scheduler = Scheduler::new();

        assert!(sampler.start(&mut scheduler, at(0)));
        assert!(!sampler.start(&mut scheduler, at(1)));
        assert_eq!(scheduler.len(), 1);

        sampler.tick(at(5)).unwrap();
        assert!(sampler.stop(&mut scheduler));
        assert!(scheduler.is_empty());
        assert!(!sampler.is_running());
        assert_eq!(sampler.history().len(), 1);
    }

    #[test]
    fn test_session_override() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.push(FakeRuntime::counters(1_000, 500, 1_000, 0.5));
        let mut config = EngineConfig::default();
        config.sampling.fallback_session_id = Some("host".to_string());
        let (mut sampler, _) = sampler_with(runtime, &config);

        assert_eq!(sampler.tick(at(0)).unwrap().sample.session_id, "host");
        sampler.set_session_id(Some("user-42".to_string()));
        assert_eq!(sampler.tick(at(5)).unwrap().sample.session_id, "user-42");
        sampler.set_session_id(None);
        assert_eq!(sampler.current_session(), "host");
        assert_eq!(sampler.sessions().len(), 2);
    }

    #[test]
    fn test_history_respects_capacity() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.push(FakeRuntime::counters(1_000, 500, 1_000, 0.5));
        let mut config = EngineConfig::default();
        config.sampling.history_capacity = 12;
        let (mut sampler, _) = sampler_with(runtime, &config);

        for i in 0..20 {
            sampler.tick(at(i)).unwrap();
        }
        assert_eq!(sampler.history().len(), 12);
        assert_eq!(sampler.samples_collected(), 20);
    }
}
