//! Cross-component scenarios for the integration hub

use super::*;
use crate::alerts::AlertType;
use crate::clock::SystemClock;
use crate::health::{ComponentStatus, HealthRegistry};
use crate::models::TrendDirection;
use crate::optimizer::{ActionType, Priority, RecommendationType};
use crate::sync::WatchSyncTarget;
use crate::testing::{t0, FakeRuntime};
use std::time::Duration as StdDuration;
use tempfile::TempDir;
use tokio::sync::broadcast;

const TICK_SECS: i64 = 5;

fn engine(config: EngineConfig, runtime: Arc<FakeRuntime>) -> MemoryHealthEngine {
    MemoryHealthEngine::builder(config, runtime)
        .instance("test-host")
        .build(t0())
}

/// Utilization rising linearly from 0.70 to 0.97 over twelve ticks, resident
/// memory growing 1% per tick, collections reclaiming nothing
fn rising_pressure(runtime: &FakeRuntime) {
    let mut rss = 100_000_000_u64;
    for i in 0..12 {
        let utilization = 0.70 + 0.27 * i as f64 / 11.0;
        runtime.push(FakeRuntime::counters(rss, rss * 6 / 10, rss, utilization));
        rss += rss / 100;
    }
}

fn at(tick: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(tick * TICK_SECS)
}

#[test]
fn test_twelve_tick_pressure_scenario() {
    let runtime = Arc::new(FakeRuntime::new());
    rising_pressure(&runtime);
    let mut engine = engine(EngineConfig::default(), runtime.clone());
    let mut leaks = engine.events().subscribe_leaks();
    let mut alert_events = engine.events().subscribe_alerts();
    let mut rec_events = engine.events().subscribe_recommendations();
    let mut threshold_events = engine.events().subscribe_thresholds();

    let mut system_alerts = Vec::new();
    let mut recommendations = Vec::new();
    for tick in 0..12 {
        let outcome = engine.run_cycle(at(tick)).unwrap();
        for alert in outcome.alerts {
            if alert.alert_type == AlertType::SystemMemory {
                system_alerts.push((tick, alert.level));
            }
        }
        recommendations.extend(outcome.recommendations);
    }

    assert_eq!(
        system_alerts,
        vec![
            (3, AlertLevel::Warning),
            (7, AlertLevel::Critical),
            (11, AlertLevel::Emergency),
        ]
    );

    let mut gc_inefficiency = false;
    while let Ok(signal) = leaks.try_recv() {
        gc_inefficiency |= signal.gc_inefficiency.detected;
    }
    assert!(gc_inefficiency);

    let mut published_alerts = 0;
    while alert_events.try_recv().is_ok() {
        published_alerts += 1;
    }
    assert!(published_alerts >= system_alerts.len());
    assert!(threshold_events.try_recv().is_ok());
    assert_eq!(
        rec_events.try_recv().unwrap().id,
        recommendations[0].id
    );

    assert!(recommendations.iter().any(|r| {
        r.rec_type == RecommendationType::MemoryPressure
            && r.priority >= Priority::Critical
            && r
                .actions
                .iter()
                .any(|a| a.action_type == ActionType::ForceGc && a.automated)
    }));
}

#[test]
fn test_status_after_scenario() {
    let runtime = Arc::new(FakeRuntime::new());
    rising_pressure(&runtime);
    let mut engine = engine(EngineConfig::default(), runtime.clone());
    engine.start(t0());
    for tick in 0..12 {
        engine.run_cycle(at(tick)).unwrap();
    }

    let status = engine.status(at(11));
    assert_eq!(status.status, RunState::Running);
    assert!(status.monitoring.active);
    assert_eq!(status.monitoring.samples_collected, 12);
    assert_eq!(status.monitoring.last_update, Some(at(11)));
    assert_eq!(status.alerts.total, engine.alerts().history_len());
    assert!(status.alerts.critical >= 2);
    assert!(status.alerts.recent.len() <= RECENT_ALERTS);
    assert_eq!(status.sessions.total, 1);
    assert_eq!(status.sessions.active, 1);
    assert!(status.optimizations.top.len() <= TOP_RECOMMENDATIONS);
    // twelve samples do not fill two trend windows yet
    assert!(status.memory.trend.is_none());
    assert_eq!(
        status.health_status,
        Some(HealthLabel::for_score(engine.health_score()))
    );

    let json = serde_json::to_value(&status).unwrap();
    assert!(json["optimizations"]["totalRecommendations"].is_number());
    assert!(json["monitoring"]["samplesCollected"].is_number());

    let mut rss = 115_000_000_u64;
    for tick in 12..20 {
        runtime.push(FakeRuntime::counters(rss, rss * 6 / 10, rss, 0.97));
        rss += rss / 100;
        engine.run_cycle(at(tick)).unwrap();
    }
    assert_eq!(
        engine.status(at(19)).memory.trend.map(|t| t.direction),
        Some(TrendDirection::Increasing)
    );
}

#[test]
fn test_collection_failure_degrades_then_recovers() {
    let runtime = Arc::new(FakeRuntime::new());
    let mut engine = engine(EngineConfig::default(), runtime.clone());
    let mut errors = engine.events().subscribe_errors();
    engine.start(t0());

    runtime.set_unavailable(true);
    assert!(engine.run_cycle(at(0)).is_err());
    assert_eq!(engine.state(), RunState::Degraded);
    assert_eq!(errors.try_recv().unwrap().component, "sampler");

    runtime.set_unavailable(false);
    runtime.push(FakeRuntime::counters(1000, 500, 1000, 0.3));
    engine.run_cycle(at(1)).unwrap();
    assert_eq!(engine.state(), RunState::Running);
    assert_eq!(engine.sampler().collection_errors(), 1);
}

#[test]
fn test_scheduled_tasks_run_in_order() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.push(FakeRuntime::counters(1000, 500, 1000, 0.3));
    let mut config = EngineConfig::default();
    config.sampling.interval_ms = 10_000;
    config.integration.status_interval_secs = 10;
    config.integration.sync_interval_secs = 30;
    let mut engine = engine(config, runtime);
    engine.start(t0());

    assert_eq!(engine.next_deadline(), Some(t0() + Duration::seconds(10)));
    let ran: Vec<TaskKind> = engine
        .run_due(t0() + Duration::seconds(10))
        .into_iter()
        .map(|(kind, _)| kind)
        .collect();
    assert_eq!(ran, vec![TaskKind::StatusUpdate, TaskKind::Sample]);

    let effects = engine.run_due(t0() + Duration::seconds(30));
    assert!(effects
        .iter()
        .any(|(kind, effect)| *kind == TaskKind::Sync && matches!(effect, TaskEffect::Sync(_))));
}

#[test]
fn test_stop_sampling_keeps_history() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.push(FakeRuntime::counters(1000, 500, 1000, 0.3));
    let mut engine = engine(EngineConfig::default(), runtime);
    engine.start(t0());
    engine.run_cycle(at(0)).unwrap();

    assert!(engine.stop_sampling());
    assert!(!engine.stop_sampling());
    assert_eq!(engine.sampler().history().len(), 1);
    assert!(!engine.status(at(1)).monitoring.active);
    assert!(engine.start_sampling(at(1)));
}

#[test]
fn test_retention_sweep_drops_old_resolved_alerts() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.push(FakeRuntime::counters(1000, 500, 1000, 0.9));
    let mut config = EngineConfig::default();
    config.retention.max_recommendations = 3;
    let mut engine = engine(config, runtime);

    let outcome = engine.run_cycle(at(0)).unwrap();
    let alert_id = outcome.alerts[0].id.clone();
    assert!(engine.resolve_alert(&alert_id, "ops", at(1)));
    assert!(!engine.resolve_alert(&alert_id, "ops", at(2)));

    let later = at(0) + Duration::days(8);
    let report = engine.retention_sweep(later);
    assert_eq!(report.alerts, 1);
    assert!(engine.alerts().get(&alert_id).is_none());
    assert!(engine.optimizer().recommendation_count() <= 3);
}

#[test]
fn test_sync_summary_reflects_engine() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.push(FakeRuntime::counters(1000, 500, 1000, 0.9));
    let mut engine = engine(EngineConfig::default(), runtime);
    engine.run_cycle(at(0)).unwrap();

    let summary = engine.sync_summary(at(0));
    assert_eq!(summary.instance, "test-host");
    assert_eq!(summary.active_alerts, engine.alerts().active_count());
    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.health_score, engine.health_score());
}

fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.sampling.interval_ms = 20;
    config.sampling.readiness_timeout_ms = 200;
    config.integration.status_interval_secs = 1;
    config.integration.sync_interval_secs = 1;
    config
}

#[tokio::test]
async fn test_runner_samples_and_serves_commands() {
    let dir = TempDir::new().unwrap();
    let (journal, worker) = Journal::new(dir.path(), 64);
    let worker_task = tokio::spawn(worker.run());

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push(FakeRuntime::counters(1000, 500, 1000, 0.9));
    let engine = MemoryHealthEngine::builder(fast_config(), runtime)
        .journal(journal)
        .build(Utc::now());
    let health = HealthRegistry::new();
    let (target, mut summaries) = WatchSyncTarget::new();
    let (runner, handle) = EngineRunner::new(engine, Arc::new(SystemClock), health.clone());
    let runner = runner.with_sync_target(Arc::new(target));

    let mut samples = handle.events().subscribe_samples();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(runner.run(shutdown_rx));

    tokio::time::timeout(StdDuration::from_secs(2), samples.recv())
        .await
        .expect("no sample within timeout")
        .unwrap();

    let alerts = handle.alerts(true).await.unwrap();
    assert!(alerts
        .iter()
        .any(|a| a.alert_type == AlertType::SystemMemory));
    assert!(handle.acknowledge_alert(&alerts[0].id, "ops").await.unwrap());
    assert!(!handle.acknowledge_alert("missing", "ops").await.unwrap());
    assert!(!handle.recommendations(10).await.unwrap().is_empty());
    assert!(handle.current_status().await.unwrap().monitoring.active);
    assert!(health.readiness().await.ready);

    tokio::time::timeout(StdDuration::from_secs(3), summaries.changed())
        .await
        .expect("no sync summary within timeout")
        .unwrap();

    let mut updates = handle.subscribe_status();
    updates.borrow_and_update();
    assert!(handle.stop_sampling().await.unwrap());
    assert!(updates.has_changed().unwrap());
    assert!(!updates.borrow().monitoring.active);
    assert!(!handle.status().monitoring.active);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(handle.status().status, RunState::Stopped);
    drop(handle);
    worker_task.abort();
}

#[tokio::test]
async fn test_runner_starts_degraded_without_metrics() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.set_unavailable(true);
    let engine = MemoryHealthEngine::builder(fast_config(), runtime).build(Utc::now());
    let health = HealthRegistry::new();
    let (runner, handle) = EngineRunner::new(engine, Arc::new(SystemClock), health.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(runner.run(shutdown_rx));

    let status = handle.current_status().await.unwrap();
    assert_eq!(status.status, RunState::Degraded);

    let report = health.health().await;
    assert_eq!(
        report.components[crate::health::components::SAMPLER].status,
        ComponentStatus::Degraded
    );
    assert!(health.readiness().await.ready);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}
