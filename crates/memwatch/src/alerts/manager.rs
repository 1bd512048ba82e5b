//! Cooldown-gated alert lifecycle
//!
//! Per (type, level) key: quiet -> fired -> acknowledged / resolved. A
//! condition whose key fired less than one cooldown ago is dropped without a
//! history entry or any action.

use super::actions::STATE_DUMP_ALERTS;
use super::{ActionDispatcher, Alert, AlertCandidate, AlertKey, AlertLevel, AlertType, Notifier};
use crate::anomaly::{LeakSignal, ThresholdEvent, ThresholdMetric};
use crate::config::{CooldownConfig, EngineConfig, RetentionConfig};
use crate::events::EventBus;
use crate::journal::{Journal, LogKind};
use crate::models::MetricSample;
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::sampler::TickOutcome;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::{debug, warn};

pub struct AlertManager {
    cooldowns: CooldownConfig,
    retention: RetentionConfig,
    notifications_enabled: bool,
    history: VecDeque<Alert>,
    active: BTreeSet<String>,
    last_fired: HashMap<AlertKey, DateTime<Utc>>,
    suppressed: u64,
    dispatcher: ActionDispatcher,
    notifier: Notifier,
    events: EventBus,
    journal: Journal,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl AlertManager {
    pub fn new(
        config: &EngineConfig,
        dispatcher: ActionDispatcher,
        notifier: Notifier,
        events: EventBus,
        journal: Journal,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            cooldowns: config.cooldowns.clone(),
            retention: config.retention.clone(),
            notifications_enabled: config.actions.notifications,
            history: VecDeque::new(),
            active: BTreeSet::new(),
            last_fired: HashMap::new(),
            suppressed: 0,
            dispatcher,
            notifier,
            events,
            journal,
            metrics: EngineMetrics::new(),
            logger,
        }
    }

    /// Raise every alert a tick qualifies for; returns the ones dispatched
    pub fn evaluate(&mut self, outcome: &TickOutcome, now: DateTime<Utc>) -> Vec<Alert> {
        let mut candidates: Vec<AlertCandidate> = outcome
            .thresholds
            .iter()
            .map(|event| threshold_candidate(event, &outcome.sample))
            .collect();

        if let Some(ref signal) = outcome.leak {
            candidates.extend(leak_candidates(signal, outcome.leak_escalated));
        }

        candidates
            .into_iter()
            .filter_map(|c| self.raise(c, Some(outcome.sample.as_ref()), outcome.leak.as_ref(), now))
            .collect()
    }

    /// Fire one candidate unless its key is cooling down
    pub fn raise(
        &mut self,
        candidate: AlertCandidate,
        sample: Option<&MetricSample>,
        leak: Option<&LeakSignal>,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let key = candidate.key();
        let cooldown = self.cooldown(candidate.level);

        if let Some(last) = self.last_fired.get(&key) {
            let elapsed = now - *last;
            if elapsed < cooldown {
                self.suppressed += 1;
                self.metrics.inc_alerts_suppressed();
                self.logger.log_alert_suppressed(
                    key.alert_type.as_str(),
                    key.level.as_str(),
                    (cooldown - elapsed).num_seconds(),
                );
                return None;
            }
        }
        self.last_fired.insert(key, now);

        let mut alert = Alert::from_candidate(candidate, now);
        let recent: Vec<&Alert> = self.history.iter().rev().take(STATE_DUMP_ALERTS).collect();
        alert.actions = self.dispatcher.dispatch(&alert, sample, leak, &recent, now);

        if self.notifications_enabled {
            self.notifier.notify(&alert, now);
        }
        if let Err(e) = self.journal.append(LogKind::Alerts, "alert_fired", now, &alert) {
            warn!(alert_id = %alert.id, error = %e, "Failed to journal alert");
        }
        self.metrics.inc_alerts_fired(alert.level.as_str());

        self.active.insert(alert.id.clone());
        self.history.push_back(alert.clone());
        self.trim_history();
        self.events.publish_alert(alert.clone());

        Some(alert)
    }

    /// Mark an alert acknowledged. False if unknown or already acknowledged.
    pub fn acknowledge(&mut self, id: &str, actor: &str, now: DateTime<Utc>) -> bool {
        let Some(alert) = self.history.iter_mut().rev().find(|a| a.id == id) else {
            return false;
        };
        if alert.acknowledged {
            return false;
        }

        alert.acknowledged = true;
        alert.acknowledged_by = Some(actor.to_string());
        alert.acknowledged_at = Some(now);
        let entry = serde_json::json!({ "alertId": id, "by": actor });
        if let Err(e) = self.journal.append(LogKind::Alerts, "alert_acknowledged", now, &entry) {
            warn!(alert_id = %id, error = %e, "Failed to journal acknowledgement");
        }
        true
    }

    /// Resolve an alert and drop it from the active set.
    ///
    /// False if unknown or already resolved; history is left untouched.
    pub fn resolve(&mut self, id: &str, actor: &str, now: DateTime<Utc>) -> bool {
        let Some(alert) = self.history.iter_mut().rev().find(|a| a.id == id) else {
            return false;
        };
        if alert.resolved {
            return false;
        }

        alert.resolved = true;
        alert.resolved_by = Some(actor.to_string());
        alert.resolved_at = Some(now);
        self.active.remove(id);
        let entry = serde_json::json!({ "alertId": id, "by": actor });
        if let Err(e) = self.journal.append(LogKind::Alerts, "alert_resolved", now, &entry) {
            warn!(alert_id = %id, error = %e, "Failed to journal resolution");
        }
        true
    }

    /// Drop resolved alerts older than `retention_days`; returns how many
    pub fn sweep(&mut self, retention_days: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(retention_days);
        let before = self.history.len();
        self.history
            .retain(|a| !(a.resolved && a.timestamp < cutoff));
        let removed = before - self.history.len();
        if removed > 0 {
            debug!(removed, "Swept resolved alerts past retention");
        }
        removed
    }

    fn trim_history(&mut self) {
        if self.history.len() <= self.retention.max_alert_history {
            return;
        }
        let excess = self.history.len() - self.retention.alert_history_trim_to;
        for dropped in self.history.drain(..excess) {
            self.active.remove(&dropped.id);
        }
    }

    fn cooldown(&self, level: AlertLevel) -> Duration {
        let secs = match level {
            AlertLevel::Warning => self.cooldowns.warning_secs,
            AlertLevel::Critical => self.cooldowns.critical_secs,
            AlertLevel::Emergency => self.cooldowns.emergency_secs,
        };
        Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000_000))
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.history.iter().rev().find(|a| a.id == id)
    }

    /// Unresolved alerts, newest first
    pub fn active(&self) -> Vec<&Alert> {
        self.history
            .iter()
            .rev()
            .filter(|a| self.active.contains(&a.id))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Highest level among unresolved alerts
    pub fn highest_active_level(&self) -> Option<AlertLevel> {
        self.active().iter().map(|a| a.level).max()
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<&Alert> {
        self.history.iter().rev().take(limit).collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }
}

fn threshold_candidate(event: &ThresholdEvent, sample: &MetricSample) -> AlertCandidate {
    let (alert_type, label) = match event.metric {
        ThresholdMetric::SystemMemory => (AlertType::SystemMemory, "System memory utilization"),
        ThresholdMetric::HeapUtilization => (AlertType::HeapPressure, "Heap utilization"),
        ThresholdMetric::Fragmentation => {
            (AlertType::MemoryFragmentation, "Memory fragmentation score")
        }
    };

    AlertCandidate {
        alert_type,
        level: event.level,
        message: format!(
            "{} at {:.1}% ({} threshold {:.0}%)",
            label,
            event.value * 100.0,
            event.level,
            event.threshold * 100.0
        ),
        data: serde_json::json!({
            "value": event.value,
            "threshold": event.threshold,
            "sessionId": sample.session_id,
            "residentSetSize": sample.process.resident_set_size,
            "heapUsed": sample.process.heap_used,
            "heapTotal": sample.process.heap_total,
        }),
    }
}

fn leak_candidates(signal: &LeakSignal, escalated: bool) -> Vec<AlertCandidate> {
    let patterns = [
        (
            signal.sustained_growth,
            AlertType::SustainedGrowth,
            "Sustained memory growth",
        ),
        (
            signal.staircase,
            AlertType::StaircasePattern,
            "Staircase memory pattern",
        ),
        (
            signal.gc_inefficiency,
            AlertType::GcInefficiency,
            "Collections reclaim little memory",
        ),
    ];

    let mut candidates: Vec<AlertCandidate> = patterns
        .iter()
        .filter(|(score, _, _)| score.detected)
        .map(|(score, alert_type, label)| AlertCandidate {
            alert_type: *alert_type,
            level: AlertLevel::Warning,
            message: format!("{} (score {:.2})", label, score.score),
            data: serde_json::json!({
                "score": score.score,
                "sessionId": signal.session_id,
                "windowSize": signal.window_size,
            }),
        })
        .collect();

    if escalated {
        candidates.push(AlertCandidate {
            alert_type: AlertType::MemoryLeak,
            level: AlertLevel::Critical,
            message: format!(
                "Probable memory leak in session {} (overall score {:.2})",
                signal.session_id, signal.overall_score
            ),
            data: serde_json::to_value(signal).unwrap_or(serde_json::Value::Null),
        });
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::actions::{FORCE_GC, LEAK_REPORT};
    use crate::runtime::RuntimeControl;
    use crate::testing::{t0, FakeRuntime};
    use std::sync::Arc;

    fn manager_with(config: EngineConfig, runtime: Arc<dyn RuntimeControl>) -> AlertManager {
        let events = EventBus::new();
        let logger = StructuredLogger::new("test");
        let journal = Journal::disabled();
        AlertManager::new(
            &config,
            ActionDispatcher::new(
                runtime,
                journal.clone(),
                events.clone(),
                config.actions.clone(),
                logger.clone(),
            ),
            Notifier::new(&config.notifications, None, journal.clone(), logger.clone()),
            events,
            journal,
            logger,
        )
    }

    fn manager() -> AlertManager {
        manager_with(EngineConfig::default(), Arc::new(FakeRuntime::new()))
    }

    fn candidate(alert_type: AlertType, level: AlertLevel) -> AlertCandidate {
        AlertCandidate {
            alert_type,
            level,
            message: "condition".into(),
            data: serde_json::Value::Null,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    #[test]
    fn test_cooldown_suppresses_same_key() {
        let mut config = EngineConfig::default();
        config.cooldowns.warning_secs = 60;
        let mut alerts = manager_with(config, Arc::new(FakeRuntime::new()));
        let c = || candidate(AlertType::SystemMemory, AlertLevel::Warning);

        assert!(alerts.raise(c(), None, None, at(0)).is_some());
        assert!(alerts.raise(c(), None, None, at(30)).is_none());
        assert!(alerts.raise(c(), None, None, at(61)).is_some());

        assert_eq!(alerts.history_len(), 2);
        assert_eq!(alerts.suppressed_count(), 1);
    }

    #[test]
    fn test_cooldown_is_per_key() {
        let mut alerts = manager();
        assert!(alerts
            .raise(candidate(AlertType::SystemMemory, AlertLevel::Warning), None, None, at(0))
            .is_some());
        assert!(alerts
            .raise(candidate(AlertType::SystemMemory, AlertLevel::Critical), None, None, at(1))
            .is_some());
        assert!(alerts
            .raise(candidate(AlertType::HeapPressure, AlertLevel::Warning), None, None, at(2))
            .is_some());
        assert_eq!(alerts.active_count(), 3);
        assert_eq!(alerts.highest_active_level(), Some(AlertLevel::Critical));
    }

    #[test]
    fn test_dispatch_records_actions() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut alerts = manager_with(EngineConfig::default(), runtime.clone());

        let alert = alerts
            .raise(candidate(AlertType::HeapPressure, AlertLevel::Critical), None, None, at(0))
            .unwrap();
        assert_eq!(alert.actions, vec![FORCE_GC]);
        assert_eq!(runtime.collect_calls(), 1);
    }

    #[test]
    fn test_resolve_twice_is_noop() {
        let mut alerts = manager();
        let alert = alerts
            .raise(candidate(AlertType::SystemMemory, AlertLevel::Warning), None, None, at(0))
            .unwrap();

        assert!(alerts.resolve(&alert.id, "ops", at(10)));
        assert!(!alerts.resolve(&alert.id, "ops", at(20)));
        assert!(!alerts.resolve("missing", "ops", at(20)));

        assert_eq!(alerts.history_len(), 1);
        assert_eq!(alerts.active_count(), 0);
        let stored = alerts.get(&alert.id).unwrap();
        assert_eq!(stored.resolved_by.as_deref(), Some("ops"));
        assert_eq!(stored.resolved_at, Some(at(10)));
    }

    #[test]
    fn test_acknowledge_keeps_alert_active() {
        let mut alerts = manager();
        let alert = alerts
            .raise(candidate(AlertType::SystemMemory, AlertLevel::Warning), None, None, at(0))
            .unwrap();

        assert!(alerts.acknowledge(&alert.id, "alice", at(5)));
        assert!(!alerts.acknowledge(&alert.id, "bob", at(6)));
        assert_eq!(alerts.active_count(), 1);
        assert_eq!(
            alerts.get(&alert.id).unwrap().acknowledged_by.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_history_collapses_to_tail() {
        let mut config = EngineConfig::default();
        config.cooldowns.warning_secs = 0;
        let mut alerts = manager_with(config, Arc::new(FakeRuntime::new()));

        for i in 0..1_001 {
            alerts.raise(
                candidate(AlertType::SystemMemory, AlertLevel::Warning),
                None,
                None,
                at(i),
            );
        }

        assert_eq!(alerts.history_len(), 500);
        assert_eq!(alerts.active_count(), 500);
        let newest = alerts.recent(1)[0];
        assert_eq!(newest.timestamp, at(1_000));
        let oldest = alerts.recent(500)[499];
        assert_eq!(oldest.timestamp, at(501));
    }

    #[test]
    fn test_sweep_drops_only_old_resolved() {
        let mut alerts = manager();
        let old = alerts
            .raise(candidate(AlertType::SystemMemory, AlertLevel::Warning), None, None, at(0))
            .unwrap();
        let old_open = alerts
            .raise(candidate(AlertType::HeapPressure, AlertLevel::Warning), None, None, at(0))
            .unwrap();
        alerts.resolve(&old.id, "ops", at(1));

        let later = at(0) + Duration::days(8);
        let fresh = alerts
            .raise(candidate(AlertType::SystemMemory, AlertLevel::Warning), None, None, later)
            .unwrap();
        alerts.resolve(&fresh.id, "ops", later);

        assert_eq!(alerts.sweep(7, later), 1);
        assert!(alerts.get(&old.id).is_none());
        assert!(alerts.get(&old_open.id).is_some());
        assert!(alerts.get(&fresh.id).is_some());
    }

    #[test]
    fn test_escalated_leak_raises_critical_leak_alert() {
        use crate::anomaly::PatternScore;

        let signal = LeakSignal {
            timestamp: at(0),
            session_id: "s".into(),
            window_size: 10,
            sustained_growth: PatternScore { detected: true, score: 1.0 },
            staircase: PatternScore { detected: false, score: 0.2 },
            gc_inefficiency: PatternScore { detected: true, score: 1.0 },
            overall_score: 0.73,
            slope_bytes_per_sec: 1.0,
            mean_gc_efficiency: 0.0,
        };
        let candidates = leak_candidates(&signal, true);
        let kinds: Vec<_> = candidates.iter().map(|c| (c.alert_type, c.level)).collect();
        assert_eq!(
            kinds,
            vec![
                (AlertType::SustainedGrowth, AlertLevel::Warning),
                (AlertType::GcInefficiency, AlertLevel::Warning),
                (AlertType::MemoryLeak, AlertLevel::Critical),
            ]
        );

        let mut alerts = manager();
        let leak = candidates.into_iter().last().unwrap();
        let alert = alerts.raise(leak, None, Some(&signal), at(0)).unwrap();
        assert_eq!(alert.actions, vec![LEAK_REPORT]);
    }
}
