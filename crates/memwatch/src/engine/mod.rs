//! Integration hub
//!
//! [`MemoryHealthEngine`] wires the sampler, alert manager and optimizer
//! together and owns the scheduler. It is synchronous: every operation takes
//! the current instant, and [`EngineRunner`] drives it from a tokio task.

mod runner;
mod score;
mod status;

#[cfg(test)]
mod tests;

pub use runner::{EngineCommand, EngineHandle, EngineRunner};
pub use score::{health_score, HealthLabel};
pub use status::{
    AlertStatus, MemoryStatus, MonitoringStatus, OptimizationStatus, RunState, SessionStatus,
    StatusSummary, RECENT_ALERTS, TOP_RECOMMENDATIONS,
};

use crate::alerts::{
    ActionDispatcher, Alert, AlertLevel, AlertManager, Notifier, WebhookSink,
};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::journal::Journal;
use crate::models::MetricSample;
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::optimizer::{Criticality, ImplementationResult, OptimizationEngine, Recommendation};
use crate::runtime::RuntimeControl;
use crate::sampler::Sampler;
use crate::scheduler::{Scheduler, TaskId, TaskKind};
use crate::sync::SyncSummary;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

/// Everything one sampling cycle produced
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub sample: Arc<MetricSample>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    pub implementations: Vec<ImplementationResult>,
    pub health_score: f64,
}

/// Items removed by one retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub alerts: usize,
    pub recommendations: usize,
}

/// What a due task asks of the runner
#[derive(Debug)]
pub enum TaskEffect {
    Cycle(Result<CycleOutcome>),
    PublishStatus,
    Sync(SyncSummary),
    Housekeeping,
}

/// Builder for [`MemoryHealthEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    runtime: Arc<dyn RuntimeControl>,
    journal: Journal,
    events: EventBus,
    webhook: Option<Arc<dyn WebhookSink>>,
    instance: String,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig, runtime: Arc<dyn RuntimeControl>) -> Self {
        Self {
            config,
            runtime,
            journal: Journal::disabled(),
            events: EventBus::new(),
            webhook: None,
            instance: "memwatch".to_string(),
        }
    }

    pub fn journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn webhook(mut self, sink: Arc<dyn WebhookSink>) -> Self {
        self.webhook = Some(sink);
        self
    }

    /// Instance name used in log lines and sync summaries
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn build(self, now: DateTime<Utc>) -> MemoryHealthEngine {
        let logger = StructuredLogger::new(self.instance);
        let config = self.config;

        let sampler = Sampler::new(
            &config,
            Arc::clone(&self.runtime),
            self.events.clone(),
            self.journal.clone(),
            logger.clone(),
        );
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&self.runtime),
            self.journal.clone(),
            self.events.clone(),
            config.actions.clone(),
            logger.clone(),
        );
        let notifier = Notifier::new(
            &config.notifications,
            self.webhook,
            self.journal.clone(),
            logger.clone(),
        );
        let alerts = AlertManager::new(
            &config,
            dispatcher,
            notifier,
            self.events.clone(),
            self.journal.clone(),
            logger.clone(),
        );
        let optimizer = OptimizationEngine::new(
            &config,
            self.runtime,
            self.journal.clone(),
            self.events.clone(),
            logger.clone(),
            now,
        );

        MemoryHealthEngine {
            config,
            sampler,
            alerts,
            optimizer,
            scheduler: Scheduler::new(),
            housekeeping: Vec::new(),
            events: self.events,
            journal: self.journal,
            metrics: EngineMetrics::new(),
            logger,
            health_score: 1.0,
            last_update: None,
            state: RunState::Starting,
        }
    }
}

pub struct MemoryHealthEngine {
    config: EngineConfig,
    sampler: Sampler,
    alerts: AlertManager,
    optimizer: OptimizationEngine,
    scheduler: Scheduler,
    housekeeping: Vec<TaskId>,
    events: EventBus,
    journal: Journal,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    health_score: f64,
    last_update: Option<DateTime<Utc>>,
    state: RunState,
}

impl MemoryHealthEngine {
    pub fn builder(config: EngineConfig, runtime: Arc<dyn RuntimeControl>) -> EngineBuilder {
        EngineBuilder::new(config, runtime)
    }

    /// Register the periodic tasks and start sampling
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.housekeeping.is_empty() {
            let integration = &self.config.integration;
            let tasks = [
                (TaskKind::StatusUpdate, integration.status_interval_secs),
                (TaskKind::Sync, integration.sync_interval_secs),
                (TaskKind::AutomationReset, integration.automation_reset_interval_secs),
                (TaskKind::PatternPrune, integration.pattern_prune_interval_secs),
                (TaskKind::RetentionSweep, self.config.retention.sweep_interval_secs),
            ];
            for (kind, secs) in tasks {
                let id = self
                    .scheduler
                    .register(kind, StdDuration::from_secs(secs), now);
                self.housekeeping.push(id);
            }
        }
        self.sampler.start(&mut self.scheduler, now);
        if self.state != RunState::Degraded {
            self.state = RunState::Running;
        }
        info!(
            tasks = self.scheduler.len(),
            session = %self.sampler.current_session(),
            "Memory health engine started"
        );
    }

    /// Cancel every task; collected state is kept
    pub fn stop(&mut self) {
        self.sampler.stop(&mut self.scheduler);
        for id in self.housekeeping.drain(..) {
            self.scheduler.cancel(id);
        }
        self.state = RunState::Stopped;
    }

    pub fn start_sampling(&mut self, now: DateTime<Utc>) -> bool {
        self.sampler.start(&mut self.scheduler, now)
    }

    pub fn stop_sampling(&mut self) -> bool {
        self.sampler.stop(&mut self.scheduler)
    }

    /// Mark the engine degraded (metrics source missing) or recovered
    pub fn set_degraded(&mut self, degraded: bool) {
        self.state = match (degraded, self.state) {
            (_, RunState::Stopped) => RunState::Stopped,
            (true, _) => RunState::Degraded,
            (false, RunState::Starting) => RunState::Starting,
            (false, _) => RunState::Running,
        };
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_deadline()
    }

    /// Run every task due at `now`, in deadline order
    pub fn run_due(&mut self, now: DateTime<Utc>) -> Vec<(TaskKind, TaskEffect)> {
        self.scheduler
            .take_due(now)
            .into_iter()
            .map(|(_, kind)| (kind, self.handle_task(kind, now)))
            .collect()
    }

    pub fn handle_task(&mut self, kind: TaskKind, now: DateTime<Utc>) -> TaskEffect {
        match kind {
            TaskKind::Sample => TaskEffect::Cycle(self.run_cycle(now)),
            TaskKind::StatusUpdate => TaskEffect::PublishStatus,
            TaskKind::Sync => TaskEffect::Sync(self.sync_summary(now)),
            TaskKind::AutomationReset => {
                self.optimizer.reset_automation_budget(now);
                TaskEffect::Housekeeping
            }
            TaskKind::PatternPrune => {
                self.optimizer.prune_patterns(now);
                TaskEffect::Housekeeping
            }
            TaskKind::RetentionSweep => {
                self.retention_sweep(now);
                TaskEffect::Housekeeping
            }
        }
    }

    /// Sample, alert, recommend and score once
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let outcome = match self.sampler.tick(now) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.set_degraded(true);
                return Err(e);
            }
        };
        if self.state == RunState::Degraded {
            self.set_degraded(false);
        }

        let alerts = self.alerts.evaluate(&outcome, now);
        self.optimizer
            .set_criticality(Criticality::from_alert_level(self.alerts.highest_active_level()));

        let sample = outcome.sample.as_ref();
        let recommendations = self.optimizer.generate(
            sample,
            self.sampler.current_session_record(),
            outcome.leak.as_ref(),
            now,
        );
        let implementations =
            self.optimizer
                .auto_implement(&recommendations, sample, outcome.leak.as_ref(), now);

        self.health_score = health_score(Some(sample), &alerts);
        self.metrics.set_health_score(self.health_score);
        self.last_update = Some(now);

        debug!(
            alerts = alerts.len(),
            recommendations = recommendations.len(),
            automations = implementations.len(),
            health_score = self.health_score,
            "Cycle complete"
        );

        Ok(CycleOutcome {
            sample: Arc::clone(&outcome.sample),
            alerts,
            recommendations,
            implementations,
            health_score: self.health_score,
        })
    }

    /// Drop resolved alerts past retention and cap stored recommendations
    pub fn retention_sweep(&mut self, now: DateTime<Utc>) -> SweepReport {
        let report = SweepReport {
            alerts: self.alerts.sweep(self.config.retention.retention_days, now),
            recommendations: self.optimizer.cap_history(),
        };
        if report != SweepReport::default() {
            debug!(
                alerts = report.alerts,
                recommendations = report.recommendations,
                "Retention sweep"
            );
        }
        report
    }

    pub fn acknowledge_alert(&mut self, id: &str, actor: &str, now: DateTime<Utc>) -> bool {
        self.alerts.acknowledge(id, actor, now)
    }

    pub fn resolve_alert(&mut self, id: &str, actor: &str, now: DateTime<Utc>) -> bool {
        let resolved = self.alerts.resolve(id, actor, now);
        if resolved {
            self.optimizer.set_criticality(Criticality::from_alert_level(
                self.alerts.highest_active_level(),
            ));
        }
        resolved
    }

    pub fn status(&self, now: DateTime<Utc>) -> StatusSummary {
        let active = self.alerts.active();
        let window = Duration::seconds(
            i64::try_from(self.config.sampling.session_active_window_secs).unwrap_or(i64::MAX / 1000),
        );

        StatusSummary {
            status: self.state,
            health_score: self.health_score,
            health_status: self.last_update.map(|_| HealthLabel::for_score(self.health_score)),
            memory: MemoryStatus {
                current: self.sampler.latest().map(|s| s.as_ref().clone()),
                trend: self.sampler.trend(),
                leak_score: self
                    .optimizer
                    .last_analysis()
                    .map(|a| a.leak_score),
            },
            monitoring: MonitoringStatus {
                active: self.sampler.is_running(),
                samples_collected: self.sampler.samples_collected(),
                collection_errors: self.sampler.collection_errors(),
                last_update: self.last_update,
            },
            alerts: AlertStatus {
                total: self.alerts.history_len(),
                active: active.len(),
                critical: active.iter().filter(|a| a.level.is_severe()).count(),
                warnings: active
                    .iter()
                    .filter(|a| a.level == AlertLevel::Warning)
                    .count(),
                recent: self
                    .alerts
                    .recent(RECENT_ALERTS)
                    .into_iter()
                    .cloned()
                    .collect(),
            },
            sessions: SessionStatus {
                total: self.sampler.sessions().len(),
                active: self.sampler.sessions().active_count(now, window),
            },
            optimizations: OptimizationStatus {
                total_recommendations: self.optimizer.recommendation_count(),
                high_priority: self.optimizer.high_priority_count(),
                auto_implemented: self.optimizer.auto_implemented_count(),
                top: self
                    .optimizer
                    .latest()
                    .iter()
                    .take(TOP_RECOMMENDATIONS)
                    .cloned()
                    .collect(),
            },
        }
    }

    pub fn sync_summary(&self, now: DateTime<Utc>) -> SyncSummary {
        SyncSummary {
            timestamp: now,
            instance: self.logger.instance().to_string(),
            health_score: self.health_score,
            health_status: HealthLabel::for_score(self.health_score),
            active_alerts: self.alerts.active_count(),
            recommendations: self.optimizer.recommendation_count(),
            sessions: self.sampler.sessions().len(),
        }
    }

    pub fn health_score(&self) -> f64 {
        self.health_score
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut Sampler {
        &mut self.sampler
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn optimizer(&self) -> &OptimizationEngine {
        &self.optimizer
    }

    pub fn optimizer_mut(&mut self) -> &mut OptimizationEngine {
        &mut self.optimizer
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }
}
