//! Tokio driver for the engine
//!
//! One task owns the [`MemoryHealthEngine`]. It sleeps until the next
//! scheduler deadline, runs the due work and serves host commands in between.
//! Hosts talk to it through a cloneable [`EngineHandle`].

use super::{MemoryHealthEngine, RunState, StatusSummary, TaskEffect};
use crate::alerts::Alert;
use crate::clock::Clock;
use crate::events::EventBus;
use crate::health::{components, HealthRegistry};
use crate::observability::EngineMetrics;
use crate::optimizer::{LearnedPattern, Recommendation};
use crate::runtime::wait_for_counters;
use crate::sync::{SyncSummary, SyncTarget};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;
/// Wake-up period when no task is registered
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// Requests served by the runner between ticks
#[derive(Debug)]
pub enum EngineCommand {
    AcknowledgeAlert {
        id: String,
        actor: String,
        reply: oneshot::Sender<bool>,
    },
    ResolveAlert {
        id: String,
        actor: String,
        reply: oneshot::Sender<bool>,
    },
    ListAlerts {
        active_only: bool,
        reply: oneshot::Sender<Vec<Alert>>,
    },
    ListRecommendations {
        limit: usize,
        reply: oneshot::Sender<Vec<Recommendation>>,
    },
    ListPatterns {
        reply: oneshot::Sender<Vec<LearnedPattern>>,
    },
    StartSampling {
        reply: oneshot::Sender<bool>,
    },
    StopSampling {
        reply: oneshot::Sender<bool>,
    },
    SetSession {
        session_id: Option<String>,
    },
    SetBaseline {
        efficiency: Option<f64>,
    },
    Status {
        reply: oneshot::Sender<StatusSummary>,
    },
}

/// Cloneable access to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    status: watch::Receiver<StatusSummary>,
    events: EventBus,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| anyhow!("engine runner has stopped"))?;
        rx.await.context("engine runner dropped the request")
    }

    async fn notify(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("engine runner has stopped"))
    }

    pub async fn acknowledge_alert(&self, id: &str, actor: &str) -> Result<bool> {
        self.request(|reply| EngineCommand::AcknowledgeAlert {
            id: id.to_string(),
            actor: actor.to_string(),
            reply,
        })
        .await
    }

    pub async fn resolve_alert(&self, id: &str, actor: &str) -> Result<bool> {
        self.request(|reply| EngineCommand::ResolveAlert {
            id: id.to_string(),
            actor: actor.to_string(),
            reply,
        })
        .await
    }

    /// Newest first
    pub async fn alerts(&self, active_only: bool) -> Result<Vec<Alert>> {
        self.request(|reply| EngineCommand::ListAlerts { active_only, reply })
            .await
    }

    /// Newest first
    pub async fn recommendations(&self, limit: usize) -> Result<Vec<Recommendation>> {
        self.request(|reply| EngineCommand::ListRecommendations { limit, reply })
            .await
    }

    pub async fn patterns(&self) -> Result<Vec<LearnedPattern>> {
        self.request(|reply| EngineCommand::ListPatterns { reply })
            .await
    }

    pub async fn start_sampling(&self) -> Result<bool> {
        self.request(|reply| EngineCommand::StartSampling { reply })
            .await
    }

    pub async fn stop_sampling(&self) -> Result<bool> {
        self.request(|reply| EngineCommand::StopSampling { reply })
            .await
    }

    pub async fn set_session(&self, session_id: Option<String>) -> Result<()> {
        self.notify(EngineCommand::SetSession { session_id }).await
    }

    pub async fn set_baseline(&self, efficiency: Option<f64>) -> Result<()> {
        self.notify(EngineCommand::SetBaseline { efficiency }).await
    }

    /// Fresh status computed by the runner
    pub async fn current_status(&self) -> Result<StatusSummary> {
        self.request(|reply| EngineCommand::Status { reply }).await
    }

    /// Last published status
    pub fn status(&self) -> StatusSummary {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusSummary> {
        self.status.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

enum Wake {
    Deadline,
    Command(Option<EngineCommand>),
    Shutdown,
}

pub struct EngineRunner {
    engine: MemoryHealthEngine,
    clock: Arc<dyn Clock>,
    health: HealthRegistry,
    commands: mpsc::Receiver<EngineCommand>,
    status: watch::Sender<StatusSummary>,
    targets: Vec<Arc<dyn SyncTarget>>,
    metrics: EngineMetrics,
}

impl EngineRunner {
    pub fn new(
        engine: MemoryHealthEngine,
        clock: Arc<dyn Clock>,
        health: HealthRegistry,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status_rx) = watch::channel(engine.status(clock.now()));

        let handle = EngineHandle {
            commands: command_tx,
            status: status_rx,
            events: engine.events().clone(),
        };
        let runner = Self {
            engine,
            clock,
            health,
            commands: command_rx,
            status: status_tx,
            targets: Vec::new(),
            metrics: EngineMetrics::new(),
        };
        (runner, handle)
    }

    pub fn with_sync_target(mut self, target: Arc<dyn SyncTarget>) -> Self {
        self.targets.push(target);
        self
    }

    /// Run until `shutdown` fires. Dropping every handle does not stop the
    /// runner.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        self.health.register_engine_components().await;
        self.wait_until_ready().await;
        if !self.engine.journal().is_enabled() {
            self.health
                .set_degraded(components::JOURNAL, "journal disabled")
                .await;
        }

        self.engine.start(self.clock.now());
        self.health.set_ready(true).await;
        self.publish_status();

        let mut commands_open = true;
        loop {
            let wait = self.until_next_deadline();
            let wake = tokio::select! {
                _ = tokio::time::sleep(wait) => Wake::Deadline,
                command = self.commands.recv(), if commands_open => Wake::Command(command),
                _ = shutdown.recv() => Wake::Shutdown,
            };

            match wake {
                Wake::Deadline => self.run_due().await,
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Command(None) => {
                    debug!("All engine handles dropped");
                    commands_open = false;
                }
                Wake::Shutdown => {
                    info!("Shutting down engine runner");
                    break;
                }
            }
        }

        self.engine.stop();
        self.publish_status();
        self.health.set_ready(false).await;
        Ok(())
    }

    /// Bounded wait for the metrics source; falls back to degraded mode
    async fn wait_until_ready(&mut self) {
        let timeout = self.engine.config().sampling.readiness_timeout();
        let runtime = Arc::clone(self.engine.sampler().runtime());

        if let Err(e) = wait_for_counters(runtime.as_ref(), timeout).await {
            warn!(
                event = "degraded_mode",
                error = %e,
                "Metrics source not ready, starting in degraded mode"
            );
            self.engine.set_degraded(true);
            self.health
                .set_degraded(components::SAMPLER, e.to_string())
                .await;
        }
    }

    fn until_next_deadline(&self) -> Duration {
        match self.engine.next_deadline() {
            Some(deadline) => (deadline - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO),
            None => IDLE_WAIT,
        }
    }

    async fn run_due(&mut self) {
        let now = self.clock.now();
        for (kind, effect) in self.engine.run_due(now) {
            match effect {
                TaskEffect::Cycle(Ok(_)) => {
                    self.health.set_healthy(components::SAMPLER).await;
                }
                TaskEffect::Cycle(Err(e)) => {
                    self.health
                        .set_degraded(components::SAMPLER, e.to_string())
                        .await;
                }
                TaskEffect::PublishStatus => self.publish_status(),
                TaskEffect::Sync(summary) => self.push_sync(summary),
                TaskEffect::Housekeeping => debug!(task = ?kind, "Housekeeping task ran"),
            }
        }
    }

    fn handle_command(&mut self, command: EngineCommand) {
        let now = self.clock.now();
        match command {
            EngineCommand::AcknowledgeAlert { id, actor, reply } => {
                let acknowledged = self.engine.acknowledge_alert(&id, &actor, now);
                self.publish_status();
                let _ = reply.send(acknowledged);
            }
            EngineCommand::ResolveAlert { id, actor, reply } => {
                let resolved = self.engine.resolve_alert(&id, &actor, now);
                self.publish_status();
                let _ = reply.send(resolved);
            }
            EngineCommand::ListAlerts { active_only, reply } => {
                let alerts = if active_only {
                    self.engine.alerts().active()
                } else {
                    self.engine.alerts().recent(usize::MAX)
                };
                let _ = reply.send(alerts.into_iter().cloned().collect());
            }
            EngineCommand::ListRecommendations { limit, reply } => {
                let recs = self
                    .engine
                    .optimizer()
                    .recommendations()
                    .take(limit)
                    .cloned()
                    .collect();
                let _ = reply.send(recs);
            }
            EngineCommand::ListPatterns { reply } => {
                let patterns = self
                    .engine
                    .optimizer()
                    .patterns()
                    .patterns()
                    .cloned()
                    .collect();
                let _ = reply.send(patterns);
            }
            EngineCommand::StartSampling { reply } => {
                let started = self.engine.start_sampling(now);
                self.publish_status();
                let _ = reply.send(started);
            }
            EngineCommand::StopSampling { reply } => {
                let stopped = self.engine.stop_sampling();
                self.publish_status();
                let _ = reply.send(stopped);
            }
            EngineCommand::SetSession { session_id } => {
                self.engine.sampler_mut().set_session_id(session_id);
            }
            EngineCommand::SetBaseline { efficiency } => {
                self.engine.optimizer_mut().set_external_baseline(efficiency);
            }
            EngineCommand::Status { reply } => {
                let _ = reply.send(self.engine.status(now));
            }
        }
    }

    fn publish_status(&self) {
        self.status.send_replace(self.engine.status(self.clock.now()));
    }

    /// Fire-and-forget push to every target
    fn push_sync(&self, summary: SyncSummary) {
        for target in &self.targets {
            let target = Arc::clone(target);
            let summary = summary.clone();
            let health = self.health.clone();
            let logger = self.engine.logger().clone();
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                match target.push(&summary).await {
                    Ok(()) => {
                        logger.log_sync_status(target.name(), true);
                        health.set_healthy(components::SYNC).await;
                    }
                    Err(e) => {
                        debug!(target = target.name(), error = %format!("{:#}", e), "Sync push failed");
                        logger.log_sync_status(target.name(), false);
                        metrics.inc_sync_failures();
                        health
                            .set_degraded(components::SYNC, format!("{}: {:#}", target.name(), e))
                            .await;
                    }
                }
            });
        }
    }

    pub fn state(&self) -> RunState {
        self.engine.state()
    }
}
