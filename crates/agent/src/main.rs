//! memwatch-agent - memory health engine host
//!
//! Runs the engine against this process (or counters pushed by a host) and
//! serves probes, metrics and the engine API over HTTP.

use anyhow::Result;
use chrono::Utc;
use memwatch::alerts::QueuedWebhook;
use memwatch::clock::SystemClock;
use memwatch::events::ShutdownRequest;
use memwatch::journal::Journal;
use memwatch::runtime::{ProcFsRuntime, ReportedRuntime, RuntimeControl};
use memwatch::sync::WatchSyncTarget;
use memwatch::{EngineMetrics, EngineRunner, HealthRegistry, MemoryHealthEngine, StructuredLogger};
use memwatch_agent::config::{AgentConfig, RuntimeSource};
use memwatch_agent::{api, shutdown, webhook::WebhookSender};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const WEBHOOK_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting memwatch-agent");

    let config = AgentConfig::load()?;
    info!(
        instance = %config.instance,
        runtime = ?config.runtime,
        interval_ms = config.engine.sampling.interval_ms,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    let _metrics = EngineMetrics::new();

    let logger = StructuredLogger::new(&config.instance);
    let runtime_name = match config.runtime {
        RuntimeSource::Procfs => "procfs",
        RuntimeSource::Reported => "reported",
    };
    logger.log_startup(AGENT_VERSION, runtime_name);

    let (journal, journal_worker) = Journal::new(
        config.engine.storage.root.clone(),
        config.engine.storage.journal_capacity,
    );
    tokio::spawn(journal_worker.run());

    let (runtime, reported): (Arc<dyn RuntimeControl>, Option<Arc<ReportedRuntime>>) =
        match config.runtime {
            RuntimeSource::Procfs => {
                let procfs = match config.proc_path {
                    Some(ref path) => ProcFsRuntime::with_proc_path(path.clone()),
                    None => ProcFsRuntime::new(),
                };
                let runtime: Arc<dyn RuntimeControl> = Arc::new(procfs);
                (runtime, None)
            }
            RuntimeSource::Reported => {
                let reported = Arc::new(ReportedRuntime::new());
                let runtime: Arc<dyn RuntimeControl> = reported.clone();
                (runtime, Some(reported))
            }
        };

    let mut builder = MemoryHealthEngine::builder(config.engine.clone(), runtime)
        .journal(journal.clone())
        .instance(config.instance.clone());
    if config.engine.notifications.webhook_url.is_some() {
        let (sink, queue) = QueuedWebhook::new(WEBHOOK_QUEUE);
        tokio::spawn(WebhookSender::new()?.run(queue));
        builder = builder.webhook(Arc::new(sink));
    }
    let engine = builder.build(Utc::now());
    let mut shutdown_requests = engine.events().subscribe_shutdown();

    let (sync_target, sync_summaries) = WatchSyncTarget::new();
    let (runner, handle) = EngineRunner::new(engine, Arc::new(SystemClock), health_registry.clone());
    let runner = runner.with_sync_target(Arc::new(sync_target));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner_task = tokio::spawn(runner.run(shutdown_rx));

    let mut app_state = api::AppState::new(health_registry, handle).with_sync(sync_summaries);
    if let Some(reported) = reported {
        app_state = app_state.with_reported_runtime(reported);
    }
    let api_handle = tokio::spawn(api::serve(config.api_port, Arc::new(app_state)));

    let emergency: Option<(ShutdownRequest, Instant)> = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            None
        }
        request = next_shutdown_request(&mut shutdown_requests, config.intercept_emergency_shutdown) => {
            logger.log_shutdown(&request.reason);
            Some((request, Instant::now()))
        }
    };

    let grace = emergency
        .as_ref()
        .map(|(r, _)| r.grace)
        .unwrap_or_else(|| config.engine.actions.shutdown_grace());
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(grace, runner_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %format!("{:#}", e), "Engine runner failed"),
        Ok(Err(e)) => error!(error = %e, "Engine runner panicked"),
        Err(_) => warn!(grace_ms = grace.as_millis() as u64, "Engine runner did not stop in time"),
    }
    api_handle.abort();

    if let Some((request, requested_at)) = emergency {
        // the state dump is only queued until the journal drains
        shutdown::settle_emergency(&journal, grace, requested_at).await;
        error!(
            reason = %request.reason,
            state_path = ?request.state_path,
            "Exiting after emergency shutdown"
        );
        std::process::exit(1);
    }

    match tokio::time::timeout(grace, journal.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Journal flush failed"),
        Err(_) => warn!(grace_ms = grace.as_millis() as u64, "Journal not flushed before shutdown"),
    }
    info!("Shutdown complete");
    Ok(())
}

/// Wait for the first emergency shutdown request that is not intercepted
async fn next_shutdown_request(
    requests: &mut broadcast::Receiver<ShutdownRequest>,
    intercept: bool,
) -> ShutdownRequest {
    loop {
        match requests.recv().await {
            Ok(request) if intercept => {
                warn!(
                    reason = %request.reason,
                    "Emergency shutdown intercepted, process keeps running"
                );
            }
            Ok(request) => return request,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Missed shutdown requests");
            }
            Err(broadcast::error::RecvError::Closed) => {
                std::future::pending::<()>().await;
            }
        }
    }
}
