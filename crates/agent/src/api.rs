//! HTTP API for health checks, Prometheus metrics and the engine surface

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use memwatch::alerts::Alert;
use memwatch::optimizer::{LearnedPattern, Recommendation};
use memwatch::runtime::ReportedRuntime;
use memwatch::sync::SyncSummary;
use memwatch::{ComponentStatus, EngineHandle, HealthRegistry, RawCounters, StatusSummary};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

const DEFAULT_RECOMMENDATION_LIMIT: usize = 20;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub engine: EngineHandle,
    /// Present when the host pushes its own counters
    pub reported: Option<Arc<ReportedRuntime>>,
    /// Last summary pushed to the in-process sync target
    pub sync: Option<watch::Receiver<Option<SyncSummary>>>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, engine: EngineHandle) -> Self {
        Self {
            health_registry,
            engine,
            reported: None,
            sync: None,
        }
    }

    pub fn with_reported_runtime(mut self, runtime: Arc<ReportedRuntime>) -> Self {
        self.reported = Some(runtime);
        self
    }

    pub fn with_sync(mut self, summaries: watch::Receiver<Option<SyncSummary>>) -> Self {
        self.sync = Some(summaries);
        self
    }
}

/// Error body returned by the engine endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    /// The engine runner is gone or did not answer
    Unavailable(String),
    Unsupported(&'static str),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unsupported(_) => StatusCode::CONFLICT,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Unavailable(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = match self {
            ApiError::NotFound(id) => format!("alert {} not found", id),
            ApiError::Unavailable(message) => {
                warn!(error = %message, "Engine request failed");
                "engine unavailable".to_string()
            }
            ApiError::Unsupported(what) => what.to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Latest published status; never waits on the engine
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSummary> {
    Json(state.engine.status())
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    #[serde(default)]
    pub active: bool,
}

async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(state.engine.alerts(query.active).await?))
}

/// Who is acting on an alert
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ActorBody {
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_actor() -> String {
    "api".to_string()
}

async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ActorBody>>,
) -> Result<StatusCode, ApiError> {
    let actor = body.map(|Json(b)| b.actor).unwrap_or_else(default_actor);
    if state.engine.acknowledge_alert(&id, &actor).await? {
        info!(alert_id = %id, actor = %actor, "Alert acknowledged");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}

async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ActorBody>>,
) -> Result<StatusCode, ApiError> {
    let actor = body.map(|Json(b)| b.actor).unwrap_or_else(default_actor);
    if state.engine.resolve_alert(&id, &actor).await? {
        info!(alert_id = %id, actor = %actor, "Alert resolved");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<usize>,
}

async fn list_recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT);
    Ok(Json(state.engine.recommendations(limit).await?))
}

async fn list_patterns(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LearnedPattern>>, ApiError> {
    Ok(Json(state.engine.patterns().await?))
}

/// Body of `PUT /api/v1/baseline`
#[derive(Debug, Serialize, Deserialize)]
pub struct BaselineBody {
    pub efficiency: Option<f64>,
}

async fn set_baseline(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BaselineBody>,
) -> Result<StatusCode, ApiError> {
    state.engine.set_baseline(body.efficiency).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body of `PUT /api/v1/session`
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionBody {
    pub session_id: Option<String>,
}

async fn set_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SessionBody>,
) -> Result<StatusCode, ApiError> {
    state.engine.set_session(body.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Whether a sampling toggle changed anything
#[derive(Debug, Serialize, Deserialize)]
pub struct SamplingToggle {
    pub changed: bool,
}

async fn start_sampling(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SamplingToggle>, ApiError> {
    let changed = state.engine.start_sampling().await?;
    Ok(Json(SamplingToggle { changed }))
}

async fn stop_sampling(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SamplingToggle>, ApiError> {
    let changed = state.engine.stop_sampling().await?;
    Ok(Json(SamplingToggle { changed }))
}

/// Last pushed sync summary; `null` until the first sync interval elapses
async fn last_sync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<SyncSummary>>, ApiError> {
    let summaries = state
        .sync
        .as_ref()
        .ok_or(ApiError::Unsupported("no sync target attached"))?;
    let latest = summaries.borrow().clone();
    Ok(Json(latest))
}

/// Counters pushed by the host when running with the reported runtime
async fn report_counters(
    State(state): State<Arc<AppState>>,
    Json(counters): Json<RawCounters>,
) -> Result<StatusCode, ApiError> {
    let runtime = state
        .reported
        .as_ref()
        .ok_or(ApiError::Unsupported("agent is not using reported counters"))?;
    runtime.report(counters);
    Ok(StatusCode::ACCEPTED)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/alerts", get(list_alerts))
        .route("/api/v1/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/api/v1/alerts/:id/resolve", post(resolve_alert))
        .route("/api/v1/recommendations", get(list_recommendations))
        .route("/api/v1/patterns", get(list_patterns))
        .route("/api/v1/baseline", put(set_baseline))
        .route("/api/v1/session", put(set_session))
        .route("/api/v1/sampling/start", post(start_sampling))
        .route("/api/v1/sampling/stop", post(stop_sampling))
        .route("/api/v1/sync", get(last_sync))
        .route("/api/v1/counters", post(report_counters))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
