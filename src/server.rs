//! HTTP server for clinician clients.
//!
//! This module provides an HTTP server that:
//! - Serves the latest insole frame via GET /pressure
//! - Manages patients and therapy sessions
//! - Accepts sensor readings into open sessions and reports summaries
//!
//! # Architecture
//!
//! ```text
//! Insole ──serial──→ [Bridge] ──→ [Slot] ──→ GET /pressure
//!                                                 │
//! Client ──→ POST /sessions/:id/data ──→ [Aggregator] ──→ SQLite
//! ```

use crate::collector::{BridgeSnapshot, Frame, PressureSampler, Reading};
use crate::config::Config;
use crate::core::{
    NewPatient, SessionAggregator, SessionDetail, SessionError, SessionSummary,
};
use crate::store::Patient;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Longest wait a client may request from GET /pressure.
pub const MAX_PRESSURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Default wait for a fresh frame on GET /pressure
    pub sample_timeout: Duration,
    /// Whether GET /pressure falls back to simulated data by default
    pub allow_simulated: bool,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            sample_timeout: Duration::from_secs(1),
            allow_simulated: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            sample_timeout: config.sample_timeout,
            allow_simulated: config.allow_simulated,
        }
    }
}

/// Shared server state
pub struct ServerState {
    aggregator: SessionAggregator,
    sampler: PressureSampler,
    sample_timeout: Duration,
    allow_simulated: bool,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig, aggregator: SessionAggregator, sampler: PressureSampler) -> Self {
        Self {
            aggregator,
            sampler,
            sample_timeout: config.sample_timeout,
            allow_simulated: config.allow_simulated,
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub bridge: BridgeSnapshot,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Query for GET /pressure
#[derive(Debug, Default, Deserialize)]
pub struct PressureQuery {
    /// Seconds to wait for a fresh frame
    pub timeout: Option<f64>,
    /// Answer with simulated data when no frame arrives
    pub fallback: Option<bool>,
}

/// Response from GET /pressure
#[derive(Debug, Serialize)]
pub struct PressureResponse {
    pub pressure: Option<Frame>,
    pub source: &'static str,
}

/// Body for POST /patients/:id/sessions
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// Body for POST /sessions/:id/data
#[derive(Debug, Deserialize)]
pub struct SampleRequest {
    pub sensor_readings: Frame,
    #[serde(default)]
    pub timestamp: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(err: SessionError) -> ApiError {
    let status = match &err {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::InvalidState(_) => StatusCode::CONFLICT,
        SessionError::Validation(_) => StatusCode::BAD_REQUEST,
        SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if !err.is_client_error() {
        tracing::error!("Request failed: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        bridge: state.sampler.stats().snapshot(),
    })
}

/// GET /pressure
///
/// Waits for a frame newer than the last one handed out. The wait blocks,
/// so it runs on the blocking pool.
async fn pressure(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PressureQuery>,
) -> ApiResult<PressureResponse> {
    let timeout = match query.timeout {
        None => state.sample_timeout,
        Some(secs) if secs.is_finite() && secs >= 0.0 => {
            Duration::from_secs_f64(secs.min(MAX_PRESSURE_TIMEOUT.as_secs_f64()))
        }
        Some(secs) => {
            return Err(api_error(SessionError::Validation(format!(
                "timeout must be a non-negative number of seconds, got {secs}"
            ))))
        }
    };
    let fallback = query.fallback.unwrap_or(state.allow_simulated);

    let sampler = state.sampler.clone();
    let reading = tokio::task::spawn_blocking(move || sampler.read(timeout, fallback))
        .await
        .map_err(|e| api_error(SessionError::Store(format!("sampler task failed: {e}"))))?;

    if let Reading::Simulated(_) = reading {
        tracing::debug!("No fresh frame within {:?}, serving simulated data", timeout);
    }

    let source = reading.source();
    Ok(Json(PressureResponse {
        pressure: reading.into_frame(),
        source,
    }))
}

/// GET /patients
async fn list_patients(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<Patient>> {
    state
        .aggregator
        .list_patients()
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /patients
async fn create_patient(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<NewPatient>,
) -> ApiResult<Patient> {
    state
        .aggregator
        .create_patient(request)
        .await
        .map(Json)
        .map_err(api_error)
}

/// GET /patients/:id
async fn get_patient(
    State(state): State<Arc<ServerState>>,
    Path(patient_id): Path<String>,
) -> ApiResult<Patient> {
    state
        .aggregator
        .get_patient(&patient_id)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /patients/:id/sessions
async fn start_session(
    State(state): State<Arc<ServerState>>,
    Path(patient_id): Path<String>,
    body: Bytes,
) -> ApiResult<SessionSummary> {
    let note = parse_start_request(&body).map_err(api_error)?.note;
    state
        .aggregator
        .start_session(&patient_id, note)
        .await
        .map(Json)
        .map_err(api_error)
}

/// An empty body means no note; anything else must be a valid request.
fn parse_start_request(body: &[u8]) -> Result<StartSessionRequest, SessionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartSessionRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| SessionError::Validation(format!("invalid session request: {e}")))
}

/// GET /patients/:id/sessions
async fn list_sessions(
    State(state): State<Arc<ServerState>>,
    Path(patient_id): Path<String>,
) -> ApiResult<Vec<SessionSummary>> {
    state
        .aggregator
        .list_sessions(&patient_id)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /sessions/:id/data
async fn append_sample(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SampleRequest>,
) -> ApiResult<SessionSummary> {
    state
        .aggregator
        .append_sample(&session_id, request.sensor_readings, request.timestamp)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /sessions/:id/end
async fn end_session(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionSummary> {
    state
        .aggregator
        .end_session(&session_id)
        .await
        .map(Json)
        .map_err(api_error)
}

/// GET /sessions/:id
async fn session_detail(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionDetail> {
    state
        .aggregator
        .session_detail(&session_id)
        .await
        .map(Json)
        .map_err(api_error)
}

/// Build the router without binding it.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pressure", get(pressure))
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/:id", get(get_patient))
        .route(
            "/patients/:id/sessions",
            get(list_sessions).post(start_session),
        )
        .route("/sessions/:id", get(session_detail))
        .route("/sessions/:id/data", post(append_sample))
        .route("/sessions/:id/end", post(end_session))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    state: ServerState,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(state);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("GaitVision agent listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
