//! REST API endpoints for the aeroguard-service.
//!
//! The API is read-only apart from `POST /api/cycle`, which runs one
//! ingestion cycle immediately.
//!
//! # Lock Acquisition
//!
//! - **`state.snapshot`** (RwLock): read lock to clone the latest snapshot.
//! - **history store** (Mutex): held only for a single `recent_window` call.
//!   Cycles hold it while recording, so history reads wait for an in-flight
//!   cycle's appends to finish.
//! - **`state.collector.location_stats`** (RwLock): read lock to clone stats.
//!
//! All errors are rendered as `{"error": "..."}` via [`AppError`].

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use aeroguard_core::Snapshot;
use aeroguard_types::{HistoryRecord, Location};

use crate::collector;
use crate::state::{AppState, DataState, LocationStats};

/// Default number of history records returned.
pub const DEFAULT_HISTORY_LIMIT: usize = 12;
/// Maximum number of history records returned.
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/cycle", post(trigger_cycle))
        .route("/api/locations", get(list_locations))
        .route("/api/locations/{name}/history", get(get_history))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service version.
    pub version: &'static str,
    /// Current timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Whether a snapshot is available.
    pub data_state: DataState,
    /// Collector status.
    pub collector: CollectorStatus,
    /// Per-location collection statistics.
    pub locations: Vec<LocationStats>,
}

/// Collector status.
#[derive(Debug, Serialize)]
pub struct CollectorStatus {
    /// Whether the collector is running.
    pub running: bool,
    /// When the collector was started.
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    /// How long the collector has been running (in seconds).
    pub uptime_seconds: Option<u64>,
    /// Completed cycles since startup.
    pub cycle_count: u64,
    /// When the last cycle completed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_cycle_at: Option<OffsetDateTime>,
    /// Cycles in a row without any reading.
    pub consecutive_empty_cycles: u32,
    /// Seconds between cycles.
    pub refresh_interval: u64,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let running = state.collector.is_running();
    let started_at = state.collector.started_at().filter(|_| running);
    let uptime_seconds = started_at.map(|s| {
        let now = OffsetDateTime::now_utc();
        (now - s).whole_seconds().max(0) as u64
    });

    let locations = state.collector.location_stats.read().await.clone();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        data_state: state.data_state().await,
        collector: CollectorStatus {
            running,
            started_at,
            uptime_seconds,
            cycle_count: state.collector.cycle_count(),
            last_cycle_at: state.collector.last_cycle_at(),
            consecutive_empty_cycles: state.collector.consecutive_empty_cycles(),
            refresh_interval: state.config.collector.refresh_interval,
        },
        locations,
    })
}

/// Latest snapshot.
///
/// # Errors
///
/// Returns [`AppError::Unavailable`] before the first cycle completes and
/// while the service is in the `no_data` state.
async fn get_snapshot(State(state): State<Arc<AppState>>) -> Result<Json<Snapshot>, AppError> {
    match state.data_state().await {
        DataState::Pending => Err(AppError::Unavailable(
            "No snapshot yet: the first cycle has not completed".to_string(),
        )),
        DataState::NoData => Err(AppError::Unavailable(format!(
            "No data: no readings for any location in {} consecutive cycles",
            state.collector.consecutive_empty_cycles()
        ))),
        DataState::Ok => state
            .snapshot
            .read()
            .await
            .clone()
            .map(Json)
            .ok_or_else(|| AppError::Internal("snapshot missing".to_string())),
    }
}

async fn trigger_cycle(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(collector::run_cycle(&state).await)
}

async fn list_locations(State(state): State<Arc<AppState>>) -> Json<Vec<Location>> {
    Json(state.config.locations.clone())
}

/// Query parameters for history.
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// Validate the query and return the effective limit.
    pub fn limit(&self) -> Result<usize, AppError> {
        match self.limit {
            None => Ok(DEFAULT_HISTORY_LIMIT),
            Some(limit) if (1..=MAX_HISTORY_LIMIT).contains(&limit) => Ok(limit),
            Some(limit) => Err(AppError::BadRequest(format!(
                "Invalid limit {}: must be between 1 and {}",
                limit, MAX_HISTORY_LIMIT
            ))),
        }
    }
}

/// History for one location.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub location: String,
    pub retention_hours: u32,
    pub records: Vec<HistoryRecord>,
}

/// Recent history for a location, oldest first.
///
/// Location names match case-insensitively.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params.limit()?;

    let location = state
        .config
        .locations
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(&name))
        .ok_or_else(|| AppError::NotFound(format!("Location not found: {}", name)))?;

    let records = {
        let store = state.pipeline.store().lock().await;
        store.recent_window(&location.name, limit)?
    };

    Ok(Json(HistoryResponse {
        location: location.name.clone(),
        retention_hours: state.config.storage.retention_hours,
        records,
    }))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    Store(aeroguard_store::Error),
    Internal(String),
}

impl From<aeroguard_store::Error> for AppError {
    fn from(e: aeroguard_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
