use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::ApiError;
use crate::models::{
    EndResponse, EventRecord, Reason, ResetRequest, ResetResponse, StartRequest, StartResponse,
    StatsResponse, TIMESTAMP_FORMAT,
};
use crate::stats::DailyStatsProjector;
use crate::store::DelayStore;

/// Filename offered by `GET /download`
pub const REPORT_FILENAME: &str = "delay_data.csv";

/// Shared backend state. The store lock also serialises the
/// active-delay check against the insert.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<DelayStore>>,
    reset_password: Arc<str>,
}

impl AppState {
    pub fn new(store: DelayStore, reset_password: &str) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            reset_password: Arc::from(reset_password),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, DelayStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::Internal("store lock poisoned".to_string()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/start", post(start_delay))
        .route("/end", post(end_delay))
        .route("/data", get(list_events))
        .route("/download", get(download_report))
        .route("/reset", post(reset_data))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Delay Tracker API v0.1.0"
}

async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let active = state.store()?.active_event()?;
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "active_delay": active.map(|e| e.to_record()),
    })))
}

async fn start_delay(
    State(state): State<AppState>,
    Json(input): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let reason = input
        .reason
        .as_deref()
        .and_then(Reason::parse)
        .ok_or_else(|| ApiError::BadRequest("Invalid reason".to_string()))?;

    let event_id = state.store()?.start(reason, Utc::now().naive_utc())?;
    info!(event_id, %reason, "delay started");

    Ok(Json(StartResponse {
        message: "Delay started".to_string(),
        event_id,
    }))
}

async fn end_delay(State(state): State<AppState>) -> Result<Json<EndResponse>, ApiError> {
    let event = state.store()?.end_active(Utc::now().naive_utc())?;
    let duration_minutes = event.duration_minutes().unwrap_or_default();
    info!(event_id = event.id, duration_minutes, "delay ended");

    Ok(Json(EndResponse {
        message: "Delay ended".to_string(),
        event_id: event.id,
        duration_minutes,
    }))
}

async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let events = state.store()?.all_events()?;
    Ok(Json(events.iter().map(|e| e.to_record()).collect()))
}

async fn download_report(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let events = state.store()?.all_events()?;

    let mut csv = String::from("ID,Start Time,End Time,Reason,Duration (minutes)\r\n");
    for event in &events {
        let row = [
            event.id.to_string(),
            event.start_time.format(TIMESTAMP_FORMAT).to_string(),
            event
                .end_time
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
            event.reason.as_str().to_string(),
            event
                .duration_minutes()
                .map(|d| d.to_string())
                .unwrap_or_default(),
        ];
        let cells: Vec<String> = row.iter().map(|c| csv_cell(c)).collect();
        csv.push_str(&cells.join(","));
        csv.push_str("\r\n");
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{REPORT_FILENAME}\""),
            ),
        ],
        csv,
    ))
}

fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

async fn reset_data(
    State(state): State<AppState>,
    Json(input): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    if input.password.as_deref() != Some(&*state.reset_password) {
        return Err(ApiError::Forbidden("Invalid password".to_string()));
    }

    let deleted = state.store()?.delete_all()?;
    info!(deleted, "delay data reset");

    Ok(Json(ResetResponse {
        message: format!("Reset successful, deleted {deleted} events."),
    }))
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let events = state.store()?.finished_events()?;
    Ok(Json(DailyStatsProjector::new(&events).project()))
}
