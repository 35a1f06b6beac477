//! Health endpoint.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    /// "production" or "test" depending on the cutover instant.
    pub mode: &'static str,
    pub production_start_date: String,
    pub portal_base_url: String,
    pub uptime_seconds: i64,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now.to_rfc3339(),
        mode: state.config.mode_at(now),
        production_start_date: state.config.production_start_raw().to_string(),
        portal_base_url: state.config.portal_base_url.clone(),
        uptime_seconds: (now - state.started_at).num_seconds(),
    })
}
