//! Router assembly.

use crate::state::AppState;
use crate::web::{discord, sms, status};
use axum::Router;
use axum::routing::{get, post};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// A dispatch run can legitimately take minutes (bounded portal waits per
/// recipient), so the request timeout is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(900);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health_handler))
        .route("/api/test-sms", post(sms::test_sms_handler))
        .route("/api/send-absent-sms", post(sms::absence_sms_handler))
        .route("/api/send-discord-report", post(discord::discord_report_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
