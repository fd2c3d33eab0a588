//! Prometheus /metrics endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::error::AppError;
use crate::server::AppState;

/// GET /metrics, Prometheus text exposition format
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.prometheus.as_ref() {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => AppError::NotFound("metrics are disabled".to_string()).into_response(),
    }
}
