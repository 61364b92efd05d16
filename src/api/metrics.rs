//! Operational endpoints
//!
//! - GET /metrics - Prometheus text format
//! - GET /health - liveness plus queue depth

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;

use crate::AppState;
use crate::data::JobStatus;
use crate::jobs::{INBOX_JOB, OUTBOX_JOB};
use crate::metrics::REGISTRY;

async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&REGISTRY.gather()) {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Reports 503 when the database cannot be queried.
async fn health_handler(State(state): State<AppState>) -> Response {
    let mut queues = serde_json::Map::new();
    for kind in [INBOX_JOB, OUTBOX_JOB] {
        let pending = state.db.count_jobs(kind, JobStatus::Pending).await;
        let dead = state.db.count_jobs(kind, JobStatus::Dead).await;
        match (pending, dead) {
            (Ok(pending), Ok(dead)) => {
                queues.insert(kind.to_string(), json!({"pending": pending, "dead": dead}));
            }
            (Err(error), _) | (_, Err(error)) => {
                tracing::error!(error = %error, "Health check failed");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({"status": "unavailable"})),
                )
                    .into_response();
            }
        }
    }

    Json(json!({"status": "ok", "queues": queues})).into_response()
}

pub fn ops_router() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
}
