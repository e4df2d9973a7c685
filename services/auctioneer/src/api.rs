//! HTTP ingestion API.
//!
//! Submission is fire-and-forget: a `202 Accepted` means the valid items
//! entered the scheduling queue, not that they were placed. Invalid items
//! are dropped individually with a logged reason; they never fail the
//! batch.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use corral_rep::{LrpStartRequest, TaskStartRequest};
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::worker::Submission;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct AppState {
    submissions: mpsc::UnboundedSender<Submission>,
}

impl AppState {
    pub fn new(submissions: mpsc::UnboundedSender<Submission>) -> Self {
        Self { submissions }
    }
}

/// Create the API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/lrps", post(submit_lrps))
        .route("/v1/tasks", post(submit_tasks))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "auctioneer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// How a submission batch fared at the door.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct SubmissionResponse {
    /// Items accepted into the scheduling queue.
    pub accepted: usize,

    /// Items dropped as invalid.
    pub rejected: usize,
}

async fn submit_lrps(
    State(state): State<AppState>,
    Json(starts): Json<Vec<LrpStartRequest>>,
) -> impl IntoResponse {
    let total = starts.len();
    let valid: Vec<LrpStartRequest> = starts
        .into_iter()
        .filter(|start| match start.validate() {
            Ok(()) => true,
            Err(reason) => {
                warn!(
                    process_guid = %start.process_guid,
                    reason = %reason,
                    "Dropping invalid lrp start request"
                );
                false
            }
        })
        .collect();

    let response = SubmissionResponse {
        accepted: valid.len(),
        rejected: total - valid.len(),
    };

    if !valid.is_empty() && state.submissions.send(Submission::LrpStarts(valid)).is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(response));
    }

    (StatusCode::ACCEPTED, Json(response))
}

async fn submit_tasks(
    State(state): State<AppState>,
    Json(starts): Json<Vec<TaskStartRequest>>,
) -> impl IntoResponse {
    let total = starts.len();
    let valid: Vec<TaskStartRequest> = starts
        .into_iter()
        .filter(|start| match start.validate() {
            Ok(()) => true,
            Err(reason) => {
                warn!(
                    task_guid = %start.task_guid,
                    reason = %reason,
                    "Dropping invalid task start request"
                );
                false
            }
        })
        .collect();

    let response = SubmissionResponse {
        accepted: valid.len(),
        rejected: total - valid.len(),
    };

    if !valid.is_empty() && state.submissions.send(Submission::TaskStarts(valid)).is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(response));
    }

    (StatusCode::ACCEPTED, Json(response))
}
