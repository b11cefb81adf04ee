//! Remote import endpoints (admin only)

use crate::api::sse::{envelope_event, keep_alive};
use crate::auth::AdminUser;
use crate::services::import_queue::{CancelOutcome, ImportJob, QueueSnapshot};
use crate::{ApiError, ApiResult, AppState};
use audy_common::events::ImportEvent;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub jobs: Vec<ImportJob>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub queued: usize,
}

/// POST /api/import/enqueue
pub async fn enqueue_jobs(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(request): Json<EnqueueRequest>,
) -> ApiResult<Json<EnqueueResponse>> {
    if let Some(job) = request
        .jobs
        .iter()
        .find(|job| job.id.trim().is_empty() || !job.url.starts_with("http"))
    {
        return Err(ApiError::BadRequest(format!(
            "Invalid import job '{}'",
            job.id
        )));
    }

    let queued = request.jobs.len();
    state.imports.enqueue(user.id, request.jobs);
    Ok(Json(EnqueueResponse { queued }))
}

#[derive(Debug, Deserialize)]
pub struct DequeueRequest {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DequeueResponse {
    pub outcome: CancelOutcome,
}

/// POST /api/import/dequeue
pub async fn dequeue_job(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(request): Json<DequeueRequest>,
) -> ApiResult<Json<DequeueResponse>> {
    match state.imports.cancel(user.id, &request.id) {
        CancelOutcome::NotFound => Err(ApiError::NotFound(format!(
            "Import job {}",
            request.id
        ))),
        outcome => Ok(Json(DequeueResponse { outcome })),
    }
}

/// GET /api/import/queue
///
/// Streams `progress`, `processed`, `error` and `done` events for the
/// caller's queue. The stream ends after `done`.
pub async fn queue_events(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.imports.attach(user.id);
    info!(user_id = user.id, "Import listener attached");

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let drained = event == ImportEvent::Done;
                    if let Some(sse) = envelope_event(event.to_payload(), event.event_type()) {
                        yield Ok(sse);
                    }
                    if drained {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = user.id, skipped, "Import listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}

/// GET /api/import/status
pub async fn queue_status(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> Json<QueueSnapshot> {
    Json(state.imports.snapshot(user.id))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/import/enqueue", post(enqueue_jobs))
        .route("/api/import/dequeue", post(dequeue_job))
        .route("/api/import/queue", get(queue_events))
        .route("/api/import/status", get(queue_status))
}
