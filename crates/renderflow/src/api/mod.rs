use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::jobs::metrics::MetricsRepo;
use crate::jobs::timeline;
use crate::jobs::{AttemptsRepo, JobsRepo};

pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub jobs: JobsRepo,
    pub attempts: AttemptsRepo,
    pub metrics: MetricsRepo,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id/timeline", get(get_timeline))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

async fn metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.snapshot_all().await {
        Ok(snapshots) => Json(snapshots).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Deserialize)]
struct ListJobsQuery {
    queue: Option<String>,
    status: Option<String>,
    limit: Option<i64>,
    cursor_created_at: Option<DateTime<Utc>>,
    cursor_id: Option<Uuid>,
}

async fn list_jobs(
    State(state): State<ApiState>,
    Query(q): Query<ListJobsQuery>,
) -> Response {
    let cursor = match (q.cursor_created_at, q.cursor_id) {
        (Some(ca), Some(id)) => Some((ca, id)),
        _ => None,
    };

    match state
        .jobs
        .list_jobs(
            q.queue.as_deref(),
            q.status.as_deref(),
            q.limit.unwrap_or(100),
            cursor,
        )
        .await
    {
        Ok(items) => Json(json!({ "jobs": items })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn get_timeline(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match timeline::build_timeline(&state.jobs, &state.attempts, id).await {
        Ok(Some(t)) => Json(t).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response(),
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
        .into_response()
}
