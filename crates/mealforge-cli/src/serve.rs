//! Status server run next to the worker pool: job lookups and a live
//! server-sent event stream of each job's progress.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use mealforge_core::notify::{BroadcastNotifier, ProgressEvent, ProgressStatus};
use mealforge_core::queue::{Job, JobQueue, JobStatus};

const KEEP_ALIVE: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// State and errors
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn JobQueue>,
    pub events: Arc<BroadcastNotifier>,
    /// Ends open event streams so graceful shutdown can finish.
    pub shutdown: CancellationToken,
}

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: mealforge_core::sanitize::sanitize_error(&err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Public view of a job. The intake payload is never exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub run_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            attempts_made: job.attempts_made,
            max_attempts: job.max_attempts,
            run_at: job.run_at,
            last_error: job.last_error,
            plan_id: job.result_ref,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/events", get(job_events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(state: AppState, bind: &str, port: u16) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {bind}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("status server listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    tracing::info!("status server shut down");
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "queue": state.queue.name(),
        "subscribers": state.events.subscriber_count(),
    }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let job = state
        .queue
        .get(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("job {id} not found")))?;
    Ok(Json(job.into()))
}

/// Streams a `snapshot` of the job, then its progress events until the job
/// completes or fails for good.
async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Subscribe before reading the job so no event falls in between.
    let mut events = Box::pin(state.events.subscribe(id));
    let job = state
        .queue
        .get(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("job {id} not found")))?;
    tracing::debug!(job_id = %id, status = %job.status, "event stream opened");

    let finished = job.status.is_terminal();
    let snapshot = JobStatusResponse::from(job);
    let shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        if let Some(event) = to_sse("snapshot", &snapshot) {
            yield Ok(event);
        }
        if !finished {
            loop {
                let next = tokio::select! {
                    biased;
                    event = events.next() => event,
                    _ = shutdown.cancelled() => None,
                };
                let Some(progress) = next else { break };
                let last = ends_stream(&progress);
                if let Some(event) = to_sse(progress.status.as_str(), &progress) {
                    yield Ok(event);
                }
                if last {
                    break;
                }
            }
        }
        tracing::debug!(job_id = %id, "event stream closed");
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("heartbeat")))
}

fn ends_stream(event: &ProgressEvent) -> bool {
    event.status == ProgressStatus::Completed || event.is_terminal_failure()
}

fn to_sse<T: Serialize>(name: &str, data: &T) -> Option<Event> {
    match Event::default().event(name).json_data(data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode event");
            None
        }
    }
}
