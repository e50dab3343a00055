//! Database query functions for the `job_events` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{JobEvent, JobStatus};

/// Parameters for inserting a new job event row.
#[derive(Debug, Clone)]
pub struct NewJobEvent<'a> {
    pub job_id: Uuid,
    pub attempt: Option<i32>,
    pub agent: i32,
    pub agent_name: &'a str,
    pub status: JobStatus,
    pub message: &'a str,
}

/// Insert a job event. Returns the row with server defaults (id,
/// recorded_at).
pub async fn insert_job_event(pool: &PgPool, new: &NewJobEvent<'_>) -> Result<JobEvent> {
    let event = sqlx::query_as::<_, JobEvent>(
        "INSERT INTO job_events (job_id, attempt, agent, agent_name, status, message) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.job_id)
    .bind(new.attempt)
    .bind(new.agent)
    .bind(new.agent_name)
    .bind(new.status)
    .bind(new.message)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to insert event for job {} agent {} status {}",
            new.job_id, new.agent, new.status
        )
    })?;

    Ok(event)
}

/// All events of a job in the order they were recorded.
pub async fn list_events_for_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<JobEvent>> {
    let events = sqlx::query_as::<_, JobEvent>(
        "SELECT * FROM job_events WHERE job_id = $1 ORDER BY id ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list events for job {job_id}"))?;

    Ok(events)
}
