//! Database query functions for the `jobs` table.
//!
//! Every state change is a conditional `UPDATE` whose `WHERE` clause names
//! the expected current status, so two workers can never both act on the
//! same attempt. Callers inspect the returned row count.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Job, JobStatus};

/// Parameters for inserting a new job row.
#[derive(Debug, Clone)]
pub struct NewJob<'a> {
    pub id: Uuid,
    pub queue: &'a str,
    pub payload: &'a Value,
    pub max_attempts: i32,
    pub run_at: DateTime<Utc>,
}

/// Insert a job. Enqueueing an id that already exists is a no-op that
/// returns the stored row; the boolean reports whether a row was created.
pub async fn insert_job(pool: &PgPool, new: &NewJob<'_>) -> Result<(Job, bool)> {
    let inserted = sqlx::query_as::<_, Job>(
        "INSERT INTO jobs (id, queue, payload, max_attempts, run_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (id) DO NOTHING \
         RETURNING *",
    )
    .bind(new.id)
    .bind(new.queue)
    .bind(new.payload)
    .bind(new.max_attempts)
    .bind(new.run_at)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to insert job {}", new.id))?;

    match inserted {
        Some(job) => Ok((job, true)),
        None => {
            let existing = get_job(pool, new.id)
                .await?
                .with_context(|| format!("job {} vanished after conflicting insert", new.id))?;
            Ok((existing, false))
        }
    }
}

/// Fetch a single job by ID.
pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch job {id}"))?;

    Ok(job)
}

/// List the most recent jobs of a queue, newest first.
pub async fn list_jobs(pool: &PgPool, queue: &str, limit: i64) -> Result<Vec<Job>> {
    let jobs = sqlx::query_as::<_, Job>(
        "SELECT * FROM jobs WHERE queue = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(queue)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list jobs")?;

    Ok(jobs)
}

/// Atomically claim the oldest due `pending` job of a queue.
///
/// The inner `SELECT ... FOR UPDATE SKIP LOCKED` lets concurrent workers
/// pass over rows another transaction is claiming. The claim increments
/// `attempts_made` and never exceeds `max_attempts`.
pub async fn claim_next_job(pool: &PgPool, queue: &str, worker_id: &str) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(
        "UPDATE jobs \
         SET status = 'running', \
             attempts_made = attempts_made + 1, \
             locked_by = $2, \
             locked_at = now(), \
             updated_at = now() \
         WHERE id = ( \
             SELECT id FROM jobs \
             WHERE queue = $1 \
               AND status = 'pending' \
               AND run_at <= now() \
               AND attempts_made < max_attempts \
             ORDER BY run_at ASC, created_at ASC \
             FOR UPDATE SKIP LOCKED \
             LIMIT 1 \
         ) \
         RETURNING *",
    )
    .bind(queue)
    .bind(worker_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to claim job from queue {queue}"))?;

    Ok(job)
}

/// Move a job from `running` to `saving`. Returns rows affected.
pub async fn mark_saving(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'saving', updated_at = now() \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .execute(pool)
    .await
    .with_context(|| format!("failed to mark job {id} saving"))?;

    Ok(result.rows_affected())
}

/// Mark a claimed job completed and record the persisted plan reference.
pub async fn complete_job(pool: &PgPool, id: Uuid, worker_id: &str, result_ref: &str) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET status = 'completed', result_ref = $3, locked_by = NULL, \
             locked_at = NULL, last_error = NULL, updated_at = now() \
         WHERE id = $1 AND locked_by = $2 AND status IN ('running', 'saving')",
    )
    .bind(id)
    .bind(worker_id)
    .bind(result_ref)
    .execute(pool)
    .await
    .with_context(|| format!("failed to complete job {id}"))?;

    Ok(result.rows_affected())
}

/// Return a job claimed by `worker_id` to `pending`, claimable again at
/// `run_at`.
pub async fn schedule_retry(
    pool: &PgPool,
    id: Uuid,
    worker_id: &str,
    run_at: DateTime<Utc>,
    error: &str,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET status = 'pending', run_at = $3, last_error = $4, \
             locked_by = NULL, locked_at = NULL, updated_at = now() \
         WHERE id = $1 AND locked_by = $2 AND status IN ('running', 'saving') \
           AND attempts_made < max_attempts",
    )
    .bind(id)
    .bind(worker_id)
    .bind(run_at)
    .bind(error)
    .execute(pool)
    .await
    .with_context(|| format!("failed to schedule retry for job {id}"))?;

    Ok(result.rows_affected())
}

/// Jobs of a queue that have been claimed since before `locked_before`.
///
/// After a crash these rows stay `running`/`saving` forever; the worker
/// recovers them at startup.
pub async fn find_stale_jobs(
    pool: &PgPool,
    queue: &str,
    locked_before: DateTime<Utc>,
) -> Result<Vec<Job>> {
    let jobs = sqlx::query_as::<_, Job>(
        "SELECT * FROM jobs \
         WHERE queue = $1 AND status IN ('running', 'saving') AND locked_at < $2 \
         ORDER BY locked_at ASC",
    )
    .bind(queue)
    .bind(locked_before)
    .fetch_all(pool)
    .await
    .context("failed to find stale jobs")?;

    Ok(jobs)
}

/// Release a stale claim back to `pending` without touching the attempt
/// counter (the interrupted attempt already consumed it).
pub async fn release_stale_job(pool: &PgPool, id: Uuid, locked_before: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET status = 'pending', locked_by = NULL, locked_at = NULL, \
             last_error = 'worker lost during attempt', updated_at = now() \
         WHERE id = $1 AND status IN ('running', 'saving') AND locked_at < $2",
    )
    .bind(id)
    .bind(locked_before)
    .execute(pool)
    .await
    .with_context(|| format!("failed to release stale job {id}"))?;

    Ok(result.rows_affected())
}

/// Job counts for a queue, grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: i64,
    pub running: i64,
    pub saving: i64,
    pub completed: i64,
    pub failed: i64,
}

impl QueueCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.running + self.saving + self.completed + self.failed
    }
}

/// Count jobs by status for a queue.
pub async fn count_by_status(pool: &PgPool, queue: &str) -> Result<QueueCounts> {
    let rows: Vec<(JobStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM jobs WHERE queue = $1 GROUP BY status")
            .bind(queue)
            .fetch_all(pool)
            .await
            .context("failed to count jobs by status")?;

    let mut counts = QueueCounts::default();
    for (status, n) in rows {
        match status {
            JobStatus::Pending => counts.pending = n,
            JobStatus::Running => counts.running = n,
            JobStatus::Saving => counts.saving = n,
            JobStatus::Completed => counts.completed = n,
            JobStatus::Failed => counts.failed = n,
        }
    }
    Ok(counts)
}
