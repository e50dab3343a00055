//! Database query functions for the `dead_letters` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::DeadLetterEntry;

/// Move a claimed job to the dead letter queue.
///
/// In one transaction the job transitions to `failed` and its context is
/// copied into `dead_letters`. The status guard plus the unique
/// `original_job_id` make the move happen exactly once: a second call finds
/// the job already `failed` and returns the existing entry.
///
/// With `owner` set, only a job still locked by that worker is moved.
/// Returns `None` when the job was not claimed (or not by `owner`) and has
/// never been dead-lettered.
pub async fn dead_letter_job(
    pool: &PgPool,
    job_id: Uuid,
    owner: Option<&str>,
    reason: &str,
) -> Result<Option<DeadLetterEntry>> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to begin dead-letter transaction")?;

    let moved = sqlx::query(
        "UPDATE jobs \
         SET status = 'failed', last_error = $2, locked_by = NULL, \
             locked_at = NULL, updated_at = now() \
         WHERE id = $1 AND status IN ('running', 'saving') \
           AND ($3::text IS NULL OR locked_by = $3)",
    )
    .bind(job_id)
    .bind(reason)
    .bind(owner)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("failed to mark job {job_id} failed"))?
    .rows_affected();

    if moved == 1 {
        sqlx::query(
            "INSERT INTO dead_letters \
                 (original_job_id, original_queue, original_data, failed_reason, attempts_made) \
             SELECT id, queue, payload, $2, attempts_made FROM jobs WHERE id = $1 \
             ON CONFLICT (original_job_id) DO NOTHING",
        )
        .bind(job_id)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert dead letter for job {job_id}"))?;
    }

    tx.commit()
        .await
        .context("failed to commit dead-letter transaction")?;

    get_dead_letter_for_job(pool, job_id).await
}

/// Fetch the dead letter entry for an original job, if any.
pub async fn get_dead_letter_for_job(
    pool: &PgPool,
    job_id: Uuid,
) -> Result<Option<DeadLetterEntry>> {
    let entry = sqlx::query_as::<_, DeadLetterEntry>(
        "SELECT * FROM dead_letters WHERE original_job_id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to fetch dead letter for job {job_id}"))?;

    Ok(entry)
}

/// List dead letter entries for a queue, most recent first.
pub async fn list_dead_letters(pool: &PgPool, queue: &str) -> Result<Vec<DeadLetterEntry>> {
    let entries = sqlx::query_as::<_, DeadLetterEntry>(
        "SELECT * FROM dead_letters WHERE original_queue = $1 ORDER BY failed_at DESC",
    )
    .bind(queue)
    .fetch_all(pool)
    .await
    .context("failed to list dead letters")?;

    Ok(entries)
}
