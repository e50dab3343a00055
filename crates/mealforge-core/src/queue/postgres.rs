use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mealforge_db::queries::{dead_letters, jobs};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    stale_cutoff, DeadLetterEntry, EnqueueOptions, Job, JobQueue, Recovery,
    LOST_ON_FINAL_ATTEMPT, PLAN_GENERATION_QUEUE,
};
use crate::model::JobSubmission;

/// PostgreSQL-backed queue. Claims use `FOR UPDATE SKIP LOCKED`, so any
/// number of worker processes can share one database.
#[derive(Debug, Clone)]
pub struct PgJobQueue {
    pool: PgPool,
    queue: String,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self::with_queue(pool, PLAN_GENERATION_QUEUE)
    }

    pub fn with_queue(pool: PgPool, queue: impl Into<String>) -> Self {
        Self {
            pool,
            queue: queue.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn enqueue(&self, submission: &JobSubmission, options: EnqueueOptions) -> Result<Uuid> {
        let payload = serde_json::to_value(submission)
            .with_context(|| format!("failed to encode job {}", submission.job_id))?;
        let (job, created) = jobs::insert_job(
            &self.pool,
            &jobs::NewJob {
                id: submission.job_id,
                queue: &self.queue,
                payload: &payload,
                max_attempts: options.max_attempts_i32(),
                run_at: options.run_at(),
            },
        )
        .await?;

        if created {
            tracing::info!(job_id = %job.id, queue = %self.queue, "job enqueued");
        } else {
            tracing::debug!(job_id = %job.id, status = %job.status, "job already enqueued");
        }
        Ok(job.id)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<Job>> {
        jobs::claim_next_job(&self.pool, &self.queue, worker_id).await
    }

    async fn mark_saving(&self, id: Uuid) -> Result<bool> {
        Ok(jobs::mark_saving(&self.pool, id).await? == 1)
    }

    async fn complete(&self, id: Uuid, worker_id: &str, result_ref: &str) -> Result<bool> {
        Ok(jobs::complete_job(&self.pool, id, worker_id, result_ref).await? == 1)
    }

    async fn retry_later(
        &self,
        id: Uuid,
        worker_id: &str,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> Result<bool> {
        Ok(jobs::schedule_retry(&self.pool, id, worker_id, run_at, error).await? == 1)
    }

    async fn dead_letter(
        &self,
        id: Uuid,
        worker_id: &str,
        reason: &str,
    ) -> Result<Option<DeadLetterEntry>> {
        dead_letters::dead_letter_job(&self.pool, id, Some(worker_id), reason).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        jobs::get_job(&self.pool, id).await
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetterEntry>> {
        dead_letters::list_dead_letters(&self.pool, &self.queue).await
    }

    async fn recover_stale(&self, older_than: Duration) -> Result<Recovery> {
        let cutoff = stale_cutoff(older_than);
        let stale = jobs::find_stale_jobs(&self.pool, &self.queue, cutoff).await?;

        let mut recovery = Recovery::default();
        for job in stale {
            if job.has_attempts_left() {
                if jobs::release_stale_job(&self.pool, job.id, cutoff).await? == 1 {
                    tracing::warn!(job_id = %job.id, attempts_made = job.attempts_made, "released stale job");
                    recovery.released.push(job.id);
                }
            } else {
                let moved =
                    dead_letters::dead_letter_job(&self.pool, job.id, None, LOST_ON_FINAL_ATTEMPT).await?;
                if moved.is_some() {
                    tracing::warn!(job_id = %job.id, "stale job had no attempts left; dead-lettered");
                    recovery.dead_lettered.push(job.id);
                }
            }
        }
        Ok(recovery)
    }
}
