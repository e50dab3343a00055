use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    stale_cutoff, DeadLetterEntry, EnqueueOptions, Job, JobQueue, JobStatus, Recovery,
    LOST_ON_FINAL_ATTEMPT, PLAN_GENERATION_QUEUE,
};
use crate::model::JobSubmission;

#[derive(Debug, Default)]
struct State {
    jobs: HashMap<Uuid, Job>,
    dead_letters: Vec<DeadLetterEntry>,
}

impl State {
    fn job_mut(&mut self, id: Uuid) -> Result<&mut Job> {
        self.jobs
            .get_mut(&id)
            .with_context(|| format!("job {id} not found"))
    }

    /// Claimed jobs only; with `owner` set, only that worker's claim.
    fn dead_letter(
        &mut self,
        id: Uuid,
        owner: Option<&str>,
        reason: &str,
    ) -> Result<Option<DeadLetterEntry>> {
        if let Some(existing) = self.dead_letters.iter().find(|e| e.original_job_id == id) {
            return Ok(Some(existing.clone()));
        }

        let job = self.job_mut(id)?;
        if !job.status.is_claimed() || owner.is_some_and(|o| !job.is_locked_by(o)) {
            return Ok(None);
        }
        let now = Utc::now();
        job.status = JobStatus::Failed;
        job.last_error = Some(reason.to_owned());
        job.locked_by = None;
        job.locked_at = None;
        job.updated_at = now;

        let entry = DeadLetterEntry {
            id: Uuid::new_v4(),
            original_job_id: id,
            original_queue: job.queue.clone(),
            original_data: job.payload.clone(),
            failed_reason: reason.to_owned(),
            attempts_made: job.attempts_made,
            failed_at: now,
        };
        self.dead_letters.push(entry.clone());
        Ok(Some(entry))
    }
}

/// Process-local queue behind a mutex. Claims are atomic because the whole
/// select-and-update happens under one lock.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<State>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("in-memory queue lock poisoned"))
    }

    /// All jobs, oldest first.
    pub fn jobs(&self) -> Result<Vec<Job>> {
        let state = self.lock()?;
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    fn name(&self) -> &str {
        "memory"
    }

    async fn enqueue(&self, submission: &JobSubmission, options: EnqueueOptions) -> Result<Uuid> {
        let payload = serde_json::to_value(submission)
            .with_context(|| format!("failed to encode job {}", submission.job_id))?;
        let mut state = self.lock()?;
        let id = submission.job_id;
        if state.jobs.contains_key(&id) {
            tracing::debug!(job_id = %id, "job already enqueued");
            return Ok(id);
        }

        let now = Utc::now();
        state.jobs.insert(
            id,
            Job {
                id,
                queue: PLAN_GENERATION_QUEUE.to_owned(),
                status: JobStatus::Pending,
                payload,
                attempts_made: 0,
                max_attempts: options.max_attempts_i32(),
                run_at: options.run_at(),
                locked_by: None,
                locked_at: None,
                last_error: None,
                result_ref: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<Job>> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let next = state
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.run_at <= now && j.has_attempts_left())
            .min_by_key(|j| (j.run_at, j.created_at))
            .map(|j| j.id);

        let Some(id) = next else {
            return Ok(None);
        };
        let job = state.job_mut(id)?;
        job.status = JobStatus::Running;
        job.attempts_made += 1;
        job.locked_by = Some(worker_id.to_owned());
        job.locked_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn mark_saving(&self, id: Uuid) -> Result<bool> {
        let mut state = self.lock()?;
        let job = state.job_mut(id)?;
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        job.status = JobStatus::Saving;
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn complete(&self, id: Uuid, worker_id: &str, result_ref: &str) -> Result<bool> {
        let mut state = self.lock()?;
        let job = state.job_mut(id)?;
        if !job.status.is_claimed() || !job.is_locked_by(worker_id) {
            return Ok(false);
        }
        job.status = JobStatus::Completed;
        job.result_ref = Some(result_ref.to_owned());
        job.last_error = None;
        job.locked_by = None;
        job.locked_at = None;
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn retry_later(
        &self,
        id: Uuid,
        worker_id: &str,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        let job = state.job_mut(id)?;
        if !job.status.is_claimed() || !job.is_locked_by(worker_id) || !job.has_attempts_left() {
            return Ok(false);
        }
        job.status = JobStatus::Pending;
        job.run_at = run_at;
        job.last_error = Some(error.to_owned());
        job.locked_by = None;
        job.locked_at = None;
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn dead_letter(
        &self,
        id: Uuid,
        worker_id: &str,
        reason: &str,
    ) -> Result<Option<DeadLetterEntry>> {
        self.lock()?.dead_letter(id, Some(worker_id), reason)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.lock()?.jobs.get(&id).cloned())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetterEntry>> {
        let mut entries = self.lock()?.dead_letters.clone();
        entries.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        Ok(entries)
    }

    async fn recover_stale(&self, older_than: Duration) -> Result<Recovery> {
        let cutoff = stale_cutoff(older_than);
        let mut state = self.lock()?;
        let stale: Vec<(Uuid, bool)> = state
            .jobs
            .values()
            .filter(|j| j.status.is_claimed() && j.locked_at.is_some_and(|t| t < cutoff))
            .map(|j| (j.id, j.has_attempts_left()))
            .collect();

        let mut recovery = Recovery::default();
        for (id, attempts_left) in stale {
            if attempts_left {
                let job = state.job_mut(id)?;
                job.status = JobStatus::Pending;
                job.locked_by = None;
                job.locked_at = None;
                job.last_error = Some("worker lost during attempt".to_owned());
                job.updated_at = Utc::now();
                recovery.released.push(id);
            } else {
                if state.dead_letter(id, None, LOST_ON_FINAL_ATTEMPT)?.is_some() {
                    recovery.dead_lettered.push(id);
                }
            }
        }
        Ok(recovery)
    }
}
