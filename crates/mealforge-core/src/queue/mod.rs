//! The job queue: durable storage of generation jobs and their attempt
//! state.
//!
//! [`JobQueue`] hides the storage. [`PgJobQueue`] is the production
//! backend; [`InMemoryQueue`] serves tests and single-process runs. Both
//! share the row types of `mealforge-db`.

pub mod memory;
pub mod postgres;
pub mod retry;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use mealforge_db::models::{DeadLetterEntry, Job, JobStatus};
pub use memory::InMemoryQueue;
pub use postgres::PgJobQueue;
pub use retry::RetryPolicy;

use crate::model::JobSubmission;

/// Queue every plan-generation job lives on.
pub const PLAN_GENERATION_QUEUE: &str = "plan-generation";

/// Reason recorded when a crashed worker left a job on its final attempt.
pub const LOST_ON_FINAL_ATTEMPT: &str = "worker lost during final attempt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOptions {
    pub max_attempts: u32,
    /// Earliest claim time relative to now.
    pub delay: Duration,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::default().max_attempts,
            delay: Duration::ZERO,
        }
    }
}

impl EnqueueOptions {
    pub fn run_at(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(self.delay).unwrap_or(chrono::Duration::zero())
    }

    pub(crate) fn max_attempts_i32(&self) -> i32 {
        i32::try_from(self.max_attempts.max(1)).unwrap_or(i32::MAX)
    }
}

/// What [`JobQueue::recover_stale`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recovery {
    /// Returned to `pending` with attempts left.
    pub released: Vec<Uuid>,
    /// Crashed on their last attempt and moved to the dead letter queue.
    pub dead_lettered: Vec<Uuid>,
}

impl Recovery {
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.dead_lettered.is_empty()
    }
}

/// Storage for plan-generation jobs.
///
/// State changes report whether they applied: `false` means the job was
/// not in a state that allows the transition (another worker or a
/// recovery pass got there first).
#[async_trait]
pub trait JobQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Enqueue a submission under its own job id. Re-enqueueing an existing
    /// id returns that id without creating a second job.
    async fn enqueue(&self, submission: &JobSubmission, options: EnqueueOptions) -> Result<Uuid>;

    /// Claim the oldest due `pending` job: it becomes `running`, locked by
    /// `worker_id`, with `attempts_made` incremented.
    async fn claim(&self, worker_id: &str) -> Result<Option<Job>>;

    async fn mark_saving(&self, id: Uuid) -> Result<bool>;

    /// The mutating calls below act only on a job still locked by
    /// `worker_id`; `false` / `None` means the claim was lost.
    async fn complete(&self, id: Uuid, worker_id: &str, result_ref: &str) -> Result<bool>;

    /// Return a claimed job to `pending`, due again at `run_at`.
    async fn retry_later(
        &self,
        id: Uuid,
        worker_id: &str,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> Result<bool>;

    /// Fail a job permanently. Calling it twice yields the same entry.
    async fn dead_letter(&self, id: Uuid, worker_id: &str, reason: &str)
        -> Result<Option<DeadLetterEntry>>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    async fn dead_letters(&self) -> Result<Vec<DeadLetterEntry>>;

    /// Reclaim jobs that have been `running`/`saving` for longer than
    /// `older_than`.
    async fn recover_stale(&self, older_than: Duration) -> Result<Recovery>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn JobQueue) {}
};

pub(crate) fn stale_cutoff(older_than: Duration) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero())
}
