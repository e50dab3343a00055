//! The worker pool: N loops that claim jobs, run the handler under a
//! timeout, and apply the retry / dead-letter policy to failures.

pub mod handler;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub use handler::PlanGenerationHandler;

use crate::error::PipelineError;
use crate::notify::{emit, ProgressEvent, ProgressNotifier, ProgressStatus};
use crate::queue::{Job, JobQueue, RetryPolicy};
use crate::sanitize::sanitize_error;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent job loops.
    pub concurrency: usize,
    /// Sleep between claims when the queue is empty.
    pub poll_interval: Duration,
    /// Wall time limit per attempt.
    pub job_timeout: Duration,
    pub retry: RetryPolicy,
    /// Prefix of each loop's lock owner id (`<prefix>-<n>`).
    pub worker_id: String,
    /// Claims older than this are considered orphaned at startup.
    pub stale_after: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            poll_interval: Duration::from_millis(500),
            job_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            worker_id: format!("worker-{}", std::process::id()),
            stale_after: Duration::from_secs(600),
        }
    }
}

/// What a handler gets for one attempt.
pub struct JobContext<'a> {
    pub job: &'a Job,
    /// 1-based attempt number.
    pub attempt: u32,
    pub queue: &'a dyn JobQueue,
    pub notifier: &'a dyn ProgressNotifier,
}

/// Processes one claimed job end to end and returns the result reference
/// (the persisted plan id).
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, ctx: &JobContext<'_>) -> Result<String>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn JobHandler) {}
};

/// How a processed job ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { result_ref: String },
    RetryScheduled { attempt: u32 },
    DeadLettered { attempt: u32 },
    /// The claim was taken away (stale recovery) before the result could
    /// be recorded; whoever holds the job now owns its fate.
    Lost { attempt: u32 },
}

#[derive(Clone)]
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    notifier: Arc<dyn ProgressNotifier>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        notifier: Arc<dyn ProgressNotifier>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Recover orphaned jobs, then run `concurrency` loops until `cancel`
    /// fires. Each loop finishes its in-flight job before stopping.
    pub async fn run(&self, handler: Arc<dyn JobHandler>, cancel: CancellationToken) -> Result<()> {
        let recovery = self.queue.recover_stale(self.config.stale_after).await?;
        if !recovery.is_empty() {
            tracing::warn!(
                released = recovery.released.len(),
                dead_lettered = recovery.dead_lettered.len(),
                "recovered orphaned jobs"
            );
        }

        let concurrency = self.config.concurrency.max(1);
        tracing::info!(
            queue = self.queue.name(),
            concurrency,
            timeout_secs = self.config.job_timeout.as_secs(),
            "worker pool started"
        );

        let mut loops = JoinSet::new();
        for n in 0..concurrency {
            let worker = self.clone();
            let handler = Arc::clone(&handler);
            let cancel = cancel.clone();
            let worker_id = format!("{}-{n}", self.config.worker_id);
            loops.spawn(async move { worker.run_loop(handler, worker_id, cancel).await });
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker loop panicked");
            }
        }
        tracing::info!("worker pool stopped");
        Ok(())
    }

    async fn run_loop(&self, handler: Arc<dyn JobHandler>, worker_id: String, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            match self.process_next(handler.as_ref(), &worker_id).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(worker_id = %worker_id, error = %sanitize_error(&e), "queue error");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        tracing::debug!(worker_id = %worker_id, "worker loop stopped");
    }

    /// Claim and process at most one job. `None` when nothing was due.
    pub async fn process_next(&self, handler: &dyn JobHandler, worker_id: &str) -> Result<Option<Outcome>> {
        let Some(job) = self.queue.claim(worker_id).await? else {
            return Ok(None);
        };
        let attempt = u32::try_from(job.attempts_made).unwrap_or(1);
        tracing::info!(job_id = %job.id, attempt, worker_id, "job claimed");

        let ctx = JobContext {
            job: &job,
            attempt,
            queue: self.queue.as_ref(),
            notifier: self.notifier.as_ref(),
        };
        let result = match tokio::time::timeout(self.config.job_timeout, handler.handle(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "attempt timed out after {}s",
                self.config.job_timeout.as_secs_f64()
            )),
        };

        let outcome = match result {
            Ok(result_ref) => {
                if self.queue.complete(job.id, worker_id, &result_ref).await? {
                    tracing::info!(job_id = %job.id, attempt, result_ref = %result_ref, "job completed");
                    Outcome::Completed { result_ref }
                } else {
                    tracing::warn!(job_id = %job.id, attempt, worker_id, "job was no longer claimed at completion");
                    Outcome::Lost { attempt }
                }
            }
            Err(e) => self.fail(&job, worker_id, attempt, &e).await?,
        };
        Ok(Some(outcome))
    }

    async fn fail(&self, job: &Job, worker_id: &str, attempt: u32, err: &anyhow::Error) -> Result<Outcome> {
        let message = sanitize_error(err);
        let typed = err.downcast_ref::<PipelineError>();
        let retryable = typed.is_none_or(PipelineError::is_retryable);

        let event = |will_retry: bool| {
            let event = match typed {
                Some(e) => ProgressEvent::for_stage(job.id, e.stage(), ProgressStatus::Failed, &message),
                None => ProgressEvent::for_job(job.id, ProgressStatus::Failed, &message),
            };
            event.with_attempt(Some(attempt)).with_retry(will_retry)
        };

        if retryable && job.has_attempts_left() {
            let delay = self.config.retry.delay_for_attempt(attempt);
            let run_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
            if self.queue.retry_later(job.id, worker_id, run_at, &message).await? {
                tracing::warn!(
                    job_id = %job.id,
                    attempt,
                    max_attempts = job.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "attempt failed; retry scheduled"
                );
                emit(self.notifier.as_ref(), &event(true)).await;
                return Ok(Outcome::RetryScheduled { attempt });
            }
            tracing::warn!(job_id = %job.id, attempt, worker_id, "retry not scheduled; job no longer claimed");
            return Ok(Outcome::Lost { attempt });
        }

        let Some(entry) = self.queue.dead_letter(job.id, worker_id, &message).await? else {
            tracing::warn!(job_id = %job.id, attempt, worker_id, "not dead-lettered; job no longer claimed");
            return Ok(Outcome::Lost { attempt });
        };
        tracing::error!(
            job_id = %job.id,
            attempts_made = entry.attempts_made,
            retryable,
            error = %message,
            "job failed permanently; moved to dead letter queue"
        );
        emit(self.notifier.as_ref(), &event(false)).await;
        Ok(Outcome::DeadLettered { attempt })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use uuid::Uuid;

    use super::*;
    use crate::model::{JobSubmission, RawIntakeForm};
    use crate::notify::RecordingNotifier;
    use crate::queue::{EnqueueOptions, InMemoryQueue, JobStatus};

    struct Scripted {
        failures: u32,
        error: fn() -> anyhow::Error,
        calls: AtomicU32,
    }

    #[async_trait]
    impl JobHandler for Scripted {
        async fn handle(&self, ctx: &JobContext<'_>) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(ctx.attempt, n);
            if n <= self.failures {
                return Err((self.error)());
            }
            Ok(format!("plan-{}", ctx.job.id))
        }
    }

    fn fast_worker(queue: Arc<InMemoryQueue>, notifier: Arc<RecordingNotifier>) -> Worker {
        let config = WorkerConfig {
            retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
            job_timeout: Duration::from_secs(5),
            ..WorkerConfig::default()
        };
        Worker::new(queue, notifier, config)
    }

    async fn enqueue(queue: &InMemoryQueue, max_attempts: u32) -> Uuid {
        let submission = JobSubmission {
            intake_data: RawIntakeForm::default(),
            job_id: Uuid::new_v4(),
        };
        let options = EnqueueOptions {
            max_attempts,
            ..Default::default()
        };
        queue.enqueue(&submission, options).await.unwrap()
    }

    #[tokio::test]
    async fn empty_queue_yields_nothing() {
        let worker = fast_worker(Arc::new(InMemoryQueue::new()), Arc::new(RecordingNotifier::new()));
        let handler = Scripted {
            failures: 0,
            error: || anyhow!("unused"),
            calls: AtomicU32::new(0),
        };
        assert_eq!(worker.process_next(&handler, "w").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_intake_is_dead_lettered_immediately() {
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let worker = fast_worker(queue.clone(), notifier.clone());
        let id = enqueue(&queue, 3).await;
        let handler = Scripted {
            failures: 1,
            error: || PipelineError::InvalidIntake("age is required".into()).into(),
            calls: AtomicU32::new(0),
        };

        let outcome = worker.process_next(&handler, "w").await.unwrap();
        assert_eq!(outcome, Some(Outcome::DeadLettered { attempt: 1 }));
        assert_eq!(queue.get(id).await.unwrap().unwrap().status, JobStatus::Failed);

        let events = notifier.events_for(id);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal_failure());
        assert_eq!(events[0].agent, 1);
    }

    #[tokio::test]
    async fn failures_retry_then_succeed() {
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let worker = fast_worker(queue.clone(), notifier.clone());
        let id = enqueue(&queue, 3).await;
        let handler = Scripted {
            failures: 1,
            error: || anyhow!("recipe service returned 503"),
            calls: AtomicU32::new(0),
        };

        let first = worker.process_next(&handler, "w").await.unwrap();
        assert_eq!(first, Some(Outcome::RetryScheduled { attempt: 1 }));
        let second = worker.process_next(&handler, "w").await.unwrap();
        assert_eq!(
            second,
            Some(Outcome::Completed {
                result_ref: format!("plan-{id}")
            })
        );

        let events = notifier.events_for(id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].will_retry, Some(true));
        assert_eq!(events[0].attempt, Some(1));
        assert_eq!(events[0].agent, 0);
    }

    struct Slow;

    #[async_trait]
    impl JobHandler for Slow {
        async fn handle(&self, _: &JobContext<'_>) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("never".into())
        }
    }

    #[tokio::test]
    async fn timeout_counts_as_a_failed_attempt() {
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let mut worker = fast_worker(queue.clone(), notifier.clone());
        worker.config.job_timeout = Duration::from_millis(20);
        let id = enqueue(&queue, 1).await;

        let outcome = worker.process_next(&Slow, "w").await.unwrap();
        assert_eq!(outcome, Some(Outcome::DeadLettered { attempt: 1 }));
        let dlq = queue.dead_letters().await.unwrap();
        assert!(dlq[0].failed_reason.contains("timed out"));
        assert_eq!(notifier.events_for(id).len(), 1);
    }

    /// Fails after the job has been recovered and claimed by someone else.
    struct Preempted;

    #[async_trait]
    impl JobHandler for Preempted {
        async fn handle(&self, ctx: &JobContext<'_>) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            ctx.queue.recover_stale(Duration::ZERO).await?;
            let other = ctx.queue.claim("w-other").await?;
            assert_eq!(other.map(|j| j.id), Some(ctx.job.id));
            Err(anyhow!("recipe service returned 503"))
        }
    }

    #[tokio::test]
    async fn preempted_attempt_leaves_the_new_owner_alone() {
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let worker = fast_worker(queue.clone(), notifier.clone());
        let id = enqueue(&queue, 3).await;

        let outcome = worker.process_next(&Preempted, "w").await.unwrap();
        assert_eq!(outcome, Some(Outcome::Lost { attempt: 1 }));

        let job = queue.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.locked_by.as_deref(), Some("w-other"));
        assert_eq!(job.attempts_made, 2);
        assert!(queue.dead_letters().await.unwrap().is_empty());
        assert!(notifier.events_for(id).is_empty());
    }

    #[tokio::test]
    async fn failure_on_someone_elses_claim_is_not_dead_lettered() {
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let worker = fast_worker(queue.clone(), notifier.clone());
        let id = enqueue(&queue, 1).await;
        let job = queue.claim("w-other").await.unwrap().unwrap();

        let err: anyhow::Error = PipelineError::InvalidIntake("age is required".into()).into();
        let outcome = worker.fail(&job, "w", 1, &err).await.unwrap();
        assert_eq!(outcome, Outcome::Lost { attempt: 1 });
        assert!(queue.dead_letters().await.unwrap().is_empty());
        assert_eq!(queue.get(id).await.unwrap().unwrap().status, JobStatus::Running);
        assert!(notifier.events_for(id).is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let mut worker = fast_worker(queue.clone(), notifier);
        worker.config.poll_interval = Duration::from_millis(5);
        let id = enqueue(&queue, 3).await;
        let handler: Arc<dyn JobHandler> = Arc::new(Scripted {
            failures: 0,
            error: || anyhow!("unused"),
            calls: AtomicU32::new(0),
        });

        let cancel = CancellationToken::new();
        let pool = tokio::spawn({
            let worker = worker.clone();
            let cancel = cancel.clone();
            async move { worker.run(handler, cancel).await }
        });

        for _ in 0..200 {
            if queue.get(id).await.unwrap().unwrap().status == JobStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        pool.await.unwrap().unwrap();
        assert_eq!(queue.get(id).await.unwrap().unwrap().status, JobStatus::Completed);
    }
}
