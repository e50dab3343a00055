//! Retry, dead-letter and progress-stream behaviour of the worker pool,
//! driven against the in-memory queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use uuid::Uuid;

use mealforge_core::model::{JobSubmission, RawIntakeForm};
use mealforge_core::notify::{
    BroadcastNotifier, FanoutNotifier, ProgressEvent, ProgressNotifier, ProgressStatus,
    QueuedNotifier, RecordingNotifier,
};
use mealforge_core::persistence::MemoryPlanStore;
use mealforge_core::pipeline::PipelineContext;
use mealforge_core::queue::{EnqueueOptions, InMemoryQueue, JobQueue, JobStatus, RetryPolicy};
use mealforge_core::worker::{
    JobContext, JobHandler, Outcome, PlanGenerationHandler, Worker, WorkerConfig,
};

// ===========================================================================
// Harness
// ===========================================================================

struct Harness {
    queue: Arc<InMemoryQueue>,
    broadcast: BroadcastNotifier,
    recorder: Arc<RecordingNotifier>,
    store: Arc<MemoryPlanStore>,
    worker: Worker,
}

impl Harness {
    fn new() -> Self {
        let queue = Arc::new(InMemoryQueue::new());
        let broadcast = BroadcastNotifier::default();
        let recorder = Arc::new(RecordingNotifier::new());
        let fanout = FanoutNotifier::new()
            .with(Arc::new(broadcast.clone()))
            .with(recorder.clone());
        let config = WorkerConfig {
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10)),
            poll_interval: Duration::from_millis(2),
            ..WorkerConfig::default()
        };
        Self {
            worker: Worker::new(queue.clone(), Arc::new(fanout), config),
            queue,
            broadcast,
            recorder,
            store: Arc::new(MemoryPlanStore::new()),
        }
    }

    fn plan_handler(&self) -> PlanGenerationHandler {
        PlanGenerationHandler::new(PipelineContext::deterministic(), self.store.clone())
    }

    async fn enqueue(&self, max_attempts: u32) -> Uuid {
        let submission = JobSubmission {
            intake_data: form(),
            job_id: Uuid::new_v4(),
        };
        let options = EnqueueOptions {
            max_attempts,
            ..Default::default()
        };
        self.queue.enqueue(&submission, options).await.unwrap()
    }

    /// Process jobs until `id` reaches a terminal state.
    async fn drive(&self, handler: &dyn JobHandler, id: Uuid) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for _ in 0..500 {
            match self.worker.process_next(handler, "test-worker").await.unwrap() {
                Some(outcome) => outcomes.push(outcome),
                None => tokio::time::sleep(Duration::from_millis(2)).await,
            }
            let job = self.queue.get(id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                return outcomes;
            }
        }
        panic!("job {id} never finished");
    }
}

fn form() -> RawIntakeForm {
    serde_json::from_value(serde_json::json!({
        "sex": "male",
        "age": 41,
        "heightCm": 183,
        "weightKg": 90,
        "goalType": "bulk",
        "goalRate": "conservative",
        "activityLevel": "very_active",
        "trainingDays": ["tue", "thu", "sat"]
    }))
    .unwrap()
}

/// Drain whatever the stream has buffered.
async fn collect(stream: impl Stream<Item = ProgressEvent>) -> Vec<ProgressEvent> {
    tokio::pin!(stream);
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), stream.next()).await {
        events.push(event);
    }
    events
}

/// Fails the first `failures` attempts, then delegates.
struct FailFirst<H> {
    failures: u32,
    inner: H,
}

#[async_trait]
impl<H: JobHandler> JobHandler for FailFirst<H> {
    async fn handle(&self, ctx: &JobContext<'_>) -> Result<String> {
        if ctx.attempt <= self.failures {
            return Err(anyhow!("nutrition service unavailable (attempt {})", ctx.attempt));
        }
        self.inner.handle(ctx).await
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn always_failing_job_is_dead_lettered_once() {
    let h = Harness::new();
    let id = h.enqueue(3).await;
    let handler = FailFirst {
        failures: u32::MAX,
        inner: h.plan_handler(),
    };

    let outcomes = h.drive(&handler, id).await;
    assert_eq!(
        outcomes,
        vec![
            Outcome::RetryScheduled { attempt: 1 },
            Outcome::RetryScheduled { attempt: 2 },
            Outcome::DeadLettered { attempt: 3 },
        ]
    );

    let job = h.queue.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts_made, 3);

    let dlq = h.queue.dead_letters().await.unwrap();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].original_job_id, id);
    assert_eq!(dlq[0].attempts_made, job.max_attempts);

    let events = h.recorder.events_for(id);
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal_failure()).collect();
    assert_eq!(terminal.len(), 1);
    let retries = events
        .iter()
        .filter(|e| e.status == ProgressStatus::Failed && e.will_retry == Some(true))
        .count();
    assert_eq!(retries, 2);

    // Nothing left to claim.
    assert!(h.worker.process_next(&handler, "w").await.unwrap().is_none());
}

#[tokio::test]
async fn succeeds_on_third_attempt() {
    let h = Harness::new();
    let id = h.enqueue(3).await;
    let stream = h.broadcast.subscribe(id);
    let handler = FailFirst {
        failures: 2,
        inner: h.plan_handler(),
    };

    let outcomes = h.drive(&handler, id).await;
    let Some(Outcome::Completed { result_ref }) = outcomes.last() else {
        panic!("expected completion, got {outcomes:?}");
    };

    let job = h.queue.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts_made, 3);
    assert_eq!(job.result_ref.as_deref(), Some(result_ref.as_str()));
    assert!(h.store.plan(result_ref).is_some());
    assert!(h.queue.dead_letters().await.unwrap().is_empty());

    let streamed = collect(stream).await;
    let milestones: Vec<(ProgressStatus, Option<bool>)> = streamed
        .iter()
        .filter(|e| e.status != ProgressStatus::Running)
        .map(|e| (e.status, e.will_retry))
        .collect();
    assert_eq!(
        milestones,
        vec![
            (ProgressStatus::Failed, Some(true)),
            (ProgressStatus::Failed, Some(true)),
            (ProgressStatus::Saving, None),
            (ProgressStatus::Completed, None),
        ]
    );
    assert_eq!(streamed, h.recorder.events_for(id));
}

#[tokio::test]
async fn retry_attempts_are_numbered() {
    let h = Harness::new();
    let id = h.enqueue(2).await;
    let handler = FailFirst {
        failures: u32::MAX,
        inner: h.plan_handler(),
    };
    h.drive(&handler, id).await;

    let attempts: Vec<Option<u32>> = h
        .recorder
        .events_for(id)
        .iter()
        .filter(|e| e.status == ProgressStatus::Failed)
        .map(|e| e.attempt)
        .collect();
    assert_eq!(attempts, vec![Some(1), Some(2)]);
}

#[tokio::test]
async fn pool_processes_many_jobs_concurrently() {
    let h = Harness::new();
    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(h.enqueue(3).await);
    }
    let handler: Arc<dyn JobHandler> = Arc::new(h.plan_handler());
    let cancel = tokio_util::sync::CancellationToken::new();

    let pool = tokio::spawn({
        let worker = h.worker.clone();
        let cancel = cancel.clone();
        async move { worker.run(handler, cancel).await }
    });

    for _ in 0..1000 {
        let mut done = 0;
        for id in &ids {
            if h.queue.get(*id).await.unwrap().unwrap().status == JobStatus::Completed {
                done += 1;
            }
        }
        if done == ids.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();
    pool.await.unwrap().unwrap();

    for id in &ids {
        let job = h.queue.get(*id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed, "job {id}");
        assert_eq!(job.attempts_made, 1);
    }
    assert_eq!(h.store.plan_count(), ids.len());
}

/// A sink that stalls on every event and then fails.
struct StallingSink;

#[async_trait]
impl ProgressNotifier for StallingSink {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn publish(&self, _: &ProgressEvent) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(anyhow!("persistence service timed out"))
    }
}

#[tokio::test]
async fn slow_progress_sink_does_not_time_out_the_job() {
    let queue = Arc::new(InMemoryQueue::new());
    let recorder = Arc::new(RecordingNotifier::new());
    let fanout = FanoutNotifier::new()
        .with(Arc::new(QueuedNotifier::spawn(Arc::new(StallingSink), 64)))
        .with(recorder.clone());
    let config = WorkerConfig {
        job_timeout: Duration::from_millis(400),
        retry: RetryPolicy::new(1, Duration::ZERO, Duration::ZERO),
        ..WorkerConfig::default()
    };
    let worker = Worker::new(queue.clone(), Arc::new(fanout), config);
    let store = Arc::new(MemoryPlanStore::new());
    let handler = PlanGenerationHandler::new(PipelineContext::deterministic(), store.clone());

    let submission = JobSubmission {
        intake_data: form(),
        job_id: Uuid::new_v4(),
    };
    let id = queue.enqueue(&submission, EnqueueOptions::default()).await.unwrap();

    let outcome = worker.process_next(&handler, "w").await.unwrap();
    assert!(matches!(outcome, Some(Outcome::Completed { .. })), "got {outcome:?}");
    assert_eq!(queue.get(id).await.unwrap().unwrap().status, JobStatus::Completed);
    // Stage start/finish pairs plus saving and completed.
    assert!(recorder.events_for(id).len() > 7);
    assert_eq!(store.plan_count(), 1);
}
