use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{JobContext, JobHandler};
use crate::error::PipelineError;
use crate::model::JobSubmission;
use crate::notify::{emit, ProgressEvent, ProgressStatus};
use crate::persistence::{complete_with_retry, completion_retry_policy, CompletionRequest, PlanStore};
use crate::pipeline::{run_pipeline, PipelineContext};
use crate::queue::RetryPolicy;

/// Generates a meal plan for one job: runs the pipeline, hands the plan to
/// the persistence service and returns the plan id it assigned.
#[derive(Clone)]
pub struct PlanGenerationHandler {
    pipeline: PipelineContext,
    store: Arc<dyn PlanStore>,
    completion_retry: RetryPolicy,
}

impl PlanGenerationHandler {
    pub fn new(pipeline: PipelineContext, store: Arc<dyn PlanStore>) -> Self {
        Self {
            pipeline,
            store,
            completion_retry: completion_retry_policy(),
        }
    }

    pub fn with_completion_retry(mut self, policy: RetryPolicy) -> Self {
        self.completion_retry = policy;
        self
    }
}

#[async_trait]
impl JobHandler for PlanGenerationHandler {
    async fn handle(&self, ctx: &JobContext<'_>) -> Result<String> {
        let job_id = ctx.job.id;
        let submission: JobSubmission = serde_json::from_value(ctx.job.payload.clone())
            .map_err(|e| PipelineError::InvalidIntake(format!("unreadable submission: {e}")))?;
        if submission.job_id != job_id {
            tracing::warn!(job_id = %job_id, payload_job_id = %submission.job_id, "payload names a different job id");
        }

        let output = run_pipeline(
            job_id,
            Some(ctx.attempt),
            &submission.intake_data,
            &self.pipeline,
            ctx.notifier,
        )
        .await?;

        if !ctx.queue.mark_saving(job_id).await? {
            tracing::warn!(job_id = %job_id, "job was not running when saving began");
        }
        let saving = ProgressEvent::for_job(job_id, ProgressStatus::Saving, "Saving meal plan")
            .with_attempt(Some(ctx.attempt));
        emit(ctx.notifier, &saving).await;

        let request = CompletionRequest {
            job_id,
            plan_data: output.plan,
            metabolic_profile: output.profile,
        };
        let plan_id = complete_with_retry(self.store.as_ref(), &request, &self.completion_retry).await?;

        let completed = ProgressEvent::for_job(job_id, ProgressStatus::Completed, format!("Meal plan {plan_id} ready"))
            .with_attempt(Some(ctx.attempt));
        emit(ctx.notifier, &completed).await;
        Ok(plan_id)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::persistence::MemoryPlanStore;
    use crate::pipeline::orchestrator::test_support;
    use crate::queue::{EnqueueOptions, InMemoryQueue, JobQueue, JobStatus};
    use crate::worker::{Outcome, Worker, WorkerConfig};

    #[tokio::test]
    async fn generates_and_stores_a_plan() {
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let store = Arc::new(MemoryPlanStore::new());
        let handler = PlanGenerationHandler::new(PipelineContext::deterministic(), store.clone());
        let worker = Worker::new(queue.clone(), notifier.clone(), WorkerConfig::default());

        let submission = JobSubmission {
            intake_data: test_support::form(),
            job_id: Uuid::new_v4(),
        };
        let id = queue.enqueue(&submission, EnqueueOptions::default()).await.unwrap();

        let Some(Outcome::Completed { result_ref }) = worker.process_next(&handler, "w").await.unwrap() else {
            panic!("job did not complete");
        };
        let job = queue.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_ref.as_deref(), Some(result_ref.as_str()));
        assert!(store.plan(&result_ref).is_some());

        let events = notifier.events_for(id);
        let tail: Vec<ProgressStatus> = events.iter().rev().take(2).map(|e| e.status).collect();
        assert_eq!(tail, vec![ProgressStatus::Completed, ProgressStatus::Saving]);
        assert_eq!(events.len(), 14);
    }

    #[tokio::test]
    async fn missing_required_fields_fail_without_retry() {
        let queue = Arc::new(InMemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let handler = PlanGenerationHandler::new(
            PipelineContext::deterministic(),
            Arc::new(MemoryPlanStore::new()),
        );
        let worker = Worker::new(queue.clone(), notifier.clone(), WorkerConfig::default());

        let submission = JobSubmission {
            intake_data: Default::default(),
            job_id: Uuid::new_v4(),
        };
        let id = queue.enqueue(&submission, EnqueueOptions::default()).await.unwrap();

        let outcome = worker.process_next(&handler, "w").await.unwrap();
        assert_eq!(outcome, Some(Outcome::DeadLettered { attempt: 1 }));
        let dlq = queue.dead_letters().await.unwrap();
        assert_eq!(dlq.len(), 1);
        assert!(dlq[0].failed_reason.starts_with("invalid intake"));
        assert!(notifier.events_for(id).last().unwrap().is_terminal_failure());
    }
}
