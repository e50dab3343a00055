//! Durable progress history in the `job_events` table.

use anyhow::Result;
use async_trait::async_trait;
use mealforge_db::models::JobStatus;
use mealforge_db::queries::job_events::{insert_job_event, NewJobEvent};
use sqlx::PgPool;

use super::{ProgressEvent, ProgressNotifier, ProgressStatus};

/// Appends every event to `job_events`, so `mealforge log` can replay a
/// job's history after the fact.
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn job_status(status: ProgressStatus) -> JobStatus {
    match status {
        ProgressStatus::Running => JobStatus::Running,
        ProgressStatus::Saving => JobStatus::Saving,
        ProgressStatus::Completed => JobStatus::Completed,
        ProgressStatus::Failed => JobStatus::Failed,
    }
}

#[async_trait]
impl ProgressNotifier for PgEventLog {
    fn name(&self) -> &str {
        "event-log"
    }

    async fn publish(&self, event: &ProgressEvent) -> Result<()> {
        let attempt = event.attempt.map(|a| i32::try_from(a).unwrap_or(i32::MAX));
        insert_job_event(
            &self.pool,
            &NewJobEvent {
                job_id: event.job_id,
                attempt,
                agent: i32::from(event.agent),
                agent_name: &event.agent_name,
                status: job_status(event.status),
                message: &event.message,
            },
        )
        .await?;
        Ok(())
    }
}
