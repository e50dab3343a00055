//! Progress events and the sinks they are delivered to.
//!
//! Publishing is best-effort: callers go through [`emit`], which logs a
//! failed delivery and carries on. Job outcome is decided by the worker,
//! never by whether a progress event arrived.

pub mod broadcast;
pub mod event_log;
pub mod fanout;
pub mod queued;
pub mod recording;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use broadcast::BroadcastNotifier;
pub use event_log::PgEventLog;
pub use fanout::FanoutNotifier;
pub use queued::QueuedNotifier;
pub use recording::RecordingNotifier;

use crate::pipeline::AgentStage;
use crate::sanitize::sanitize_error;

/// `agent` value of events that belong to the job rather than one stage.
pub const JOB_AGENT: u8 = 0;
pub const JOB_AGENT_NAME: &str = "Plan Generation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Running,
    Saving,
    Completed,
    Failed,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Saving => "saving",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One progress update for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub agent: u8,
    pub agent_name: String,
    pub message: String,
    pub status: ProgressStatus,
    pub job_id: Uuid,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub will_retry: Option<bool>,
}

impl ProgressEvent {
    pub fn new(
        job_id: Uuid,
        agent: u8,
        agent_name: &str,
        status: ProgressStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            agent_name: agent_name.to_owned(),
            message: message.into(),
            status,
            job_id,
            timestamp: Utc::now().timestamp_millis(),
            attempt: None,
            will_retry: None,
        }
    }

    /// An event attributed to a pipeline stage.
    pub fn for_stage(
        job_id: Uuid,
        stage: AgentStage,
        status: ProgressStatus,
        message: impl Into<String>,
    ) -> Self {
        Self::new(job_id, stage.number(), stage.name(), status, message)
    }

    /// An event about the job as a whole (saving, completion).
    pub fn for_job(job_id: Uuid, status: ProgressStatus, message: impl Into<String>) -> Self {
        Self::new(job_id, JOB_AGENT, JOB_AGENT_NAME, status, message)
    }

    pub fn with_attempt(mut self, attempt: Option<u32>) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_retry(mut self, will_retry: bool) -> Self {
        self.will_retry = Some(will_retry);
        self
    }

    /// A `failed` event that ends the job for good.
    pub fn is_terminal_failure(&self) -> bool {
        self.status == ProgressStatus::Failed && self.will_retry == Some(false)
    }
}

/// A destination for progress events.
///
/// Implementations return errors freely; [`emit`] is responsible for
/// containing them.
#[async_trait]
pub trait ProgressNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, event: &ProgressEvent) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ProgressNotifier) {}
};

/// Publish `event`, logging (sanitized) instead of propagating a failure.
pub async fn emit(notifier: &dyn ProgressNotifier, event: &ProgressEvent) {
    if let Err(e) = notifier.publish(event).await {
        tracing::warn!(
            job_id = %event.job_id,
            sink = notifier.name(),
            status = event.status.as_str(),
            error = %sanitize_error(&e),
            "progress delivery failed"
        );
    }
}
