use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a generation job.
///
/// ```text
/// pending -> running -> saving -> completed
///               |          |
///               +----------+--> pending   (retry with backoff)
///               +----------+--> failed    (dead-lettered)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Saving,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` are never left again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// A worker currently holds the job.
    pub fn is_claimed(self) -> bool {
        matches!(self, Self::Running | Self::Saving)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Saving => "saving",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for JobStatus {
    type Err = JobStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "saving" => Ok(Self::Saving),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(JobStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`JobStatus`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid job status: {0:?}")]
pub struct JobStatusParseError(pub String);

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A queued plan-generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub queue: String,
    pub status: JobStatus,
    pub payload: Value,
    pub attempts_made: i32,
    pub max_attempts: i32,
    /// Earliest time the job may be claimed; pushed forward by backoff.
    pub run_at: DateTime<Utc>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    /// Sanitized reason of the most recent failed attempt.
    pub last_error: Option<String>,
    /// Identifier returned by the persistence collaborator on completion.
    pub result_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Whether another attempt is allowed after the current one fails.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made < self.max_attempts
    }

    pub fn is_locked_by(&self, worker_id: &str) -> bool {
        self.locked_by.as_deref() == Some(worker_id)
    }
}

/// A job that exhausted its retry budget (or failed permanently).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub original_job_id: Uuid,
    pub original_queue: String,
    pub original_data: Value,
    pub failed_reason: String,
    pub attempts_made: i32,
    pub failed_at: DateTime<Utc>,
}

/// A progress event persisted to the local job event log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobEvent {
    pub id: i64,
    pub job_id: Uuid,
    pub attempt: Option<i32>,
    pub agent: i32,
    pub agent_name: String,
    pub status: JobStatus,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}
