//! Handoff of finished plans (and progress reports) to the persistence
//! service that owns them.

pub mod http;
pub mod memory;
pub mod signing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use http::HttpPlanStore;
pub use memory::MemoryPlanStore;
pub use signing::{SignatureError, SigningKey};

use crate::model::{MetabolicProfile, RenderedPlan};
use crate::notify::{ProgressEvent, ProgressNotifier};
use crate::queue::RetryPolicy;
use crate::sanitize::sanitize_error;

/// Body of `POST /plan/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub job_id: Uuid,
    pub plan_data: RenderedPlan,
    pub metabolic_profile: MetabolicProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub plan_id: String,
}

/// The service that stores finished plans.
#[async_trait]
pub trait PlanStore: Send + Sync {
    fn name(&self) -> &str;

    /// Durable record of one progress event.
    async fn report_progress(&self, event: &ProgressEvent) -> Result<()>;

    /// Store the plan; returns the id the service assigned to it.
    async fn complete_plan(&self, request: &CompletionRequest) -> Result<String>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};

/// Bounded retry schedule for the completion handoff.
pub fn completion_retry_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(5))
}

/// Call [`PlanStore::complete_plan`] until it succeeds or `policy` runs out
/// of attempts; the last error is returned.
pub async fn complete_with_retry(
    store: &dyn PlanStore,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<String> {
    let mut attempt = 1;
    loop {
        match store.complete_plan(request).await {
            Ok(plan_id) => return Ok(plan_id),
            Err(e) if policy.should_retry(attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    job_id = %request.job_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %sanitize_error(&e),
                    "plan completion failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Forwards progress events to a [`PlanStore`] as durable reports.
#[derive(Clone)]
pub struct PlanStoreReporter {
    store: Arc<dyn PlanStore>,
}

impl PlanStoreReporter {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProgressNotifier for PlanStoreReporter {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn publish(&self, event: &ProgressEvent) -> Result<()> {
        self.store.report_progress(event).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PlanStore for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn report_progress(&self, _: &ProgressEvent) -> Result<()> {
            Ok(())
        }

        async fn complete_plan(&self, _: &CompletionRequest) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                anyhow::bail!("503 from persistence");
            }
            Ok(format!("plan-{n}"))
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    async fn request() -> CompletionRequest {
        let output = crate::pipeline::orchestrator::test_support::output().await;
        CompletionRequest {
            job_id: Uuid::new_v4(),
            plan_data: output.plan,
            metabolic_profile: output.profile,
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let store = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let id = complete_with_retry(&store, &request().await, &fast(3))
            .await
            .unwrap();
        assert_eq!(id, "plan-3");
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let store = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let err = complete_with_retry(&store, &request().await, &fast(2))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
