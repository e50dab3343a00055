use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{CompletionRequest, PlanStore};
use crate::notify::ProgressEvent;

#[derive(Debug, Default)]
struct Stored {
    plans: HashMap<String, CompletionRequest>,
    by_job: HashMap<Uuid, String>,
    progress: Vec<ProgressEvent>,
}

/// In-process plan store for development and tests.
///
/// Completing the same job twice returns the first plan id, so a retried
/// handoff never stores a second copy.
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    stored: Mutex<Stored>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self, plan_id: &str) -> Option<CompletionRequest> {
        self.stored.lock().ok()?.plans.get(plan_id).cloned()
    }

    pub fn plan_for_job(&self, job_id: Uuid) -> Option<CompletionRequest> {
        let stored = self.stored.lock().ok()?;
        let plan_id = stored.by_job.get(&job_id)?;
        stored.plans.get(plan_id).cloned()
    }

    pub fn plan_count(&self) -> usize {
        self.stored.lock().map(|s| s.plans.len()).unwrap_or(0)
    }

    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.stored
            .lock()
            .map(|s| s.progress.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    fn name(&self) -> &str {
        "memory-persistence"
    }

    async fn report_progress(&self, event: &ProgressEvent) -> Result<()> {
        self.stored
            .lock()
            .map_err(|_| anyhow!("plan store lock poisoned"))?
            .progress
            .push(event.clone());
        Ok(())
    }

    async fn complete_plan(&self, request: &CompletionRequest) -> Result<String> {
        let mut stored = self
            .stored
            .lock()
            .map_err(|_| anyhow!("plan store lock poisoned"))?;
        if let Some(existing) = stored.by_job.get(&request.job_id) {
            return Ok(existing.clone());
        }
        let plan_id = format!("plan_{}", Uuid::new_v4().simple());
        stored.by_job.insert(request.job_id, plan_id.clone());
        stored.plans.insert(plan_id.clone(), request.clone());
        Ok(plan_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::orchestrator::test_support;

    #[tokio::test]
    async fn completion_is_idempotent_per_job() {
        let output = test_support::output().await;
        let request = CompletionRequest {
            job_id: Uuid::new_v4(),
            plan_data: output.plan,
            metabolic_profile: output.profile,
        };
        let store = MemoryPlanStore::new();
        let first = store.complete_plan(&request).await.unwrap();
        let second = store.complete_plan(&request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.plan_count(), 1);
        assert_eq!(store.plan_for_job(request.job_id), Some(request));
    }
}
