use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{ProgressEvent, ProgressNotifier};

/// Keeps every published event in memory, in publish order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for(&self, job_id: Uuid) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.job_id == job_id)
            .collect()
    }
}

#[async_trait]
impl ProgressNotifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, event: &ProgressEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("recording notifier lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
