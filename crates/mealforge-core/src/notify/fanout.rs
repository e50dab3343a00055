use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{emit, ProgressEvent, ProgressNotifier};

/// Delivers every event to each sink independently; one sink failing does
/// not stop delivery to the others.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn ProgressNotifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressNotifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ProgressNotifier for FanoutNotifier {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn publish(&self, event: &ProgressEvent) -> Result<()> {
        for sink in &self.sinks {
            emit(sink.as_ref(), event).await;
        }
        Ok(())
    }
}
