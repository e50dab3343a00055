use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{emit, ProgressEvent, ProgressNotifier};

/// Events buffered per sink before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hands events to a background task that delivers them to `inner` in
/// order. `publish` never waits on the sink, so a slow persistence service
/// cannot eat into a job's time budget.
///
/// When the buffer is full the event is dropped and `publish` returns an
/// error for [`emit`] to log.
pub struct QueuedNotifier {
    name: String,
    tx: mpsc::Sender<ProgressEvent>,
}

impl QueuedNotifier {
    /// Start the delivery task. Must be called inside a Tokio runtime.
    pub fn spawn(inner: Arc<dyn ProgressNotifier>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<ProgressEvent>(capacity.max(1));
        let name = format!("queued:{}", inner.name());
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                emit(inner.as_ref(), &event).await;
            }
            tracing::debug!(sink = inner.name(), "progress delivery task stopped");
        });
        Self { name, tx }
    }
}

#[async_trait]
impl ProgressNotifier for QueuedNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, event: &ProgressEvent) -> Result<()> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => anyhow!("delivery queue full; event dropped"),
            mpsc::error::TrySendError::Closed(_) => anyhow!("delivery task has stopped"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::notify::{ProgressStatus, RecordingNotifier};

    /// Records after a delay.
    struct Sluggish(Arc<RecordingNotifier>);

    #[async_trait]
    impl ProgressNotifier for Sluggish {
        fn name(&self) -> &str {
            "sluggish"
        }

        async fn publish(&self, event: &ProgressEvent) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.publish(event).await
        }
    }

    fn event(n: usize) -> ProgressEvent {
        ProgressEvent::for_job(Uuid::nil(), ProgressStatus::Running, format!("step {n}"))
    }

    #[tokio::test]
    async fn publish_returns_before_delivery_and_keeps_order() {
        let recorder = Arc::new(RecordingNotifier::new());
        let queued = QueuedNotifier::spawn(Arc::new(Sluggish(recorder.clone())), 16);
        assert_eq!(queued.name(), "queued:sluggish");

        let started = std::time::Instant::now();
        for n in 0..5 {
            queued.publish(&event(n)).await.unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(20));

        for _ in 0..100 {
            if recorder.events().len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let messages: Vec<String> = recorder.events().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, (0..5).map(|n| format!("step {n}")).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn full_buffer_drops_instead_of_waiting() {
        let recorder = Arc::new(RecordingNotifier::new());
        let queued = QueuedNotifier::spawn(Arc::new(Sluggish(recorder)), 1);
        let mut dropped = 0;
        for n in 0..10 {
            if queued.publish(&event(n)).await.is_err() {
                dropped += 1;
            }
        }
        assert!(dropped > 0);
    }
}
