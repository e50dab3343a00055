//! In-process fan-out of progress events to live subscribers (SSE clients).

use anyhow::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

use super::{ProgressEvent, ProgressNotifier};

pub const DEFAULT_CAPACITY: usize = 1024;

/// Publishes events on a tokio broadcast channel.
///
/// Publishing never fails: with no subscribers the event is simply dropped.
/// A subscriber that falls more than `capacity` events behind skips the
/// events it missed.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ProgressEvent>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Every event published from now on.
    pub fn subscribe_all(&self) -> impl Stream<Item = ProgressEvent> + Send + 'static + use<> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "progress subscriber lagged");
                    None
                }
            }
        })
    }

    /// Events of one job published from now on.
    pub fn subscribe(&self, job_id: Uuid) -> impl Stream<Item = ProgressEvent> + Send + 'static + use<> {
        self.subscribe_all()
            .filter(move |event| futures::future::ready(event.job_id == job_id))
    }
}

#[async_trait]
impl ProgressNotifier for BroadcastNotifier {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn publish(&self, event: &ProgressEvent) -> Result<()> {
        // Err only means nobody is listening.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
