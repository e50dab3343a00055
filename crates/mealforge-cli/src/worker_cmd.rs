//! `mealforge worker` command: run the worker pool and the status server
//! until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use mealforge_core::config::AppConfig;
use mealforge_core::notify::{
    queued, BroadcastNotifier, FanoutNotifier, PgEventLog, ProgressNotifier, QueuedNotifier,
};
use mealforge_core::persistence::{PlanStore, PlanStoreReporter};
use mealforge_core::queue::{JobQueue, PgJobQueue};
use mealforge_core::worker::{PlanGenerationHandler, Worker};

use crate::serve::{self, AppState};

pub struct WorkerOptions {
    pub bind: String,
    pub port: u16,
    pub worker_id: Option<String>,
}

/// Progress goes to live subscribers, the local event log and the
/// persistence service. The two remote sinks deliver from their own tasks.
fn notifier(
    broadcast: Arc<BroadcastNotifier>,
    pool: PgPool,
    store: Arc<dyn PlanStore>,
) -> FanoutNotifier {
    FanoutNotifier::new()
        .with(broadcast)
        .with(Arc::new(QueuedNotifier::spawn(
            Arc::new(PgEventLog::new(pool)),
            queued::DEFAULT_QUEUE_CAPACITY,
        )))
        .with(Arc::new(QueuedNotifier::spawn(
            Arc::new(PlanStoreReporter::new(store)),
            queued::DEFAULT_QUEUE_CAPACITY,
        )))
}

/// Run the worker command.
pub async fn run_worker(config: &AppConfig, pool: PgPool, options: WorkerOptions) -> Result<()> {
    let store = config.plan_store()?;
    let handler = Arc::new(PlanGenerationHandler::new(config.pipeline_context()?, store.clone()));

    let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(pool.clone()));
    let broadcast = Arc::new(BroadcastNotifier::default());
    let fanout: Arc<dyn ProgressNotifier> = Arc::new(notifier(broadcast.clone(), pool, store.clone()));

    let WorkerOptions {
        bind,
        port,
        worker_id,
    } = options;
    let worker_id = worker_id.unwrap_or_else(|| format!("worker-{}", std::process::id()));
    let worker = Worker::new(queue.clone(), fanout, config.worker_config(worker_id.clone()));

    tracing::info!(
        worker_id = %worker_id,
        concurrency = worker.config().concurrency,
        plan_store = store.name(),
        "starting worker"
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("shutdown requested; finishing in-flight jobs");
        signal_cancel.cancel();
    });

    let state = AppState {
        queue,
        events: broadcast,
        shutdown: cancel.clone(),
    };
    let server = tokio::spawn(async move { serve::run_server(state, &bind, port).await });

    let pool_result = worker.run(handler, cancel.clone()).await;
    // Stop the server even when the pool exited on its own.
    cancel.cancel();
    let server_result = server.await.context("status server task panicked")?;

    pool_result?;
    server_result?;
    tracing::info!(worker_id = %worker_id, "worker stopped");
    Ok(())
}
