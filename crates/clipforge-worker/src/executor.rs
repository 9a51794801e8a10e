//! Per-queue task executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clipforge_queue::{QueueName, QueueTask};

use crate::analysis;
use crate::context::WorkerContext;
use crate::download_job;
use crate::error::WorkerResult;
use crate::extraction_job;

/// Executor that consumes one named queue with bounded concurrency and an
/// optional task-start rate limit.
pub struct QueueExecutor {
    queue: QueueName,
    ctx: Arc<WorkerContext>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    min_start_interval: Option<Duration>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl QueueExecutor {
    /// Create an executor for a queue, limits taken from the config.
    pub fn new(queue: QueueName, ctx: Arc<WorkerContext>) -> Self {
        let concurrency = ctx.config.concurrency_for(queue);
        let min_start_interval = ctx
            .config
            .rate_for(queue)
            .filter(|rate| *rate > 0.0)
            .map(|rate| Duration::from_secs_f64(1.0 / rate));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("{}-worker-{}", queue, Uuid::new_v4());

        Self {
            queue,
            ctx,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            min_start_interval,
            shutdown,
            consumer_name,
        }
    }

    /// Run the consume loop until shutdown, then drain in-flight tasks.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            queue = %self.queue,
            concurrency = self.concurrency,
            consumer = %self.consumer_name,
            "Starting executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        // Side task: promote due scheduled tasks and claim stale pending ones.
        let claim_task = self.spawn_maintenance_task();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(queue = %self.queue, "Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume() => {
                    if let Err(e) = result {
                        error!(queue = %self.queue, error = %e, "Error consuming tasks");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!(queue = %self.queue, "Waiting for in-flight tasks...");
        let _ = tokio::time::timeout(self.ctx.config.shutdown_timeout, self.wait_for_tasks()).await;

        info!(queue = %self.queue, "Executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Reserve and dispatch tasks up to the free concurrency slots.
    async fn consume(&self) -> WorkerResult<()> {
        let available = self.semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let tasks = self
            .ctx
            .queue
            .reserve(self.queue, &self.consumer_name, 1000, available.min(5))
            .await?;

        if tasks.is_empty() {
            return Ok(());
        }

        debug!(queue = %self.queue, count = tasks.len(), "Reserved tasks");

        for (message_id, task) in tasks {
            self.dispatch(message_id, task).await;

            // Rate limit applies to task starts, not completions.
            if let Some(interval) = self.min_start_interval {
                tokio::time::sleep(interval).await;
            }
        }

        Ok(())
    }

    /// Spawn a task onto the pool behind a semaphore permit.
    async fn dispatch(&self, message_id: String, task: QueueTask) {
        let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
            return;
        };
        let ctx = Arc::clone(&self.ctx);
        let queue = self.queue;

        tokio::spawn(async move {
            let _permit = permit;
            Self::execute(ctx, queue, message_id, task).await;
        });
    }

    /// Execute a single task with retry/dead-letter handling.
    async fn execute(
        ctx: Arc<WorkerContext>,
        queue: QueueName,
        message_id: String,
        task: QueueTask,
    ) {
        let job_id = task.job_id().clone();
        info!(queue = %queue, job_id = %job_id, "Executing task");

        let result = match &task {
            QueueTask::Download(t) => download_job::handle(&ctx, t).await,
            QueueTask::Analysis(t) => analysis::handle(&ctx, t).await,
            QueueTask::Extraction(t) => extraction_job::handle(&ctx, t).await,
        };

        match result {
            Ok(()) => {
                info!(queue = %queue, job_id = %job_id, "Task completed");
                if let Err(e) = ctx.queue.ack(queue, &message_id, &task).await {
                    error!(queue = %queue, job_id = %job_id, error = %e, "Failed to ack task");
                }
            }
            Err(e) if e.is_terminal() => {
                // Invalid input or missing rows: retrying cannot succeed.
                error!(queue = %queue, job_id = %job_id, error = %e, "Terminal task failure");
                if let Err(dlq_err) = ctx
                    .queue
                    .dead_letter(queue, &message_id, &task, &e.to_string())
                    .await
                {
                    error!(job_id = %job_id, error = %dlq_err, "Failed to dead-letter task");
                }
                if !matches!(task, QueueTask::Extraction(_)) {
                    ctx.store.fail_job(&job_id, e.to_string()).await.ok();
                }
            }
            Err(e) => {
                error!(queue = %queue, job_id = %job_id, error = %e, "Task failed");
                match ctx
                    .queue
                    .nack(queue, &message_id, &task, &e.to_string())
                    .await
                {
                    Ok(attempts) if attempts >= task.retry_policy().max_attempts => {
                        // Retries exhausted. Download/analysis failures fail
                        // the job; an exhausted extraction leaves the job in
                        // `extracting` for operators to spot via the
                        // dead-letter counts.
                        if !matches!(task, QueueTask::Extraction(_)) {
                            ctx.store
                                .fail_job(
                                    &job_id,
                                    format!("{e} (after {attempts} attempts)"),
                                )
                                .await
                                .ok();
                        }
                    }
                    Ok(attempts) => {
                        info!(
                            queue = %queue,
                            job_id = %job_id,
                            attempts = attempts,
                            "Task rescheduled"
                        );
                    }
                    Err(nack_err) => {
                        error!(job_id = %job_id, error = %nack_err, "Failed to nack task");
                    }
                }
            }
        }
    }

    /// Periodic maintenance: promote due delayed tasks and claim stale ones.
    fn spawn_maintenance_task(&self) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let queue = self.queue;
        let consumer_name = self.consumer_name.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let interval = self.ctx.config.claim_interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = ctx.queue.promote_due(queue).await {
                            warn!(queue = %queue, error = %e, "Failed to promote scheduled tasks");
                        }

                        match ctx.queue.claim_stale(queue, &consumer_name, 5).await {
                            Ok(tasks) if !tasks.is_empty() => {
                                info!(queue = %queue, count = tasks.len(), "Claimed stale tasks");
                                for (message_id, task) in tasks {
                                    let Ok(permit) = semaphore.clone().acquire_owned().await
                                    else {
                                        break;
                                    };
                                    let ctx = Arc::clone(&ctx);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute(ctx, queue, message_id, task).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(queue = %queue, error = %e, "Failed to claim stale tasks");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Wait for all in-flight tasks to release their permits.
    async fn wait_for_tasks(&self) {
        loop {
            if self.semaphore.available_permits() == self.concurrency {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
