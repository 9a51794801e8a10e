//! Process-wide worker context.

use tracing::{info, warn};

use clipforge_queue::JobQueue;
use clipforge_storage::ObjectStore;
use clipforge_store::JobStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::transcribe::Transcriber;

/// Shared clients for all tasks in the process.
///
/// Constructed once at startup and passed behind an `Arc`; every client is
/// internally thread-safe.
pub struct WorkerContext {
    pub config: WorkerConfig,
    pub store: JobStore,
    pub storage: ObjectStore,
    pub queue: JobQueue,
    /// Present only when a transcription endpoint is configured; captions and
    /// speech signals degrade gracefully without it.
    pub transcriber: Option<Transcriber>,
}

impl WorkerContext {
    /// Initialize all clients from the environment.
    pub async fn init(config: WorkerConfig) -> WorkerResult<Self> {
        let store = JobStore::from_env().await?;
        let storage = ObjectStore::from_env().await?;
        let queue = JobQueue::from_env()?;
        queue.init().await?;

        let transcriber = Transcriber::from_env();
        if transcriber.is_none() {
            warn!("No transcription endpoint configured, speech signals and captions disabled");
        }

        tokio::fs::create_dir_all(&config.work_dir).await?;

        info!(work_dir = %config.work_dir, "Worker context initialized");

        Ok(Self {
            config,
            store,
            storage,
            queue,
            transcriber,
        })
    }
}
