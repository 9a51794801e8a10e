//! Pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipforge_media::{check_ffmpeg, check_ffprobe, check_ytdlp};
use clipforge_worker::{QueueExecutor, WorkerConfig, WorkerContext};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipforge=info".parse().unwrap())
        .add_directive("aws_sdk_s3=warn".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting clipforge-worker");

    // Fail fast when the external tools are missing
    for check in [check_ffmpeg(), check_ffprobe(), check_ytdlp()] {
        if let Err(e) = check {
            warn!("Tool check failed: {e}");
        }
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let ctx = match WorkerContext::init(config.clone()).await {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to initialize worker context: {}", e);
            std::process::exit(1);
        }
    };

    // One executor per configured queue
    let executors: Vec<Arc<QueueExecutor>> = config
        .queues
        .iter()
        .map(|queue| Arc::new(QueueExecutor::new(*queue, Arc::clone(&ctx))))
        .collect();

    // Drain on SIGTERM/SIGINT: executors stop reserving, finish in-flight
    // work up to the shutdown window, then close.
    let shutdown_executors = executors.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        for executor in &shutdown_executors {
            executor.shutdown();
        }
    });

    let mut handles = Vec::with_capacity(executors.len());
    for executor in executors {
        handles.push(tokio::spawn(async move { executor.run().await }));
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Executor error: {}", e);
                std::process::exit(1);
            }
            Err(e) => {
                error!("Executor panicked: {}", e);
                std::process::exit(1);
            }
        }
    }

    info!("Worker shutdown complete");
}
