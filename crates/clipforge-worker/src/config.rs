//! Worker configuration.

use std::time::Duration;

use clipforge_queue::QueueName;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queues this process consumes
    pub queues: Vec<QueueName>,
    /// Concurrent download tasks
    pub download_concurrency: usize,
    /// Concurrent analysis tasks
    pub analysis_concurrency: usize,
    /// Concurrent extraction tasks
    pub extraction_concurrency: usize,
    /// Analysis task starts per second
    pub analysis_rate_per_sec: f64,
    /// Extraction task starts per second
    pub extraction_rate_per_sec: f64,
    /// Per-subprocess timeout for extraction ffmpeg runs
    pub extraction_timeout: Duration,
    /// Whether caption generation is enabled
    pub captions_enabled: bool,
    /// Work directory for temporary files
    pub work_dir: String,
    /// Graceful shutdown drain window
    pub shutdown_timeout: Duration,
    /// How often to scan for stale pending tasks and due scheduled tasks
    pub claim_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queues: QueueName::ACTIVE.to_vec(),
            download_concurrency: 2,
            analysis_concurrency: 1,
            extraction_concurrency: 2,
            analysis_rate_per_sec: 1.0,
            extraction_rate_per_sec: 5.0,
            extraction_timeout: Duration::from_secs(300),
            captions_enabled: true,
            work_dir: "/tmp/clipforge".to_string(),
            shutdown_timeout: Duration::from_secs(30),
            claim_interval: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            queues: parse_queues(std::env::var("WORKER_QUEUES").ok().as_deref()),
            download_concurrency: std::env::var("WORKER_DOWNLOAD_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            analysis_concurrency: std::env::var("WORKER_ANALYSIS_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            extraction_concurrency: std::env::var("WORKER_EXTRACTION_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            analysis_rate_per_sec: std::env::var("WORKER_ANALYSIS_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
            extraction_rate_per_sec: std::env::var("WORKER_EXTRACTION_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5.0),
            extraction_timeout: Duration::from_secs(
                std::env::var("WORKER_EXTRACTION_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            captions_enabled: std::env::var("CAPTIONS_ENABLED")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/clipforge".to_string()),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }

    /// Concurrency limit for a queue.
    pub fn concurrency_for(&self, queue: QueueName) -> usize {
        match queue {
            QueueName::Download => self.download_concurrency,
            QueueName::Analysis => self.analysis_concurrency,
            QueueName::Extraction => self.extraction_concurrency,
            QueueName::Upload => 1,
        }
    }

    /// Task-start rate limit for a queue (starts per second), if any.
    pub fn rate_for(&self, queue: QueueName) -> Option<f64> {
        match queue {
            QueueName::Analysis => Some(self.analysis_rate_per_sec),
            QueueName::Extraction => Some(self.extraction_rate_per_sec),
            _ => None,
        }
    }
}

/// Parse a comma-separated queue list; unknown names are ignored.
fn parse_queues(raw: Option<&str>) -> Vec<QueueName> {
    let Some(raw) = raw else {
        return QueueName::ACTIVE.to_vec();
    };

    let queues: Vec<QueueName> = raw
        .split(',')
        .filter_map(|name| match name.trim() {
            "download" => Some(QueueName::Download),
            "analysis" => Some(QueueName::Analysis),
            "extraction" => Some(QueueName::Extraction),
            _ => None,
        })
        .collect();

    if queues.is_empty() {
        QueueName::ACTIVE.to_vec()
    } else {
        queues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_concurrency_limits() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency_for(QueueName::Download), 2);
        assert_eq!(config.concurrency_for(QueueName::Analysis), 1);
        assert_eq!(config.concurrency_for(QueueName::Extraction), 2);
    }

    #[test]
    fn test_parse_queues() {
        assert_eq!(
            parse_queues(Some("download,extraction")),
            vec![QueueName::Download, QueueName::Extraction]
        );
        assert_eq!(parse_queues(Some("bogus")), QueueName::ACTIVE.to_vec());
        assert_eq!(parse_queues(None), QueueName::ACTIVE.to_vec());
    }

    #[test]
    fn test_rate_limits() {
        let config = WorkerConfig::default();
        assert_eq!(config.rate_for(QueueName::Analysis), Some(1.0));
        assert_eq!(config.rate_for(QueueName::Extraction), Some(5.0));
        assert_eq!(config.rate_for(QueueName::Download), None);
    }
}
