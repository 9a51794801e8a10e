//! Task types for the queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use clipforge_models::{JobId, SegmentId, VideoId};

/// The named queues of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Download,
    Analysis,
    Extraction,
    /// Reserved for future use; declared but never consumed.
    Upload,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Download => "download",
            QueueName::Analysis => "analysis",
            QueueName::Extraction => "extraction",
            QueueName::Upload => "upload",
        }
    }

    /// The queues workers actually consume.
    pub const ACTIVE: [QueueName; 3] = [
        QueueName::Download,
        QueueName::Analysis,
        QueueName::Extraction,
    ];
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Retry policy attached to a queue task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum delivery attempts before dead-lettering
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Backoff delay before redelivering attempt `attempt` (1-based):
    /// `base * 2^(attempt-1)`. Jitter is added by the queue.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Task for the download worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Job to drive
    pub job_id: JobId,
    /// Source URL to fetch
    pub source_url: String,
    /// Owning user
    pub user_id: String,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl DownloadTask {
    pub fn new(job_id: JobId, source_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            job_id,
            source_url: source_url.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Task for the analysis worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTask {
    /// Job to drive
    pub job_id: JobId,
    /// Downloaded video to analyze
    pub video_id: VideoId,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl AnalysisTask {
    pub fn new(job_id: JobId, video_id: VideoId) -> Self {
        Self {
            job_id,
            video_id,
            created_at: Utc::now(),
        }
    }
}

/// Task for the extraction worker, one per detected segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionTask {
    /// Job to drive
    pub job_id: JobId,
    /// Video the segment belongs to
    pub video_id: VideoId,
    /// Segment to extract
    pub segment_id: SegmentId,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl ExtractionTask {
    pub fn new(
        job_id: JobId,
        video_id: VideoId,
        segment_id: SegmentId,
        start: f64,
        end: f64,
    ) -> Self {
        Self {
            job_id,
            video_id,
            segment_id,
            start,
            end,
            created_at: Utc::now(),
        }
    }
}

/// Generic task wrapper stored on the streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueTask {
    /// Fetch source media and persist the Video row
    Download(DownloadTask),
    /// Score candidate windows and persist Segments
    Analysis(AnalysisTask),
    /// Render a single clip from a Segment
    Extraction(ExtractionTask),
}

impl QueueTask {
    /// The queue this task belongs to.
    pub fn queue(&self) -> QueueName {
        match self {
            QueueTask::Download(_) => QueueName::Download,
            QueueTask::Analysis(_) => QueueName::Analysis,
            QueueTask::Extraction(_) => QueueName::Extraction,
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            QueueTask::Download(t) => &t.job_id,
            QueueTask::Analysis(t) => &t.job_id,
            QueueTask::Extraction(t) => &t.job_id,
        }
    }

    /// Retry policy for this task's queue.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            QueueTask::Download(_) => RetryPolicy::new(3, Duration::from_secs(2)),
            QueueTask::Analysis(_) => RetryPolicy::new(3, Duration::from_secs(2)),
            QueueTask::Extraction(_) => RetryPolicy::new(3, Duration::from_secs(4)),
        }
    }

    /// Stable key for the attempt counter, invariant across redeliveries.
    pub fn retry_key(&self) -> String {
        match self {
            QueueTask::Download(t) => format!("download:{}", t.job_id),
            QueueTask::Analysis(t) => format!("analysis:{}:{}", t.job_id, t.video_id),
            QueueTask::Extraction(t) => format!("extraction:{}", t.segment_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_task_serde_roundtrip() {
        let task = ExtractionTask::new(
            JobId::new(),
            VideoId::new(),
            SegmentId::new(),
            25.5,
            55.0,
        );

        let wrapper = QueueTask::Extraction(task.clone());
        let json = serde_json::to_string(&wrapper).expect("serialize QueueTask");
        let decoded: QueueTask = serde_json::from_str(&json).expect("deserialize QueueTask");

        match decoded {
            QueueTask::Extraction(t) => {
                assert_eq!(t.job_id, task.job_id);
                assert_eq!(t.segment_id, task.segment_id);
                assert_eq!(t.start, task.start);
                assert_eq!(t.end, task.end);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_task_routing() {
        let t = QueueTask::Download(DownloadTask::new(JobId::new(), "https://x", "u"));
        assert_eq!(t.queue(), QueueName::Download);

        let t = QueueTask::Analysis(AnalysisTask::new(JobId::new(), VideoId::new()));
        assert_eq!(t.queue(), QueueName::Analysis);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));

        let policy = RetryPolicy::new(3, Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_key_stable_across_redelivery() {
        let seg = SegmentId::new();
        let a = QueueTask::Extraction(ExtractionTask::new(
            JobId::new(),
            VideoId::new(),
            seg.clone(),
            0.0,
            30.0,
        ));
        let b = QueueTask::Extraction(ExtractionTask::new(
            JobId::new(),
            VideoId::new(),
            seg,
            0.0,
            30.0,
        ));
        assert_eq!(a.retry_key(), b.retry_key());
    }
}
