//! Job definitions and lifecycle state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::VideoId;

/// Maximum length of an error message stored on a job.
pub const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
///
/// Transitions are monotone along the pipeline; any non-terminal status may
/// transition to `Failed`. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, waiting for the download worker
    #[default]
    Queued,
    /// Download worker is fetching the source
    Downloading,
    /// Analysis worker is scoring candidate windows
    Analyzing,
    /// Extraction workers are rendering clips
    Extracting,
    /// All clips rendered
    Completed,
    /// Terminal failure
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Extracting => "extracting",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Pipeline rank used to enforce monotone transitions.
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Downloading => 1,
            JobStatus::Analyzing => 2,
            JobStatus::Extracting => 3,
            JobStatus::Completed => 4,
            JobStatus::Failed => 5,
        }
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobStatus::Failed {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-supplied processing options, recorded on the job at submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    /// Target number of clips to produce
    #[serde(default = "default_clip_count")]
    pub clip_count: u32,

    /// Minimum clip duration in seconds (>= 10)
    #[serde(default = "default_min_duration")]
    pub min_duration: u32,

    /// Maximum clip duration in seconds (<= 180)
    #[serde(default = "default_max_duration")]
    pub max_duration: u32,

    /// Auto-upload after extraction (unused by the pipeline core)
    #[serde(default)]
    pub auto_upload: bool,

    /// Burn captions into extracted clips
    #[serde(default = "default_add_subtitles")]
    pub add_subtitles: bool,
}

fn default_clip_count() -> u32 {
    5
}

fn default_min_duration() -> u32 {
    15
}

fn default_max_duration() -> u32 {
    60
}

fn default_add_subtitles() -> bool {
    true
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            clip_count: default_clip_count(),
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            auto_upload: false,
            add_subtitles: default_add_subtitles(),
        }
    }
}

impl JobOptions {
    /// Clamp durations into the accepted range.
    pub fn normalized(mut self) -> Self {
        self.min_duration = self.min_duration.max(10);
        self.max_duration = self.max_duration.min(180).max(self.min_duration);
        self
    }
}

/// A video-processing job, one per submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Owning user
    pub user_id: String,

    /// Submitted source URL
    pub source_url: String,

    /// Linked video, set by the download worker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,

    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Short human-readable description of the current step
    #[serde(default)]
    pub current_step: String,

    /// Error message (if failed), truncated to 200 chars
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Processing options
    #[serde(default)]
    pub options: JobOptions,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        user_id: impl Into<String>,
        source_url: impl Into<String>,
        options: JobOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            source_url: source_url.into(),
            video_id: None,
            status: JobStatus::Queued,
            progress: 0,
            current_step: "Queued".to_string(),
            error_message: None,
            options: options.normalized(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Advance to a new pipeline stage with progress and step text.
    pub fn advance(mut self, status: JobStatus, progress: u8, step: impl Into<String>) -> Self {
        self.status = status;
        self.progress = progress.min(100);
        self.current_step = step.into();
        self.updated_at = Utc::now();
        self
    }

    /// Mark job as completed.
    pub fn complete(mut self) -> Self {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.current_step = "Completed".to_string();
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark job as failed with a truncated error message.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.error_message = Some(truncate_error(error.into()));
        self.updated_at = Utc::now();
        self
    }
}

/// Truncate an error message to the storable length.
pub fn truncate_error(message: String) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        return message;
    }
    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = Job::new(
            "user123",
            "https://youtube.com/watch?v=abc",
            JobOptions::default(),
        );

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert_eq!(job.options.clip_count, 5);
        assert!(job.video_id.is_none());
    }

    #[test]
    fn test_status_transitions_monotone() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Downloading));
        assert!(JobStatus::Downloading.can_transition_to(JobStatus::Analyzing));
        assert!(JobStatus::Analyzing.can_transition_to(JobStatus::Extracting));
        assert!(JobStatus::Extracting.can_transition_to(JobStatus::Completed));

        // No backward edges
        assert!(!JobStatus::Analyzing.can_transition_to(JobStatus::Downloading));
        assert!(!JobStatus::Extracting.can_transition_to(JobStatus::Queued));

        // Any non-terminal state may fail
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Extracting.can_transition_to(JobStatus::Failed));

        // Terminal states are final
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Queued));
    }

    #[test]
    fn test_complete_sets_progress_and_timestamp() {
        let job = Job::new("u", "https://youtu.be/x", JobOptions::default()).complete();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_fail_truncates_error() {
        let long = "x".repeat(500);
        let job = Job::new("u", "https://youtu.be/x", JobOptions::default()).fail(long);
        assert_eq!(job.error_message.as_ref().unwrap().len(), 200);
    }

    #[test]
    fn test_options_normalized() {
        let opts = JobOptions {
            clip_count: 5,
            min_duration: 3,
            max_duration: 500,
            auto_upload: false,
            add_subtitles: true,
        }
        .normalized();
        assert_eq!(opts.min_duration, 10);
        assert_eq!(opts.max_duration, 180);
    }

    #[test]
    fn test_options_camel_case_wire_format() {
        let json = r#"{"clipCount": 3, "addSubtitles": false}"#;
        let opts: JobOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.clip_count, 3);
        assert!(!opts.add_subtitles);
        assert_eq!(opts.min_duration, 15);
        assert_eq!(opts.max_duration, 60);
    }
}
