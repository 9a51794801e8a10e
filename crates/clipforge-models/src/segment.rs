//! Segment models: candidate windows that survived ranking.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::VideoId;

/// Unique identifier for a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    /// Generate a new random segment ID.
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

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Segment lifecycle status, driven by the extraction worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Persisted by analysis, waiting for extraction
    #[default]
    Detected,
    /// Extraction in progress
    Extracting,
    /// Clip rendered and uploaded
    Extracted,
    /// Extraction failed
    Failed,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Detected => "detected",
            SegmentStatus::Extracting => "extracting",
            SegmentStatus::Extracted => "extracted",
            SegmentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-signal engagement scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct SignalScores {
    pub audio: f64,
    pub visual: f64,
    pub speech: f64,
    pub engagement: f64,
}

impl SignalScores {
    /// Clamp every component into [0, 1].
    pub fn clamped(self) -> Self {
        Self {
            audio: self.audio.clamp(0.0, 1.0),
            visual: self.visual.clamp(0.0, 1.0),
            speech: self.speech.clamp(0.0, 1.0),
            engagement: self.engagement.clamp(0.0, 1.0),
        }
    }
}

/// A candidate time range selected by the analysis worker.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Unique segment ID
    pub id: SegmentId,

    /// Video this segment belongs to
    pub video_id: VideoId,

    /// Start time in seconds (one decimal after boundary snap)
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,

    /// Duration in seconds (end - start)
    pub duration: f64,

    /// Composite retention score in [0, 1]
    pub composite_score: f64,

    /// Shadow projection of the composite score
    pub yt_retention: f64,

    /// Per-signal scores
    pub signals: SignalScores,

    /// Human-readable reason this segment was selected
    pub reason: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: SegmentStatus,

    /// Whether captions were burned into the extracted clip
    #[serde(default)]
    pub has_captions: bool,

    /// Subtitle format used for the burn ("ass" or "srt")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_style: Option<String>,

    /// Serialized caption segments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_data: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Segment {
    /// Create a new detected segment.
    pub fn new(
        video_id: VideoId,
        start_time: f64,
        end_time: f64,
        composite_score: f64,
        signals: SignalScores,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let composite_score = composite_score.clamp(0.0, 1.0);
        Self {
            id: SegmentId::new(),
            video_id,
            start_time,
            end_time,
            duration: end_time - start_time,
            composite_score,
            yt_retention: composite_score,
            signals: signals.clamped(),
            reason: reason.into(),
            status: SegmentStatus::Detected,
            has_captions: false,
            caption_style: None,
            caption_data: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this segment's time range overlaps another (half-open intervals).
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64) -> Segment {
        Segment::new(
            VideoId::from("v"),
            start,
            end,
            0.7,
            SignalScores::default(),
            "test",
        )
    }

    #[test]
    fn test_segment_duration() {
        let s = segment(10.0, 40.5);
        assert!((s.duration - 30.5).abs() < 1e-9);
        assert_eq!(s.status, SegmentStatus::Detected);
    }

    #[test]
    fn test_overlap_half_open() {
        let a = segment(10.0, 40.0);
        let b = segment(40.0, 70.0);
        let c = segment(39.9, 50.0);

        // Touching endpoints do not overlap
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));

        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_score_clamped_on_creation() {
        let s = Segment::new(
            VideoId::from("v"),
            0.0,
            30.0,
            1.7,
            SignalScores {
                audio: 1.2,
                visual: -0.1,
                speech: 0.5,
                engagement: 0.5,
            },
            "test",
        );
        assert_eq!(s.composite_score, 1.0);
        assert_eq!(s.yt_retention, 1.0);
        assert_eq!(s.signals.audio, 1.0);
        assert_eq!(s.signals.visual, 0.0);
    }
}
