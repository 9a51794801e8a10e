//! Clip models: the final rendered artifacts.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{SegmentId, VideoId};

/// Maximum title length before the emoji suffix.
const MAX_TITLE_LEN: usize = 60;

/// Base tags applied to every clip.
const BASE_TAGS: [&str; 5] = ["shorts", "viral", "trending", "highlight", "fyp"];

/// Unique identifier for a clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    /// Generate a new random clip ID.
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

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review/publication status of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    /// Rendered, awaiting user review
    #[default]
    ReadyForReview,
    /// Approved by the user
    Approved,
    /// Rejected by the user
    Rejected,
    /// Upload to a third-party platform in progress
    Uploading,
    /// Published
    Published,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::ReadyForReview => "ready_for_review",
            ClipStatus::Approved => "approved",
            ClipStatus::Rejected => "rejected",
            ClipStatus::Uploading => "uploading",
            ClipStatus::Published => "published",
        }
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rendered short-form clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Clip {
    /// Unique clip ID
    pub id: ClipId,

    /// Segment this clip was rendered from (unique per clip)
    pub segment_id: SegmentId,

    /// Video the segment belongs to
    pub video_id: VideoId,

    /// Object-store key for the rendered media
    pub storage_key: String,

    /// Object-store key for the thumbnail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,

    /// Generated title
    pub title: String,

    /// Generated description
    pub description: String,

    /// Ordered, deduplicated tags
    pub tags: Vec<String>,

    /// Review status
    #[serde(default)]
    pub status: ClipStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Clip {
    /// Create a new clip awaiting review.
    pub fn new(
        segment_id: SegmentId,
        video_id: VideoId,
        storage_key: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ClipId::new(),
            segment_id,
            video_id,
            storage_key: storage_key.into(),
            thumbnail_key: None,
            title: title.into(),
            description: description.into(),
            tags,
            status: ClipStatus::ReadyForReview,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the thumbnail key.
    pub fn with_thumbnail_key(mut self, key: Option<String>) -> Self {
        self.thumbnail_key = key;
        self
    }
}

/// Build a clip title from the source video title and composite score.
///
/// The title is truncated to 60 characters and suffixed with an emoji keyed
/// on the score band.
pub fn build_clip_title(source_title: &str, composite_score: f64) -> String {
    let truncated: String = source_title.chars().take(MAX_TITLE_LEN).collect();
    let emoji = if composite_score >= 0.9 {
        "🔥"
    } else if composite_score >= 0.8 {
        "⚡"
    } else {
        "✨"
    };
    format!("{} {}", truncated.trim_end(), emoji)
}

/// Build the ordered, deduplicated tag set for a clip.
///
/// Base tags come first, followed by up to 6 lowercase words of 4+ letters
/// drawn from the source title.
pub fn build_clip_tags(source_title: &str) -> Vec<String> {
    let mut tags: Vec<String> = BASE_TAGS.iter().map(|t| t.to_string()).collect();

    let title_words = source_title
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| w.len() >= 4 && w.chars().any(|c| c.is_alphabetic()))
        .take(6);

    for word in title_words {
        if !tags.contains(&word) {
            tags.push(word);
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_truncation_and_emoji() {
        let long = "a".repeat(100);
        let title = build_clip_title(&long, 0.95);
        assert!(title.ends_with('🔥'));
        assert_eq!(title.chars().count(), MAX_TITLE_LEN + 2); // title + space + emoji

        assert!(build_clip_title("Short", 0.85).ends_with('⚡'));
        assert!(build_clip_title("Short", 0.5).ends_with('✨'));
    }

    #[test]
    fn test_tags_base_set_first() {
        let tags = build_clip_tags("My Amazing Rust Tutorial");
        assert_eq!(&tags[..5], &["shorts", "viral", "trending", "highlight", "fyp"]);
        assert!(tags.contains(&"amazing".to_string()));
        assert!(tags.contains(&"rust".to_string()));
        assert!(tags.contains(&"tutorial".to_string()));
    }

    #[test]
    fn test_tags_deduplicated_and_filtered() {
        let tags = build_clip_tags("viral viral VIRAL cat cat a bb ccc");
        // "viral" is already a base tag; short words are dropped
        assert_eq!(tags.iter().filter(|t| *t == "viral").count(), 1);
        assert!(!tags.contains(&"a".to_string()));
        assert!(!tags.contains(&"ccc".to_string()));
    }

    #[test]
    fn test_tags_limit_title_words() {
        let tags = build_clip_tags("alpha bravo charlie delta echos foxtrot golfing hotels");
        assert_eq!(tags.len(), 5 + 6);
    }
}
