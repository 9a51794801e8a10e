//! Source video models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a downloaded source video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
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

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Source video processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Raw media stored, not yet analyzed
    #[default]
    Downloaded,
    /// Segments detected
    Analyzed,
    /// All clips extracted
    Processed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Downloaded => "downloaded",
            VideoStatus::Analyzed => "analyzed",
            VideoStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A downloaded source video.
///
/// Created exactly once by the download worker, keyed on `external_id`.
/// Immutable thereafter except `status`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    /// Unique video ID
    pub id: VideoId,

    /// Owning user
    pub user_id: String,

    /// Platform-level identifier extracted from the source URL (unique)
    pub external_id: String,

    /// Original source URL
    pub source_url: String,

    /// Video title
    pub title: String,

    /// Video description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Duration in whole seconds
    pub duration: i64,

    /// Platform thumbnail URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Object-store key for the raw media
    pub storage_key: String,

    /// Processing status
    #[serde(default)]
    pub status: VideoStatus,

    /// Raw downloader metadata blob
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a new video record in `Downloaded` status.
    pub fn new(
        user_id: impl Into<String>,
        external_id: impl Into<String>,
        source_url: impl Into<String>,
        title: impl Into<String>,
        duration: i64,
        storage_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: VideoId::new(),
            user_id: user_id.into(),
            external_id: external_id.into(),
            source_url: source_url.into(),
            title: title.into(),
            description: None,
            duration,
            thumbnail_url: None,
            storage_key: storage_key.into(),
            status: VideoStatus::Downloaded,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the thumbnail URL.
    pub fn with_thumbnail_url(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    /// Attach the raw metadata blob.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_generation() {
        let id1 = VideoId::new();
        let id2 = VideoId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_video_creation() {
        let video = Video::new(
            "user123",
            "dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "Test Video",
            300,
            "raw-videos/dQw4w9WgXcQ/video.mp4",
        );

        assert_eq!(video.status, VideoStatus::Downloaded);
        assert_eq!(video.duration, 300);
        assert_eq!(video.external_id, "dQw4w9WgXcQ");
    }
}
