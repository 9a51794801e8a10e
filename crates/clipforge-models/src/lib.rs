//! Shared data models for the clipforge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their lifecycle state machine
//! - Downloaded source videos
//! - Detected segments and rendered clips
//! - Caption words, segments, and styles
//! - Source-URL parsing

pub mod caption;
pub mod clip;
pub mod job;
pub mod segment;
pub mod url;
pub mod video;

// Re-export common types
pub use caption::{CaptionSegment, CaptionStyle, CaptionWord};
pub use clip::{build_clip_tags, build_clip_title, Clip, ClipId, ClipStatus};
pub use job::{truncate_error, Job, JobId, JobOptions, JobStatus};
pub use segment::{Segment, SegmentId, SegmentStatus, SignalScores};
pub use url::{extract_external_id, UrlError, UrlResult};
pub use video::{Video, VideoId, VideoStatus};
