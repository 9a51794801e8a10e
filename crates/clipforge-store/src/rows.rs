//! Database row types and conversions to the shared models.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use clipforge_models::{
    Clip, ClipId, ClipStatus, Job, JobId, JobStatus, Segment, SegmentId, SegmentStatus,
    SignalScores, Video, VideoId, VideoStatus,
};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: String,
    pub user_id: String,
    pub source_url: String,
    pub video_id: Option<String>,
    pub status: String,
    pub progress: i16,
    pub current_step: String,
    pub error_message: Option<String>,
    pub options: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> StoreResult<Job> {
        Ok(Job {
            id: JobId::from_string(row.id),
            user_id: row.user_id,
            source_url: row.source_url,
            video_id: row.video_id.map(VideoId::from_string),
            status: parse_job_status(&row.status)?,
            progress: row.progress.clamp(0, 100) as u8,
            current_step: row.current_step,
            error_message: row.error_message,
            options: serde_json::from_value(row.options)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct VideoRow {
    pub id: String,
    pub user_id: String,
    pub external_id: String,
    pub source_url: String,
    pub title: String,
    pub description: Option<String>,
    pub duration: i64,
    pub thumbnail_url: Option<String>,
    pub storage_key: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<VideoRow> for Video {
    type Error = StoreError;

    fn try_from(row: VideoRow) -> StoreResult<Video> {
        Ok(Video {
            id: VideoId::from_string(row.id),
            user_id: row.user_id,
            external_id: row.external_id,
            source_url: row.source_url,
            title: row.title,
            description: row.description,
            duration: row.duration,
            thumbnail_url: row.thumbnail_url,
            storage_key: row.storage_key,
            status: parse_video_status(&row.status)?,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct SegmentRow {
    pub id: String,
    pub video_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub composite_score: f64,
    pub yt_retention: f64,
    pub signals: serde_json::Value,
    pub reason: String,
    pub status: String,
    pub has_captions: bool,
    pub caption_style: Option<String>,
    pub caption_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SegmentRow> for Segment {
    type Error = StoreError;

    fn try_from(row: SegmentRow) -> StoreResult<Segment> {
        let signals: SignalScores = serde_json::from_value(row.signals)?;
        Ok(Segment {
            id: SegmentId::from_string(row.id),
            video_id: VideoId::from_string(row.video_id),
            start_time: row.start_time,
            end_time: row.end_time,
            duration: row.duration,
            composite_score: row.composite_score,
            yt_retention: row.yt_retention,
            signals,
            reason: row.reason,
            status: parse_segment_status(&row.status)?,
            has_captions: row.has_captions,
            caption_style: row.caption_style,
            caption_data: row.caption_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ClipRow {
    pub id: String,
    pub segment_id: String,
    pub video_id: String,
    pub storage_key: String,
    pub thumbnail_key: Option<String>,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ClipRow> for Clip {
    type Error = StoreError;

    fn try_from(row: ClipRow) -> StoreResult<Clip> {
        Ok(Clip {
            id: ClipId::from_string(row.id),
            segment_id: SegmentId::from_string(row.segment_id),
            video_id: VideoId::from_string(row.video_id),
            storage_key: row.storage_key,
            thumbnail_key: row.thumbnail_key,
            title: row.title,
            description: row.description,
            tags: row.tags,
            status: parse_clip_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_job_status(s: &str) -> StoreResult<JobStatus> {
    match s {
        "queued" => Ok(JobStatus::Queued),
        "downloading" => Ok(JobStatus::Downloading),
        "analyzing" => Ok(JobStatus::Analyzing),
        "extracting" => Ok(JobStatus::Extracting),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(StoreError::invalid_data(format!("job status: {other}"))),
    }
}

fn parse_video_status(s: &str) -> StoreResult<VideoStatus> {
    match s {
        "downloaded" => Ok(VideoStatus::Downloaded),
        "analyzed" => Ok(VideoStatus::Analyzed),
        "processed" => Ok(VideoStatus::Processed),
        other => Err(StoreError::invalid_data(format!("video status: {other}"))),
    }
}

fn parse_segment_status(s: &str) -> StoreResult<SegmentStatus> {
    match s {
        "detected" => Ok(SegmentStatus::Detected),
        "extracting" => Ok(SegmentStatus::Extracting),
        "extracted" => Ok(SegmentStatus::Extracted),
        "failed" => Ok(SegmentStatus::Failed),
        other => Err(StoreError::invalid_data(format!("segment status: {other}"))),
    }
}

fn parse_clip_status(s: &str) -> StoreResult<ClipStatus> {
    match s {
        "ready_for_review" => Ok(ClipStatus::ReadyForReview),
        "approved" => Ok(ClipStatus::Approved),
        "rejected" => Ok(ClipStatus::Rejected),
        "uploading" => Ok(ClipStatus::Uploading),
        "published" => Ok(ClipStatus::Published),
        other => Err(StoreError::invalid_data(format!("clip status: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_matches_as_str() {
        for status in [
            JobStatus::Queued,
            JobStatus::Downloading,
            JobStatus::Analyzing,
            JobStatus::Extracting,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(parse_job_status(status.as_str()).unwrap(), status);
        }

        for status in [
            SegmentStatus::Detected,
            SegmentStatus::Extracting,
            SegmentStatus::Extracted,
            SegmentStatus::Failed,
        ] {
            assert_eq!(parse_segment_status(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(parse_job_status("paused").is_err());
        assert!(parse_clip_status("archived").is_err());
    }
}
