//! Postgres-backed job store.

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use clipforge_models::{
    truncate_error, Clip, Job, JobId, JobStatus, Segment, SegmentId, SegmentStatus, Video,
    VideoId, VideoStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::rows::{ClipRow, JobRow, SegmentRow, VideoRow};

/// Job store client over a shared connection pool.
#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to Postgres.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        info!("Connecting to Postgres...");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        info!("Postgres connection pool established");
        Ok(Self { pool })
    }

    /// Connect using `DATABASE_URL`.
    pub async fn from_env() -> StoreResult<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::invalid_data("DATABASE_URL not set"))?;
        Self::connect(&url).await
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Insert a new job row.
    pub async fn create_job(&self, job: &Job) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, user_id, source_url, video_id, status, progress, current_step,
                 error_message, options, created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(job.id.as_str())
        .bind(&job.user_id)
        .bind(&job.source_url)
        .bind(job.video_id.as_ref().map(|v| v.as_str()))
        .bind(job.status.as_str())
        .bind(job.progress as i16)
        .bind(&job.current_step)
        .bind(&job.error_message)
        .bind(serde_json::to_value(&job.options)?)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a job by ID.
    pub async fn get_job(&self, id: &JobId) -> StoreResult<Job> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))?;
        row.try_into()
    }

    /// Move a job to a new pipeline stage with progress and step text.
    pub async fn set_job_stage(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: u8,
        step: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, progress = $3, current_step = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(status.as_str())
        .bind(progress.min(100) as i16)
        .bind(step)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(job_id = %id, status = %status, progress = progress, "Job stage updated");
        Ok(())
    }

    /// Update progress and step text without changing status.
    pub async fn set_job_progress(&self, id: &JobId, progress: u8, step: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET progress = $2, current_step = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(progress.min(100) as i16)
        .bind(step)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Link the downloaded video to its job.
    pub async fn link_job_video(&self, id: &JobId, video_id: &VideoId) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET video_id = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(video_id.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark a job failed with a truncated error message.
    ///
    /// Terminal jobs are left untouched.
    pub async fn fail_job(&self, id: &JobId, message: impl Into<String>) -> StoreResult<()> {
        let message = truncate_error(message.into());
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = $2, updated_at = $3
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(id.as_str())
        .bind(&message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(job_id = %id, error = %message, "Job failed");
        Ok(())
    }

    /// Idempotent completion aggregation.
    ///
    /// Reads the segment and clip counts for the video; when clips >= segments
    /// and segments > 0, flips the job to completed with progress 100 and a
    /// completion timestamp. Concurrent extraction workers all compute the
    /// same terminal state, so the race is benign.
    ///
    /// Returns true when the job is (now) completed.
    pub async fn try_complete_job(&self, id: &JobId, video_id: &VideoId) -> StoreResult<bool> {
        let segments = self.count_segments(video_id).await?;
        let clips = self.count_clips(video_id).await?;

        if segments == 0 || clips < segments {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', progress = 100, current_step = 'Completed',
                completed_at = $2, updated_at = $2
            WHERE id = $1 AND status <> 'failed'
            "#,
        )
        .bind(id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(job_id = %id, segments = segments, clips = clips, "Job completed");
        Ok(true)
    }

    // ========================================================================
    // Videos
    // ========================================================================

    /// Insert or refresh a video row, keyed on `external_id`.
    ///
    /// Redelivered download tasks hit the conflict arm: the existing row (and
    /// its id) is kept, while the storage key and metadata are refreshed to
    /// match the re-uploaded bytes.
    pub async fn upsert_video(&self, video: &Video) -> StoreResult<Video> {
        let row = sqlx::query_as::<_, VideoRow>(
            r#"
            INSERT INTO videos
                (id, user_id, external_id, source_url, title, description, duration,
                 thumbnail_url, storage_key, status, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (external_id) DO UPDATE
            SET storage_key = EXCLUDED.storage_key,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                duration = EXCLUDED.duration,
                thumbnail_url = EXCLUDED.thumbnail_url,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(video.id.as_str())
        .bind(&video.user_id)
        .bind(&video.external_id)
        .bind(&video.source_url)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.duration)
        .bind(&video.thumbnail_url)
        .bind(&video.storage_key)
        .bind(video.status.as_str())
        .bind(&video.metadata)
        .bind(video.created_at)
        .bind(video.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// Fetch a video by ID.
    pub async fn get_video(&self, id: &VideoId) -> StoreResult<Video> {
        let row = sqlx::query_as::<_, VideoRow>("SELECT * FROM videos WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("video {id}")))?;
        row.try_into()
    }

    /// Update a video's status.
    pub async fn set_video_status(&self, id: &VideoId, status: VideoStatus) -> StoreResult<()> {
        sqlx::query("UPDATE videos SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Segments
    // ========================================================================

    /// Insert a detected segment.
    pub async fn insert_segment(&self, segment: &Segment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO segments
                (id, video_id, start_time, end_time, duration, composite_score,
                 yt_retention, signals, reason, status, has_captions, caption_style,
                 caption_data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(segment.id.as_str())
        .bind(segment.video_id.as_str())
        .bind(segment.start_time)
        .bind(segment.end_time)
        .bind(segment.duration)
        .bind(segment.composite_score)
        .bind(segment.yt_retention)
        .bind(serde_json::to_value(segment.signals)?)
        .bind(&segment.reason)
        .bind(segment.status.as_str())
        .bind(segment.has_captions)
        .bind(&segment.caption_style)
        .bind(&segment.caption_data)
        .bind(segment.created_at)
        .bind(segment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a segment by ID.
    pub async fn get_segment(&self, id: &SegmentId) -> StoreResult<Segment> {
        let row = sqlx::query_as::<_, SegmentRow>("SELECT * FROM segments WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("segment {id}")))?;
        row.try_into()
    }

    /// Update a segment's status.
    pub async fn set_segment_status(
        &self,
        id: &SegmentId,
        status: SegmentStatus,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE segments SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record caption results on an extracted segment.
    ///
    /// Explicit nulls are written when captions were skipped or failed.
    pub async fn set_segment_captions(
        &self,
        id: &SegmentId,
        has_captions: bool,
        caption_style: Option<&str>,
        caption_data: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE segments
            SET status = 'extracted', has_captions = $2, caption_style = $3,
                caption_data = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(has_captions)
        .bind(caption_style)
        .bind(caption_data)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========================================================================
    // Clips
    // ========================================================================

    /// Insert a clip, treating a duplicate segment as success.
    ///
    /// Extraction tasks can be delivered more than once; the unique constraint
    /// on `segment_id` makes the second insert a no-op, and the surviving row
    /// is returned either way.
    pub async fn insert_clip(&self, clip: &Clip) -> StoreResult<Clip> {
        sqlx::query(
            r#"
            INSERT INTO clips
                (id, segment_id, video_id, storage_key, thumbnail_key, title,
                 description, tags, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (segment_id) DO NOTHING
            "#,
        )
        .bind(clip.id.as_str())
        .bind(clip.segment_id.as_str())
        .bind(clip.video_id.as_str())
        .bind(&clip.storage_key)
        .bind(&clip.thumbnail_key)
        .bind(&clip.title)
        .bind(&clip.description)
        .bind(&clip.tags)
        .bind(clip.status.as_str())
        .bind(clip.created_at)
        .bind(clip.updated_at)
        .execute(&self.pool)
        .await?;

        let row =
            sqlx::query_as::<_, ClipRow>("SELECT * FROM clips WHERE segment_id = $1")
                .bind(clip.segment_id.as_str())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| {
                    StoreError::not_found(format!("clip for segment {}", clip.segment_id))
                })?;

        row.try_into()
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    /// Number of segments detected for a video.
    pub async fn count_segments(&self, video_id: &VideoId) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM segments WHERE video_id = $1")
                .bind(video_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Number of clips rendered for a video.
    pub async fn count_clips(&self, video_id: &VideoId) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clips WHERE video_id = $1")
            .bind(video_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
