//! Extraction worker: cut the clip, caption it, thumbnail it, upload, and
//! aggregate job completion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use clipforge_media as media;
use clipforge_models::{
    build_clip_tags, build_clip_title, CaptionSegment, Clip, SegmentStatus, VideoStatus,
};
use clipforge_queue::ExtractionTask;

use crate::captions;
use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

/// Outcome of the caption step.
struct CaptionOutcome {
    /// Path to the captioned clip, when burning succeeded
    captioned_path: Option<PathBuf>,
    /// Subtitle format used ("ass" or "srt")
    style: Option<&'static str>,
    /// The generated caption segments
    segments: Vec<CaptionSegment>,
}

impl CaptionOutcome {
    fn none() -> Self {
        Self {
            captioned_path: None,
            style: None,
            segments: Vec::new(),
        }
    }
}

/// Handle one extraction task.
///
/// Any failure marks the Segment failed before the error propagates to the
/// executor for nack/backoff; a failed Segment never fails the Job.
pub async fn handle(ctx: &Arc<WorkerContext>, task: &ExtractionTask) -> WorkerResult<()> {
    let result = run(ctx, task).await;

    if let Err(ref e) = result {
        warn!(segment_id = %task.segment_id, error = %e, "Extraction failed");
        ctx.store
            .set_segment_status(&task.segment_id, SegmentStatus::Failed)
            .await
            .ok();
    }

    result
}

async fn run(ctx: &Arc<WorkerContext>, task: &ExtractionTask) -> WorkerResult<()> {
    let segment = ctx
        .store
        .get_segment(&task.segment_id)
        .await
        .map_err(|_| WorkerError::data_integrity(format!("segment {} not found", task.segment_id)))?;
    let video = ctx
        .store
        .get_video(&task.video_id)
        .await
        .map_err(|_| WorkerError::data_integrity(format!("video {} not found", task.video_id)))?;

    ctx.store
        .set_segment_status(&segment.id, SegmentStatus::Extracting)
        .await?;

    let work_dir = tempfile::Builder::new()
        .prefix("clipforge-extract-")
        .tempdir_in(&ctx.config.work_dir)?;

    let source_path = work_dir.path().join("source.mp4");
    ctx.storage
        .download_file(
            &ctx.storage.buckets().raw_videos,
            &video.storage_key,
            &source_path,
        )
        .await?;

    let timeout = ctx.config.extraction_timeout.as_secs();
    let duration = task.end - task.start;

    let cut_path = work_dir.path().join("clip.mp4");
    media::cut_vertical_clip(&source_path, &cut_path, task.start, duration, timeout).await?;

    // Captions degrade gracefully: any failure falls back to the plain clip.
    let captions_wanted = ctx.config.captions_enabled && ctx.transcriber.is_some();
    let caption_outcome = if captions_wanted {
        generate_captions(ctx, &source_path, &cut_path, work_dir.path(), task, timeout).await
    } else {
        CaptionOutcome::none()
    };

    let final_path = caption_outcome
        .captioned_path
        .as_deref()
        .unwrap_or(&cut_path);

    // Thumbnail failure is non-fatal.
    let thumb_path = work_dir.path().join("thumb.jpg");
    let has_thumbnail = match media::generate_thumbnail(final_path, &thumb_path).await {
        Ok(()) => true,
        Err(e) => {
            warn!(segment_id = %segment.id, error = %e, "Thumbnail generation failed");
            false
        }
    };

    let clip_key = format!("clips/{}/{}.mp4", video.id, segment.id);
    let thumb_key = format!("thumbnails/{}/{}.jpg", video.id, segment.id);
    let bucket = &ctx.storage.buckets().processed_shorts;

    ctx.storage
        .upload_file(bucket, final_path, &clip_key, "video/mp4")
        .await?;
    if has_thumbnail {
        ctx.storage
            .upload_file(bucket, &thumb_path, &thumb_key, "image/jpeg")
            .await?;
    }

    let clip = Clip::new(
        segment.id.clone(),
        video.id.clone(),
        clip_key,
        build_clip_title(&video.title, segment.composite_score),
        format!(
            "Detected highlight: {} ({:.0}% predicted engagement)",
            segment.reason,
            segment.composite_score * 100.0
        ),
        build_clip_tags(&video.title),
    )
    .with_thumbnail_key(has_thumbnail.then(|| thumb_key.clone()));

    // Duplicate delivery lands on the same (segment_id) row and is success.
    let clip = ctx.store.insert_clip(&clip).await?;

    let has_captions = caption_outcome.captioned_path.is_some();
    let caption_data = if has_captions {
        Some(
            serde_json::to_string(&caption_outcome.segments)
                .map_err(|e| WorkerError::processing_failed(format!("serialize captions: {e}")))?,
        )
    } else {
        None
    };
    ctx.store
        .set_segment_captions(
            &segment.id,
            has_captions,
            caption_outcome.style.filter(|_| has_captions),
            caption_data.as_deref(),
        )
        .await?;

    info!(
        segment_id = %segment.id,
        clip_id = %clip.id,
        has_captions = has_captions,
        "Clip extracted"
    );

    // Completion aggregation: idempotent read-modify-write on the Job.
    let completed = ctx.store.try_complete_job(&task.job_id, &video.id).await?;
    if completed {
        ctx.store
            .set_video_status(&video.id, VideoStatus::Processed)
            .await?;
    }

    Ok(())
}

/// Generate caption segments and burn them into the clip.
///
/// The styled ASS format is tried first; on burn failure the simpler SRT
/// format is retried with a force_style; when both fail the un-captioned
/// clip is kept.
async fn generate_captions(
    ctx: &Arc<WorkerContext>,
    source_path: &Path,
    cut_path: &Path,
    work_dir: &Path,
    task: &ExtractionTask,
    timeout: u64,
) -> CaptionOutcome {
    let Some(transcriber) = &ctx.transcriber else {
        return CaptionOutcome::none();
    };
    let duration = task.end - task.start;

    let audio_path = work_dir.join("speech.mp3");
    let words = async {
        media::extract_audio_segment(source_path, &audio_path, task.start, duration, timeout)
            .await?;
        transcriber.transcribe_file(&audio_path, duration).await
    }
    .await;

    let words = match words {
        Ok(words) => words,
        Err(e) => {
            warn!(segment_id = %task.segment_id, error = %e, "Caption transcription failed, skipping");
            return CaptionOutcome::none();
        }
    };

    let segments = captions::build_caption_segments(&words);
    if segments.is_empty() {
        return CaptionOutcome::none();
    }

    // Styled pass
    let ass_path = work_dir.join("captions.ass");
    let ass_output = work_dir.join("clip_captioned.mp4");
    let ass_result = async {
        tokio::fs::write(&ass_path, media::to_ass(&segments)).await?;
        media::burn_captions(cut_path, &ass_path, &ass_output, None, timeout).await?;
        Ok::<_, WorkerError>(())
    }
    .await;

    if ass_result.is_ok() {
        return CaptionOutcome {
            captioned_path: Some(ass_output),
            style: Some("ass"),
            segments,
        };
    }
    warn!(segment_id = %task.segment_id, "Styled caption burn failed, retrying with SRT");

    // Simple pass
    let srt_path = work_dir.join("captions.srt");
    let srt_output = work_dir.join("clip_captioned_srt.mp4");
    let srt_result = async {
        tokio::fs::write(&srt_path, media::to_srt(&segments)).await?;
        media::burn_captions(
            cut_path,
            &srt_path,
            &srt_output,
            Some(media::SRT_FORCE_STYLE),
            timeout,
        )
        .await?;
        Ok::<_, WorkerError>(())
    }
    .await;

    if srt_result.is_ok() {
        return CaptionOutcome {
            captioned_path: Some(srt_output),
            style: Some("srt"),
            segments,
        };
    }

    warn!(segment_id = %task.segment_id, "Both caption burns failed, keeping plain clip");
    CaptionOutcome::none()
}
