//! Download worker: fetch source media, persist the Video row, fan into
//! analysis.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use clipforge_media as media;
use clipforge_models::{extract_external_id, JobStatus, Video};
use clipforge_queue::{AnalysisTask, DownloadTask, QueueTask};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

/// Handle one download task.
///
/// The temp directory is keyed by external id plus a millisecond timestamp,
/// so concurrently delivered duplicates never collide, and it is removed on
/// both the success and failure paths.
pub async fn handle(ctx: &Arc<WorkerContext>, task: &DownloadTask) -> WorkerResult<()> {
    ctx.store
        .set_job_stage(
            &task.job_id,
            JobStatus::Downloading,
            10,
            "Starting download",
        )
        .await?;

    let external_id = extract_external_id(&task.source_url)
        .map_err(|e| WorkerError::invalid_input(format!("invalid url: {e}")))?;

    let work_dir = PathBuf::from(&ctx.config.work_dir).join(format!(
        "download-{}-{}",
        external_id,
        chrono::Utc::now().timestamp_millis()
    ));

    let result = run(ctx, task, &external_id, &work_dir).await;

    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        if work_dir.exists() {
            warn!(dir = %work_dir.display(), error = %e, "Failed to remove download work dir");
        }
    }

    result
}

async fn run(
    ctx: &Arc<WorkerContext>,
    task: &DownloadTask,
    external_id: &str,
    work_dir: &PathBuf,
) -> WorkerResult<()> {
    let downloaded = media::download_source(&task.source_url, work_dir).await?;

    ctx.store
        .set_job_progress(&task.job_id, 50, "Uploading source media")
        .await?;

    let filename = downloaded
        .video_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| WorkerError::processing_failed("downloaded file has no name"))?;
    let storage_key = format!("raw-videos/{external_id}/{filename}");

    ctx.storage
        .upload_file(
            &ctx.storage.buckets().raw_videos,
            &downloaded.video_path,
            &storage_key,
            "video/mp4",
        )
        .await?;

    ctx.store
        .set_job_progress(&task.job_id, 80, "Registering video")
        .await?;

    let info = downloaded.info;
    let title = info
        .title
        .clone()
        .unwrap_or_else(|| format!("Video {external_id}"));
    let duration = info.duration.unwrap_or(0.0).round() as i64;

    let video = Video::new(
        &task.user_id,
        external_id,
        &task.source_url,
        title,
        duration,
        &storage_key,
    )
    .with_description(info.description.clone())
    .with_thumbnail_url(info.thumbnail.clone())
    .with_metadata(info.raw);

    // Upsert keyed on external_id: redelivery reuses the existing row.
    let video = ctx.store.upsert_video(&video).await?;
    ctx.store.link_job_video(&task.job_id, &video.id).await?;

    ctx.queue
        .enqueue(&QueueTask::Analysis(AnalysisTask::new(
            task.job_id.clone(),
            video.id.clone(),
        )))
        .await?;

    info!(
        job_id = %task.job_id,
        video_id = %video.id,
        external_id = %external_id,
        "Download complete, analysis enqueued"
    );

    Ok(())
}
