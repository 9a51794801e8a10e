//! Analysis worker: candidate generation, multi-signal scoring, selection,
//! boundary snapping, persistence, and extraction fan-out.

pub mod scoring;
pub mod select;
pub mod signals;
pub mod triggers;
pub mod windows;

use std::sync::Arc;

use tracing::{info, warn};

use clipforge_media as media;
use clipforge_models::{JobStatus, Segment, VideoStatus};
use clipforge_queue::{AnalysisTask, ExtractionTask, QueueTask};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

use self::scoring::{score, WindowMeta};
use self::select::{select_top, snap_boundaries, ScoredCandidate};
use self::signals::{AudioSignal, SpeechSignal, VisualSignal};
use self::windows::{generate_windows, CandidateWindow};

/// Scene-change detection threshold.
const SCENE_THRESHOLD: f64 = 0.3;

/// Per-signal-subprocess timeout (seconds).
const SIGNAL_TIMEOUT_SECS: u64 = 120;

/// Candidates scored per batch, to bound memory.
const BATCH_SIZE: usize = 5;

/// Internal default when job options are unavailable.
const DEFAULT_TOP_N: usize = 8;

/// Handle one analysis task.
pub async fn handle(ctx: &Arc<WorkerContext>, task: &AnalysisTask) -> WorkerResult<()> {
    ctx.store
        .set_job_stage(&task.job_id, JobStatus::Analyzing, 10, "Starting analysis")
        .await?;

    let video = ctx
        .store
        .get_video(&task.video_id)
        .await
        .map_err(|_| WorkerError::data_integrity(format!("video {} not found", task.video_id)))?;

    let duration = video.duration as f64;
    if duration <= 0.0 {
        return Err(WorkerError::invalid_input(format!(
            "video {} has non-positive duration",
            video.id
        )));
    }

    let candidates = generate_windows(duration);
    info!(
        video_id = %video.id,
        duration = duration,
        candidates = candidates.len(),
        "Generated candidate windows"
    );

    if candidates.is_empty() {
        // Nothing clippable: the job terminates complete with zero clips.
        ctx.store
            .set_video_status(&video.id, VideoStatus::Analyzed)
            .await?;
        ctx.store
            .set_job_stage(
                &task.job_id,
                JobStatus::Completed,
                100,
                "No clippable range in source",
            )
            .await?;
        return Ok(());
    }

    ctx.store
        .set_job_progress(&task.job_id, 20, "Preparing source media")
        .await?;

    // The signal probes run ffmpeg locally, so pull the raw media down once.
    let work_dir = tempfile::Builder::new()
        .prefix("clipforge-analysis-")
        .tempdir_in(&ctx.config.work_dir)?;
    let source_path = work_dir.path().join("source.mp4");
    ctx.storage
        .download_file(
            &ctx.storage.buckets().raw_videos,
            &video.storage_key,
            &source_path,
        )
        .await?;

    ctx.store
        .set_job_progress(&task.job_id, 30, "Scoring candidate windows")
        .await?;

    // Score in batches of BATCH_SIZE; progress maps linearly over [40, 80].
    let total_batches = candidates.len().div_ceil(BATCH_SIZE);
    let mut scored: Vec<ScoredCandidate> = Vec::with_capacity(candidates.len());

    for (batch_index, batch) in candidates.chunks(BATCH_SIZE).enumerate() {
        for window in batch {
            scored.push(score_window(ctx, &source_path, *window, duration).await);
        }

        let progress = 40 + ((batch_index + 1) * 40 / total_batches) as u8;
        ctx.store
            .set_job_progress(
                &task.job_id,
                progress.min(80),
                &format!("Scored {} of {} candidates", scored.len(), candidates.len()),
            )
            .await?;
    }

    ctx.store
        .set_job_progress(&task.job_id, 85, "Selecting top moments")
        .await?;

    let top_n = match ctx.store.get_job(&task.job_id).await {
        Ok(job) => job.options.clip_count as usize,
        Err(_) => DEFAULT_TOP_N,
    };
    let selected = select_top(scored, top_n);
    info!(video_id = %video.id, selected = selected.len(), "Selected top candidates");

    ctx.store
        .set_job_progress(&task.job_id, 95, "Persisting segments")
        .await?;

    let mut extraction_tasks = Vec::with_capacity(selected.len());
    for candidate in &selected {
        let (start, end) = snap_boundaries(candidate, duration);

        let segment = Segment::new(
            video.id.clone(),
            start,
            end,
            candidate.analysis.composite,
            candidate.analysis.signals,
            candidate.analysis.reason.clone(),
        );

        ctx.store.insert_segment(&segment).await?;
        extraction_tasks.push(ExtractionTask::new(
            task.job_id.clone(),
            video.id.clone(),
            segment.id,
            start,
            end,
        ));
    }

    // Segments are all persisted before the first extraction task is visible.
    for extraction in extraction_tasks {
        ctx.queue
            .enqueue(&QueueTask::Extraction(extraction))
            .await?;
    }

    ctx.store
        .set_video_status(&video.id, VideoStatus::Analyzed)
        .await?;

    if selected.is_empty() {
        warn!(video_id = %video.id, "No segments selected, completing with zero clips");
        ctx.store
            .set_job_stage(
                &task.job_id,
                JobStatus::Completed,
                100,
                "No viable segments detected",
            )
            .await?;
    } else {
        ctx.store
            .set_job_stage(&task.job_id, JobStatus::Extracting, 100, "Extracting clips")
            .await?;
    }

    Ok(())
}

/// Compute the three signals for a window and score it.
///
/// The signal sources run concurrently; any failure substitutes its neutral
/// fallback and the window is still scored.
async fn score_window(
    ctx: &Arc<WorkerContext>,
    source_path: &std::path::Path,
    window: CandidateWindow,
    video_duration: f64,
) -> ScoredCandidate {
    let window_duration = window.duration();

    let (audio, visual, speech) = tokio::join!(
        audio_signal(source_path, window),
        visual_signal(source_path, window),
        speech_signal(ctx, source_path, window),
    );

    let meta = WindowMeta {
        start: window.start,
        duration: window_duration,
        video_duration,
    };
    let analysis = score(&audio, &visual, &speech, &meta);

    ScoredCandidate {
        window,
        analysis,
        scene_changes: visual.scene_changes,
        words: speech.words,
    }
}

async fn audio_signal(source_path: &std::path::Path, window: CandidateWindow) -> AudioSignal {
    match media::analyze_audio(source_path, window.start, window.duration()).await {
        Ok(stats) => AudioSignal {
            mean_volume: stats.mean_volume,
            max_volume: stats.max_volume,
            silences: stats.silences,
            loud_moments: stats.loud_moments,
            fallback: false,
        },
        Err(e) => {
            warn!(start = window.start, error = %e, "Audio probe failed, using fallback");
            AudioSignal::neutral()
        }
    }
}

async fn visual_signal(source_path: &std::path::Path, window: CandidateWindow) -> VisualSignal {
    match media::detect_scene_changes(
        source_path,
        window.start,
        window.duration(),
        SCENE_THRESHOLD,
    )
    .await
    {
        Ok(boundaries) => VisualSignal::from_boundaries(boundaries, window.duration()),
        Err(e) => {
            warn!(start = window.start, error = %e, "Scene detection failed, using fallback");
            VisualSignal::neutral()
        }
    }
}

async fn speech_signal(
    ctx: &Arc<WorkerContext>,
    source_path: &std::path::Path,
    window: CandidateWindow,
) -> SpeechSignal {
    let Some(transcriber) = &ctx.transcriber else {
        return SpeechSignal::neutral();
    };

    let audio_path = source_path.with_extension(format!("w{}.mp3", window.start as u64));
    let result = async {
        media::extract_audio_segment(
            source_path,
            &audio_path,
            window.start,
            window.duration(),
            SIGNAL_TIMEOUT_SECS,
        )
        .await?;
        transcriber
            .transcribe_file(&audio_path, window.duration())
            .await
    }
    .await;

    tokio::fs::remove_file(&audio_path).await.ok();

    match result {
        Ok(words) => SpeechSignal::from_words(words, window.duration()),
        Err(e) => {
            warn!(start = window.start, error = %e, "Speech signal failed, using fallback");
            SpeechSignal::neutral()
        }
    }
}
