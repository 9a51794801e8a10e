//! Thumbnail generation.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::get_duration;

/// Per-invocation timeout (seconds).
const THUMBNAIL_TIMEOUT_SECS: u64 = 60;

/// Generate a 1080x1920 thumbnail from the clip's midpoint frame.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    let duration = get_duration(video_path).await?;
    let midpoint = duration / 2.0;

    let cmd = FfmpegCommand::new(video_path, output_path)
        .seek(midpoint)
        .single_frame()
        .video_filter("scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920");

    FfmpegRunner::new()
        .with_timeout(THUMBNAIL_TIMEOUT_SECS)
        .run(&cmd)
        .await
}
