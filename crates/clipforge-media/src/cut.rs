//! Clip cutting, caption burn-in, and audio extraction.

use std::path::Path;

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Scale-and-crop filter producing 1080x1920 (9:16) output: upscale to cover,
/// then center-crop.
const VERTICAL_FILTER: &str =
    "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920";

/// Cut a vertical clip from the source.
///
/// Seeks to `start`, encodes `duration` seconds at 1080x1920 with H.264
/// preset medium CRF 23, AAC 128 kb/s, and faststart for streaming.
pub async fn cut_vertical_clip(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: f64,
    duration: f64,
    timeout_secs: u64,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    info!(
        "Cutting clip: {} -> {} (start: {:.1}s, duration: {:.1}s)",
        input.display(),
        output.display(),
        start,
        duration
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(start)
        .duration(duration)
        .video_filter(VERTICAL_FILTER)
        .video_codec("libx264")
        .preset("medium")
        .crf(23)
        .audio_codec("aac")
        .audio_bitrate("128k")
        .output_args(["-movflags", "+faststart"]);

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}

/// Burn a subtitle file into a clip.
///
/// `force_style` is passed through to the subtitles filter for plain-format
/// files; ASS files carry their own styling and pass `None`.
pub async fn burn_captions(
    input: impl AsRef<Path>,
    subtitle_path: impl AsRef<Path>,
    output: impl AsRef<Path>,
    force_style: Option<&str>,
    timeout_secs: u64,
) -> MediaResult<()> {
    let input = input.as_ref();
    let subtitle_path = subtitle_path.as_ref();
    let output = output.as_ref();

    let subtitle_arg = escape_filter_path(&subtitle_path.to_string_lossy());
    let filter = match force_style {
        Some(style) => format!("subtitles={subtitle_arg}:force_style='{style}'"),
        None => format!("ass={subtitle_arg}"),
    };

    info!(
        "Burning captions: {} + {} -> {}",
        input.display(),
        subtitle_path.display(),
        output.display()
    );

    let cmd = FfmpegCommand::new(input, output)
        .video_filter(filter)
        .video_codec("libx264")
        .preset("medium")
        .crf(23)
        .audio_codec("copy")
        .output_args(["-movflags", "+faststart"]);

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}

/// Extract a mono MP3 at 128 kb/s from `[start, start+duration]`.
///
/// This is the payload submitted to the transcription endpoint.
pub async fn extract_audio_segment(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: f64,
    duration: f64,
    timeout_secs: u64,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input.as_ref(), output.as_ref())
        .seek(start)
        .duration(duration)
        .no_video()
        .output_args(["-ac", "1"])
        .audio_codec("libmp3lame")
        .audio_bitrate("128k");

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}

/// Escape a path for use inside an ffmpeg filter argument.
///
/// Colons separate filter options, so they must be escaped; single quotes
/// would terminate the option value.
fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_filter_shape() {
        assert!(VERTICAL_FILTER.contains("1080:1920"));
        assert!(VERTICAL_FILTER.contains("force_original_aspect_ratio=increase"));
        assert!(VERTICAL_FILTER.contains("crop=1080:1920"));
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path("/tmp/captions.ass"), "/tmp/captions.ass");
        assert_eq!(escape_filter_path("C:/subs.srt"), "C\\:/subs.srt");
        assert_eq!(escape_filter_path("a'b.ass"), "a\\'b.ass");
    }
}
