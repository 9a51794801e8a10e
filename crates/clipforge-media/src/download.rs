//! Source download using yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Per-invocation timeout (seconds).
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Cap on captured output bytes (50 MiB; yt-dlp fragment logs can be huge).
const MAX_OUTPUT_CAPTURE: usize = 50 * 1024 * 1024;

/// Video file extensions yt-dlp may produce.
const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mkv"];

/// Metadata from the downloader's companion info JSON.
///
/// All fields are optional; a missing or unparseable file yields defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceInfo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// A completed download: the media file plus its metadata.
#[derive(Debug)]
pub struct DownloadedMedia {
    /// Path to the downloaded video file
    pub video_path: PathBuf,
    /// Parsed companion metadata
    pub info: SourceInfo,
}

/// Download a source video into `work_dir` using yt-dlp.
///
/// The output template is `video.%(ext)s`; the produced file is located by
/// scanning for the first `video.*` with a known video extension. The
/// companion `video.info.json` is tolerated missing.
pub async fn download_source(url: &str, work_dir: &Path) -> MediaResult<DownloadedMedia> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    tokio::fs::create_dir_all(work_dir).await?;
    let output_template = work_dir.join("video.%(ext)s");
    let output_template_str = output_template.to_string_lossy();

    let args = [
        "--no-check-certificates",
        "--no-warnings",
        "--ignore-errors",
        "--format",
        "best[ext=mp4]/best",
        "--output",
        &output_template_str,
        "--write-info-json",
        "--write-thumbnail",
        "--no-playlist",
        "--socket-timeout",
        "30",
        "--retries",
        "15",
        "--fragment-retries",
        "15",
        "--extractor-args",
        "youtube:player_client=web",
        url,
    ];

    info!(url = %url, dir = %work_dir.display(), "Downloading source video");

    let mut child = Command::new("yt-dlp")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let capture_future = async {
        use tokio::io::AsyncReadExt;
        let mut captured = Vec::new();
        if let Some(mut stderr) = child.stderr.take() {
            let mut buf = [0u8; 8192];
            loop {
                let n = stderr.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                if captured.len() < MAX_OUTPUT_CAPTURE {
                    captured.extend_from_slice(&buf[..n]);
                }
            }
        }
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, captured))
    };

    let timed = tokio::time::timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS), capture_future)
        .await;
    let (status, captured) = match timed {
        Ok(result) => result?,
        Err(_) => {
            warn!(url = %url, "yt-dlp timed out, killing process");
            let _ = child.kill().await;
            return Err(MediaError::Timeout(DOWNLOAD_TIMEOUT_SECS));
        }
    };

    if !status.success() {
        let stderr = String::from_utf8_lossy(&captured);
        let last_line = stderr.lines().last().unwrap_or("Unknown error");
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {last_line}"
        )));
    }

    let video_path = find_video_file(work_dir).await?;
    let info = read_info_json(work_dir).await;

    let size = tokio::fs::metadata(&video_path).await?.len();
    info!(
        output = %video_path.display(),
        size_mb = size as f64 / (1024.0 * 1024.0),
        "Downloaded source video"
    );

    Ok(DownloadedMedia { video_path, info })
}

/// Locate the produced video file: first `video.*` with a video extension.
async fn find_video_file(work_dir: &Path) -> MediaResult<PathBuf> {
    let mut entries = tokio::fs::read_dir(work_dir).await?;
    let mut candidates = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if !name.starts_with("video.") {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            candidates.push(path);
        }
    }

    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or(MediaError::DownloadMissingOutput)
}

/// Read and parse the companion `video.info.json`, tolerating absence.
async fn read_info_json(work_dir: &Path) -> SourceInfo {
    let info_path = work_dir.join("video.info.json");
    let content = match tokio::fs::read_to_string(&info_path).await {
        Ok(content) => content,
        Err(_) => {
            debug!(path = %info_path.display(), "No info JSON, using defaults");
            return SourceInfo::default();
        }
    };

    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(raw) => {
            let mut info: SourceInfo =
                serde_json::from_value(raw.clone()).unwrap_or_default();
            info.raw = raw;
            info
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse info JSON, using defaults");
            SourceInfo::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_find_video_file_prefers_known_extensions() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("video.info.json"), b"{}")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("video.webp"), b"thumb")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("video.mp4"), b"media")
            .await
            .unwrap();

        let found = find_video_file(dir.path()).await.unwrap();
        assert_eq!(found.file_name().unwrap(), "video.mp4");
    }

    #[tokio::test]
    async fn test_find_video_file_missing() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("video.info.json"), b"{}")
            .await
            .unwrap();

        let err = find_video_file(dir.path()).await.unwrap_err();
        assert!(matches!(err, MediaError::DownloadMissingOutput));
    }

    #[tokio::test]
    async fn test_read_info_json_defaults_when_absent() {
        let dir = TempDir::new().unwrap();
        let info = read_info_json(dir.path()).await;
        assert!(info.title.is_none());
        assert!(info.duration.is_none());
    }

    #[tokio::test]
    async fn test_read_info_json_parses_fields() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join("video.info.json"),
            br#"{"title": "Test", "duration": 300.5, "uploader": "someone"}"#,
        )
        .await
        .unwrap();

        let info = read_info_json(dir.path()).await;
        assert_eq!(info.title.as_deref(), Some("Test"));
        assert_eq!(info.duration, Some(300.5));
        assert_eq!(info.raw["uploader"], "someone");
    }
}
