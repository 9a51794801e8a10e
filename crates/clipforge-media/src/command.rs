//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Cap on captured stderr bytes per invocation.
const MAX_STDERR_CAPTURE: usize = 512 * 1024;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path, or None for analysis runs (`-f null -`)
    output: Option<PathBuf>,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to a file.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: Some(output.as_ref().to_path_buf()),
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Create an analysis command with a null muxer (no output file).
    pub fn analyze(input: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: None,
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "info".to_string(),
        }
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{seconds:.3}"))
    }

    /// Set duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{seconds:.3}"))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-vframes").output_arg("1")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
        ];

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        match &self.output {
            Some(output) => args.push(output.to_string_lossy().to_string()),
            None => {
                args.push("-f".to_string());
                args.push("null".to_string());
                args.push("-".to_string());
            }
        }

        args
    }
}

/// Runner for FFmpeg commands with timeout and kill-on-timeout.
#[derive(Debug, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command, discarding stderr.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_captured(cmd).await.map(|_| ())
    }

    /// Run an FFmpeg command and return the captured stderr.
    ///
    /// Several analysis filters (volumedetect, silencedetect, showinfo) write
    /// their results to stderr, so callers parse the returned text.
    pub async fn run_captured(&self, cmd: &FfmpegCommand) -> MediaResult<String> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let output_future = async {
            let mut stderr = Vec::new();
            if let Some(mut pipe) = child.stderr.take() {
                use tokio::io::AsyncReadExt;
                let mut buf = [0u8; 8192];
                loop {
                    let n = pipe.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    if stderr.len() < MAX_STDERR_CAPTURE {
                        stderr.extend_from_slice(&buf[..n]);
                    }
                }
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stderr))
        };

        let (status, stderr) = match self.timeout_secs {
            Some(timeout_secs) => {
                let result = tokio::time::timeout(
                    std::time::Duration::from_secs(timeout_secs),
                    output_future,
                )
                .await;
                match result {
                    Ok(output) => output?,
                    Err(_) => {
                        warn!("FFmpeg timed out after {} seconds, killing", timeout_secs);
                        let _ = child.kill().await;
                        return Err(MediaError::Timeout(timeout_secs));
                    }
                }
            }
            None => output_future.await?,
        };

        let stderr = String::from_utf8_lossy(&stderr).to_string();

        if status.success() {
            Ok(stderr)
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr),
                status.code(),
            ))
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Check if yt-dlp is available.
pub fn check_ytdlp() -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .video_codec("libx264")
            .crf(23);

        let args = cmd.build_args();
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"10.000".to_string()));
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp4");
    }

    #[test]
    fn test_analyze_command_uses_null_muxer() {
        let cmd = FfmpegCommand::analyze("input.mp4").audio_filter("volumedetect");
        let args = cmd.build_args();
        let tail: Vec<_> = args.iter().rev().take(3).map(|s| s.as_str()).collect();
        assert_eq!(tail, ["-", "null", "-f"]);
        assert!(args.contains(&"volumedetect".to_string()));
    }

    #[test]
    fn test_seek_before_input() {
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4").seek(5.0);
        let args = cmd.build_args();
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        let i_pos = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss_pos < i_pos);
    }
}
