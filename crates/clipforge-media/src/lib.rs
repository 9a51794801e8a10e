//! Media subprocess layer.
//!
//! Wraps the external tools the pipeline shells out to:
//! - ffmpeg (cutting, filters, caption burn-in, thumbnails, audio analysis)
//! - ffprobe (stream/duration probing)
//! - yt-dlp (source download)
//!
//! All tools are treated as black-box subprocesses with argv-only invocation,
//! bounded output capture, and explicit kill-on-timeout.

pub mod audio;
pub mod command;
pub mod cut;
pub mod download;
pub mod error;
pub mod probe;
pub mod scene;
pub mod subtitle;
pub mod thumbnail;

pub use audio::{analyze_audio, AudioStats};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use cut::{burn_captions, cut_vertical_clip, extract_audio_segment};
pub use download::{download_source, DownloadedMedia, SourceInfo};
pub use error::{MediaError, MediaResult};
pub use probe::{get_duration, probe_video, VideoInfo};
pub use scene::detect_scene_changes;
pub use subtitle::{parse_ass, parse_srt, to_ass, to_srt, SRT_FORCE_STYLE};
pub use thumbnail::generate_thumbnail;
