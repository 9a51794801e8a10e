//! Audio analysis over a time range using ffmpeg filters.
//!
//! volumedetect and silencedetect write their results to stderr; both are
//! parsed from the captured text.

use std::path::Path;

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Silence detection threshold in dB.
const SILENCE_THRESHOLD_DB: f64 = -50.0;

/// Minimum silence duration in seconds.
const MIN_SILENCE_DURATION: f64 = 1.0;

/// Minimum duration of a loud burst in seconds.
const MIN_LOUD_DURATION: f64 = 0.3;

/// Per-invocation timeout (seconds).
const ANALYSIS_TIMEOUT_SECS: u64 = 120;

/// Audio statistics for a time range.
#[derive(Debug, Clone, Default)]
pub struct AudioStats {
    /// Mean volume in dB
    pub mean_volume: f64,
    /// Max volume in dB
    pub max_volume: f64,
    /// Silence intervals as (start, end) in seconds, relative to the range
    pub silences: Vec<(f64, f64)>,
    /// Start times of loud bursts in seconds, relative to the range
    pub loud_moments: Vec<f64>,
}

impl AudioStats {
    /// Total silent time in seconds.
    pub fn total_silence(&self) -> f64 {
        self.silences.iter().map(|(s, e)| e - s).sum()
    }
}

/// Analyze the audio of `[start, start+duration]`.
///
/// Two ffmpeg passes: volumedetect for mean/max volume, then silencedetect at
/// the silence threshold. Loud moments are the starts of the non-silent
/// intervals a third silencedetect pass finds at a threshold midway between
/// mean and max volume.
pub async fn analyze_audio(
    input: impl AsRef<Path>,
    start: f64,
    duration: f64,
) -> MediaResult<AudioStats> {
    let input = input.as_ref();

    let volume_cmd = FfmpegCommand::analyze(input)
        .seek(start)
        .duration(duration)
        .audio_filter("volumedetect")
        .output_arg("-vn");
    let volume_stderr = FfmpegRunner::new()
        .with_timeout(ANALYSIS_TIMEOUT_SECS)
        .run_captured(&volume_cmd)
        .await?;
    let (mean_volume, max_volume) = parse_volumedetect(&volume_stderr);

    let silence_cmd = FfmpegCommand::analyze(input)
        .seek(start)
        .duration(duration)
        .audio_filter(format!(
            "silencedetect=noise={SILENCE_THRESHOLD_DB}dB:d={MIN_SILENCE_DURATION}"
        ))
        .output_arg("-vn");
    let silence_stderr = FfmpegRunner::new()
        .with_timeout(ANALYSIS_TIMEOUT_SECS)
        .run_captured(&silence_cmd)
        .await?;
    let silences = parse_silencedetect(&silence_stderr, duration);

    // Loud bursts: intervals the signal stays above the midpoint threshold.
    let loud_threshold = ((mean_volume + max_volume) / 2.0).min(max_volume - 1.0);
    let loud_cmd = FfmpegCommand::analyze(input)
        .seek(start)
        .duration(duration)
        .audio_filter(format!(
            "silencedetect=noise={loud_threshold:.1}dB:d={MIN_LOUD_DURATION}"
        ))
        .output_arg("-vn");
    let loud_stderr = FfmpegRunner::new()
        .with_timeout(ANALYSIS_TIMEOUT_SECS)
        .run_captured(&loud_cmd)
        .await?;
    let quiet_at_threshold = parse_silencedetect(&loud_stderr, duration);
    let loud_moments = invert_intervals(&quiet_at_threshold, duration)
        .into_iter()
        .map(|(s, _)| s)
        .collect();

    let stats = AudioStats {
        mean_volume,
        max_volume,
        silences,
        loud_moments,
    };

    debug!(
        mean = stats.mean_volume,
        max = stats.max_volume,
        silences = stats.silences.len(),
        loud = stats.loud_moments.len(),
        "Audio analysis complete"
    );

    Ok(stats)
}

fn volume_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"mean_volume:\s*(-?[\d.]+)\s*dB").expect("valid regex"),
            Regex::new(r"max_volume:\s*(-?[\d.]+)\s*dB").expect("valid regex"),
        )
    })
}

/// Parse mean/max volume from volumedetect stderr.
fn parse_volumedetect(stderr: &str) -> (f64, f64) {
    let (mean_re, max_re) = volume_patterns();

    let mean = mean_re
        .captures(stderr)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(-60.0);
    let max = max_re
        .captures(stderr)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(mean);

    (mean, max.max(mean))
}

fn silence_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"silence_start:\s*(-?[\d.]+)").expect("valid regex"),
            Regex::new(r"silence_end:\s*(-?[\d.]+)").expect("valid regex"),
        )
    })
}

/// Parse silence intervals from silencedetect stderr.
///
/// A trailing silence_start without a matching end runs to the range end.
fn parse_silencedetect(stderr: &str, duration: f64) -> Vec<(f64, f64)> {
    let (start_re, end_re) = silence_patterns();

    let mut intervals = Vec::new();
    let mut open_start: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(caps) = start_re.captures(line) {
            if let Ok(s) = caps[1].parse::<f64>() {
                open_start = Some(s.max(0.0));
            }
        } else if let Some(caps) = end_re.captures(line) {
            if let (Some(s), Ok(e)) = (open_start.take(), caps[1].parse::<f64>()) {
                if e > s {
                    intervals.push((s, e.min(duration)));
                }
            }
        }
    }

    if let Some(s) = open_start {
        if duration > s {
            intervals.push((s, duration));
        }
    }

    intervals
}

/// Complement of a sorted interval set within `[0, duration]`.
fn invert_intervals(intervals: &[(f64, f64)], duration: f64) -> Vec<(f64, f64)> {
    let mut result = Vec::new();
    let mut cursor = 0.0;

    for &(s, e) in intervals {
        if s > cursor {
            result.push((cursor, s));
        }
        cursor = cursor.max(e);
    }
    if duration > cursor {
        result.push((cursor, duration));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volumedetect() {
        let stderr = "\
[Parsed_volumedetect_0 @ 0x5555] n_samples: 1323000
[Parsed_volumedetect_0 @ 0x5555] mean_volume: -23.4 dB
[Parsed_volumedetect_0 @ 0x5555] max_volume: -5.1 dB
";
        let (mean, max) = parse_volumedetect(stderr);
        assert!((mean - (-23.4)).abs() < 1e-9);
        assert!((max - (-5.1)).abs() < 1e-9);
    }

    #[test]
    fn test_parse_volumedetect_defaults() {
        let (mean, max) = parse_volumedetect("no matches here");
        assert_eq!(mean, -60.0);
        assert_eq!(max, -60.0);
    }

    #[test]
    fn test_parse_silencedetect_pairs() {
        let stderr = "\
[silencedetect @ 0x5555] silence_start: 2.5
[silencedetect @ 0x5555] silence_end: 4.0 | silence_duration: 1.5
[silencedetect @ 0x5555] silence_start: 10.0
[silencedetect @ 0x5555] silence_end: 12.25 | silence_duration: 2.25
";
        let intervals = parse_silencedetect(stderr, 30.0);
        assert_eq!(intervals, vec![(2.5, 4.0), (10.0, 12.25)]);
    }

    #[test]
    fn test_parse_silencedetect_trailing_open() {
        let stderr = "[silencedetect @ 0x5555] silence_start: 25.0\n";
        let intervals = parse_silencedetect(stderr, 30.0);
        assert_eq!(intervals, vec![(25.0, 30.0)]);
    }

    #[test]
    fn test_invert_intervals() {
        let quiet = vec![(0.0, 5.0), (10.0, 15.0)];
        let loud = invert_intervals(&quiet, 20.0);
        assert_eq!(loud, vec![(5.0, 10.0), (15.0, 20.0)]);

        let none: Vec<(f64, f64)> = vec![];
        assert_eq!(invert_intervals(&none, 10.0), vec![(0.0, 10.0)]);
    }

    #[test]
    fn test_total_silence() {
        let stats = AudioStats {
            mean_volume: -20.0,
            max_volume: -5.0,
            silences: vec![(0.0, 1.5), (3.0, 4.0)],
            loud_moments: vec![],
        };
        assert!((stats.total_silence() - 2.5).abs() < 1e-9);
    }
}
