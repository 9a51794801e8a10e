//! Scene-change detection using the ffmpeg scene filter.

use std::path::Path;

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Per-invocation timeout (seconds).
const DETECT_TIMEOUT_SECS: u64 = 120;

fn pts_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"pts_time:\s*([\d.]+)").expect("valid regex"))
}

/// Detect scene boundaries in `[start, start+duration]`.
///
/// Runs `select='gt(scene,threshold)',showinfo` and parses the selected
/// frames' `pts_time` from stderr. Returned times are absolute within the
/// source (the seek offset is added back).
pub async fn detect_scene_changes(
    input: impl AsRef<Path>,
    start: f64,
    duration: f64,
    threshold: f64,
) -> MediaResult<Vec<f64>> {
    let input = input.as_ref();

    let cmd = FfmpegCommand::analyze(input)
        .seek(start)
        .duration(duration)
        .video_filter(format!("select='gt(scene,{threshold})',showinfo"))
        .output_arg("-an");

    let stderr = FfmpegRunner::new()
        .with_timeout(DETECT_TIMEOUT_SECS)
        .run_captured(&cmd)
        .await?;

    let mut boundaries = parse_showinfo_times(&stderr);
    for t in &mut boundaries {
        *t += start;
    }

    debug!(
        start = start,
        duration = duration,
        boundaries = boundaries.len(),
        "Scene detection complete"
    );

    Ok(boundaries)
}

/// Parse frame timestamps from showinfo stderr output.
fn parse_showinfo_times(stderr: &str) -> Vec<f64> {
    let re = pts_pattern();
    let mut times: Vec<f64> = stderr
        .lines()
        .filter(|line| line.contains("Parsed_showinfo"))
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    times.dedup();
    times
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_showinfo_times() {
        let stderr = "\
[Parsed_showinfo_1 @ 0x5555] n: 0 pts: 12345 pts_time:2.4 duration_time:0.04
[Parsed_showinfo_1 @ 0x5555] n: 1 pts: 45678 pts_time:7.96 duration_time:0.04
[Parsed_showinfo_1 @ 0x5555] config in time_base: 1/25600
some unrelated line pts_time:99.0
";
        let times = parse_showinfo_times(stderr);
        assert_eq!(times, vec![2.4, 7.96]);
    }

    #[test]
    fn test_parse_showinfo_empty() {
        assert!(parse_showinfo_times("no frames selected").is_empty());
    }
}
