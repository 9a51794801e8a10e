//! Candidate window generation.

/// Minimum clip length in seconds.
pub const MIN_CLIP_SECS: f64 = 15.0;

/// Maximum clip length in seconds.
pub const MAX_CLIP_SECS: f64 = 60.0;

/// Step between window centers in seconds.
pub const STEP_SECS: f64 = 5.0;

/// Preferred window length in seconds.
pub const PREFERRED_SECS: f64 = 30.0;

/// A candidate time range before signal scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateWindow {
    /// Start time in seconds (integer-valued)
    pub start: f64,
    /// End time in seconds (integer-valued)
    pub end: f64,
}

impl CandidateWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Half-open interval overlap.
    pub fn overlaps(&self, other: &CandidateWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Leading seconds excluded from clipping.
pub fn skip_intro(duration: f64) -> f64 {
    (0.12 * duration).min(25.0)
}

/// Trailing seconds excluded from clipping.
pub fn skip_outro(duration: f64) -> f64 {
    (0.08 * duration).min(20.0)
}

/// Generate the dense, overlapping candidate set for a video.
///
/// Window centers step through the viability window
/// `[skip_intro, duration - skip_outro]`; each emits a PREFERRED-length
/// window clamped into that range. Windows shorter than MIN_CLIP after
/// clamping are discarded, integer floors of the bounds are emitted, and
/// consecutive duplicates produced by clamping collapse to one.
pub fn generate_windows(duration: f64) -> Vec<CandidateWindow> {
    let usable_start = skip_intro(duration);
    let usable_end = duration - skip_outro(duration);

    if usable_end - usable_start < MIN_CLIP_SECS {
        return Vec::new();
    }

    let half = PREFERRED_SECS / 2.0;
    let mut windows: Vec<CandidateWindow> = Vec::new();

    let mut t = usable_start;
    while t <= usable_end - MIN_CLIP_SECS + 1e-9 {
        let mut start = t - half;
        let mut end = t + half;

        if start < usable_start {
            start = usable_start;
            end = (start + PREFERRED_SECS).min(usable_end);
        }
        if end > usable_end {
            end = usable_end;
            start = (end - PREFERRED_SECS).max(usable_start);
        }

        let length = end - start;
        if length >= MIN_CLIP_SECS && length <= MAX_CLIP_SECS {
            let window = CandidateWindow {
                start: start.floor(),
                end: end.floor(),
            };
            if windows.last() != Some(&window) {
                windows.push(window);
            }
        }

        t += STEP_SECS;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_margins() {
        // Capped for long videos
        assert_eq!(skip_intro(600.0), 25.0);
        assert_eq!(skip_outro(600.0), 20.0);

        // Proportional for short videos
        assert!((skip_intro(42.0) - 5.04).abs() < 1e-9);
        assert!((skip_outro(42.0) - 3.36).abs() < 1e-9);
    }

    #[test]
    fn test_windows_respect_bounds() {
        for duration in [120.0, 300.0, 600.0, 1800.0] {
            let usable_start = skip_intro(duration).floor();
            let usable_end = duration - skip_outro(duration);

            let windows = generate_windows(duration);
            assert!(!windows.is_empty());

            for w in &windows {
                assert!(
                    w.duration() >= MIN_CLIP_SECS && w.duration() <= MAX_CLIP_SECS,
                    "window {w:?} length out of range for duration {duration}"
                );
                assert!(w.start >= usable_start, "window {w:?} starts in the intro");
                assert!(w.end <= usable_end, "window {w:?} ends in the outro");
            }
        }
    }

    #[test]
    fn test_windows_ordered_and_dense() {
        let windows = generate_windows(300.0);

        // Ordered by start, overlapping (dense)
        for pair in windows.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert!(pair[0].overlaps(&pair[1]), "adjacent windows should overlap");
        }

        // Dense coverage: one candidate roughly every STEP seconds
        assert!(windows.len() > 40, "got {} windows", windows.len());
    }

    #[test]
    fn test_too_short_video_emits_nothing() {
        // usable span below MIN_CLIP
        assert!(generate_windows(20.0).is_empty());
        assert!(generate_windows(10.0).is_empty());
        assert!(generate_windows(0.0).is_empty());
    }

    #[test]
    fn test_barely_viable_video_collapses_to_one() {
        // D = 42: usable span is ~33.6s; every center clamps to the same
        // PREFERRED-length window, so dedup leaves exactly one candidate.
        let windows = generate_windows(42.0);
        assert_eq!(windows.len(), 1);

        let w = windows[0];
        assert!(w.duration() >= MIN_CLIP_SECS);
        assert!(w.start >= skip_intro(42.0).floor());
        assert!(w.end <= 42.0 - skip_outro(42.0));
    }

    #[test]
    fn test_integer_bounds() {
        for w in generate_windows(300.0) {
            assert_eq!(w.start, w.start.floor());
            assert_eq!(w.end, w.end.floor());
        }
    }
}
