//! Ranking, non-overlapping selection, and boundary snapping.

use clipforge_models::CaptionWord;

use super::scoring::RetentionAnalysis;
use super::windows::{CandidateWindow, MIN_CLIP_SECS};

/// Snap range for scene boundaries, in seconds.
const SNAP_RANGE_SECS: f64 = 3.0;

/// Hook buffer subtracted from the snapped start.
const HOOK_BUFFER_SECS: f64 = 0.5;

/// A word ending this close after the end extends the clip.
const WORD_EXTEND_RANGE_SECS: f64 = 2.0;

/// Padding added after the extending word.
const WORD_EXTEND_PAD_SECS: f64 = 0.3;

/// A fully analyzed candidate, carrying what snapping needs.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub window: CandidateWindow,
    pub analysis: RetentionAnalysis,
    /// Scene boundaries near this window, absolute seconds
    pub scene_changes: Vec<f64>,
    /// Transcribed words, window-relative seconds
    pub words: Vec<CaptionWord>,
}

/// Rank candidates and pick a non-overlapping top N.
///
/// Sort is (composite desc, confidence desc); the greedy pass takes the next
/// candidate whose half-open interval intersects none already selected.
pub fn select_top(mut candidates: Vec<ScoredCandidate>, top_n: usize) -> Vec<ScoredCandidate> {
    candidates.sort_by(|a, b| {
        b.analysis
            .composite
            .partial_cmp(&a.analysis.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.analysis
                    .confidence
                    .partial_cmp(&a.analysis.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let mut selected: Vec<ScoredCandidate> = Vec::new();

    for candidate in candidates {
        if selected.len() >= top_n {
            break;
        }
        if selected
            .iter()
            .all(|s| !s.window.overlaps(&candidate.window))
        {
            selected.push(candidate);
        }
    }

    selected
}

/// Snap a selected candidate's boundaries.
///
/// - start and end each snap to the nearest scene boundary within 3 s
/// - a 0.5 s hook buffer is subtracted from the start (clamped to 0)
/// - a word ending within 2 s after the end extends it past the word
/// - the final length is at least `MIN_CLIP_SECS`
/// - both bounds are floored to one decimal
pub fn snap_boundaries(candidate: &ScoredCandidate, video_duration: f64) -> (f64, f64) {
    let window = &candidate.window;

    let mut start = snap_to_boundary(window.start, &candidate.scene_changes);
    let mut end = snap_to_boundary(window.end, &candidate.scene_changes);

    start = (start - HOOK_BUFFER_SECS).max(0.0);

    // Extend past a word that would otherwise be cut mid-sentence.
    let extend_to = candidate
        .words
        .iter()
        .map(|w| window.start + w.end)
        .filter(|&word_end| word_end > end && word_end - end <= WORD_EXTEND_RANGE_SECS)
        .fold(None::<f64>, |acc, word_end| {
            Some(acc.map_or(word_end, |best| best.max(word_end)))
        });
    if let Some(word_end) = extend_to {
        end = word_end + WORD_EXTEND_PAD_SECS;
    }

    end = end.min(video_duration);

    if end - start < MIN_CLIP_SECS {
        end = (start + MIN_CLIP_SECS).min(video_duration);
        if end - start < MIN_CLIP_SECS {
            start = (end - MIN_CLIP_SECS).max(0.0);
        }
    }

    (floor_decimal(start), floor_decimal(end))
}

/// Snap a time to the nearest scene boundary within range, or leave it.
fn snap_to_boundary(time: f64, boundaries: &[f64]) -> f64 {
    boundaries
        .iter()
        .copied()
        .filter(|b| (b - time).abs() <= SNAP_RANGE_SECS)
        .min_by(|a, b| {
            (a - time)
                .abs()
                .partial_cmp(&(b - time).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(time)
}

/// Floor to one decimal place.
fn floor_decimal(value: f64) -> f64 {
    (value * 10.0).floor() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::SignalScores;

    fn candidate(start: f64, end: f64, composite: f64, confidence: f64) -> ScoredCandidate {
        ScoredCandidate {
            window: CandidateWindow { start, end },
            analysis: RetentionAnalysis {
                composite,
                confidence,
                signals: SignalScores::default(),
                reason: String::new(),
                hook: false,
            },
            scene_changes: Vec::new(),
            words: Vec::new(),
        }
    }

    #[test]
    fn test_select_orders_by_composite_then_confidence() {
        let selected = select_top(
            vec![
                candidate(0.0, 30.0, 0.6, 0.9),
                candidate(100.0, 130.0, 0.8, 0.5),
                candidate(200.0, 230.0, 0.8, 0.9),
            ],
            3,
        );
        assert_eq!(selected[0].window.start, 200.0);
        assert_eq!(selected[1].window.start, 100.0);
        assert_eq!(selected[2].window.start, 0.0);
    }

    #[test]
    fn test_select_skips_overlapping() {
        let selected = select_top(
            vec![
                candidate(0.0, 30.0, 0.9, 0.9),
                candidate(15.0, 45.0, 0.85, 0.9), // overlaps the winner
                candidate(40.0, 70.0, 0.8, 0.9),
            ],
            3,
        );
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].window.start, 0.0);
        assert_eq!(selected[1].window.start, 40.0);
    }

    #[test]
    fn test_selected_pairwise_non_overlapping() {
        let candidates: Vec<ScoredCandidate> = (0..40)
            .map(|i| {
                let start = i as f64 * 5.0;
                candidate(start, start + 30.0, 0.5 + (i % 10) as f64 / 25.0, 0.7)
            })
            .collect();

        let selected = select_top(candidates, 8);
        assert!(selected.len() <= 8);
        for (i, a) in selected.iter().enumerate() {
            for b in selected.iter().skip(i + 1) {
                assert!(!a.window.overlaps(&b.window));
            }
        }
    }

    #[test]
    fn test_touching_windows_are_selectable() {
        // Half-open intervals: [0,30) and [30,60) do not overlap
        let selected = select_top(
            vec![candidate(0.0, 30.0, 0.9, 0.9), candidate(30.0, 60.0, 0.8, 0.9)],
            8,
        );
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_snap_to_nearby_scene_boundary() {
        let mut c = candidate(30.0, 60.0, 0.8, 0.9);
        c.scene_changes = vec![28.5, 61.0];

        let (start, end) = snap_boundaries(&c, 300.0);
        // start snaps to 28.5, then the 0.5s hook buffer
        assert!((start - 28.0).abs() < 1e-9);
        assert!((end - 61.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_snap_outside_range(){
        let mut c = candidate(30.0, 60.0, 0.8, 0.9);
        c.scene_changes = vec![25.0, 65.0]; // both beyond 3s

        let (start, end) = snap_boundaries(&c, 300.0);
        assert!((start - 29.5).abs() < 1e-9); // hook buffer only
        assert!((end - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_extension_boundary() {
        // Word ends 1.9s after the window end: extended
        let mut c = candidate(30.0, 60.0, 0.8, 0.9);
        c.words = vec![CaptionWord::new("sentence", 31.0, 31.9)];
        let (_, end) = snap_boundaries(&c, 300.0);
        assert!((end - 62.2).abs() < 1e-9, "got {end}"); // 61.9 + 0.3

        // Word ends 2.1s after: not extended
        let mut c = candidate(30.0, 60.0, 0.8, 0.9);
        c.words = vec![CaptionWord::new("sentence", 31.5, 32.1)];
        let (_, end) = snap_boundaries(&c, 300.0);
        assert!((end - 60.0).abs() < 1e-9, "got {end}");
    }

    #[test]
    fn test_hook_buffer_clamped_to_zero() {
        let c = candidate(0.0, 30.0, 0.8, 0.9);
        let (start, _) = snap_boundaries(&c, 300.0);
        assert_eq!(start, 0.0);
    }

    #[test]
    fn test_minimum_length_enforced() {
        // Snapping pulls the end early enough to shrink below 15s
        let mut c = candidate(30.0, 46.0, 0.8, 0.9);
        c.scene_changes = vec![32.9, 43.1];
        let (start, end) = snap_boundaries(&c, 300.0);
        assert!(end - start >= MIN_CLIP_SECS - 0.1, "{start}..{end}");
    }

    #[test]
    fn test_one_decimal_floor() {
        let mut c = candidate(30.0, 60.0, 0.8, 0.9);
        c.scene_changes = vec![29.87, 60.44];
        let (start, end) = snap_boundaries(&c, 300.0);
        // 29.87 - 0.5 = 29.37 -> 29.3; 60.44 -> 60.4
        assert!((start - 29.3).abs() < 1e-9);
        assert!((end - 60.4).abs() < 1e-9);
    }
}
