//! Composite retention scoring.

use clipforge_models::SignalScores;

use super::signals::{audio_score, speech_score, visual_score, AudioSignal, SpeechSignal, VisualSignal};
use super::triggers;

/// Seconds at the top of a window inspected for an opening hook.
const HOOK_WINDOW_SECS: f64 = 3.0;

/// Hook bonus added to the speech component (pre-clamp).
const HOOK_SPEECH_BONUS: f64 = 0.25;

/// Hook bonus applies only in the first part of the video.
const HOOK_MAX_POSITION: f64 = 0.3;

/// Window placement within the source video.
#[derive(Debug, Clone, Copy)]
pub struct WindowMeta {
    /// Window start in seconds
    pub start: f64,
    /// Window length in seconds
    pub duration: f64,
    /// Full video duration in seconds
    pub video_duration: f64,
}

impl WindowMeta {
    /// Relative position of the window start, in [0, 1].
    pub fn position(&self) -> f64 {
        if self.video_duration <= 0.0 {
            return 0.0;
        }
        (self.start / self.video_duration).clamp(0.0, 1.0)
    }
}

/// The scored outcome for one candidate window.
#[derive(Debug, Clone)]
pub struct RetentionAnalysis {
    /// Composite retention score in [0, 1]
    pub composite: f64,
    /// Confidence in the score, in [0.5, 1]
    pub confidence: f64,
    /// Individual signal scores
    pub signals: SignalScores,
    /// Human-readable selection reason
    pub reason: String,
    /// Whether the opening-hook bonus applied
    pub hook: bool,
}

/// Score one candidate window from its typed signal records.
///
/// This is the single entry point for the whole composition: component
/// scores, hook bonus, position and duration adjustments, confidence, and
/// the reason string.
pub fn score(
    audio: &AudioSignal,
    visual: &VisualSignal,
    speech: &SpeechSignal,
    meta: &WindowMeta,
) -> RetentionAnalysis {
    let audio_component = audio_score(audio, meta.duration);
    let visual_component = visual_score(visual);
    let mut speech_component = speech_score(speech);

    // Opening hook: a hook trigger spoken, or a loud burst, inside the first
    // 3 seconds, for windows in the first 30% of the video.
    let opening_text = speech.text_before(HOOK_WINDOW_SECS);
    let hook = meta.position() < HOOK_MAX_POSITION
        && (triggers::has_hook_trigger(&opening_text)
            || audio.loud_moment_before(HOOK_WINDOW_SECS));

    if hook {
        speech_component = (speech_component + HOOK_SPEECH_BONUS).min(1.0);
    }

    let mut composite =
        0.40 * audio_component + 0.35 * speech_component + 0.25 * visual_component;

    // Position adjustment: mid-video windows hold viewers better.
    let position = meta.position();
    if (0.3..=0.7).contains(&position) {
        composite *= 1.05;
    } else if position < 0.15 || position > 0.85 {
        composite *= 0.95;
    }

    // Duration adjustment: the 30-45s band performs best.
    if (30.0..=45.0).contains(&meta.duration) {
        composite *= 1.03;
    } else if meta.duration < 15.0 || meta.duration > 60.0 {
        composite *= 0.95;
    }

    let composite = composite.clamp(0.0, 1.0);
    let confidence = confidence(audio, visual, speech);

    let signals = SignalScores {
        audio: audio_component,
        visual: visual_component,
        speech: speech_component,
        engagement: composite,
    }
    .clamped();

    let reason = build_reason(composite, audio_component, visual_component, speech_component, hook);

    RetentionAnalysis {
        composite,
        confidence,
        signals,
        reason,
        hook,
    }
}

/// Confidence in the composite, from available evidence.
fn confidence(audio: &AudioSignal, visual: &VisualSignal, speech: &SpeechSignal) -> f64 {
    let mut confidence: f64 = 0.5;

    if !audio.loud_moments.is_empty() {
        confidence += 0.15;
    }
    if !audio.fallback {
        // Silence data was measured, even if empty
        confidence += 0.1;
    }
    if !visual.scene_changes.is_empty() {
        confidence += 0.15;
    }
    if speech.word_count() > 0 {
        confidence += 0.2;
    }
    if !speech.triggers.is_empty() {
        confidence += 0.1;
    }

    confidence.min(1.0)
}

/// Map the composite band and dominant factor to a reason phrase.
fn build_reason(composite: f64, audio: f64, visual: f64, speech: f64, hook: bool) -> String {
    let factor = if audio >= visual && audio >= speech {
        "audio energy"
    } else if visual >= audio && visual >= speech {
        "visual pacing"
    } else {
        "speech content"
    };

    let base = if composite >= 0.95 {
        format!("Exceptional {factor} keeps viewers locked in")
    } else if composite >= 0.9 {
        format!("Outstanding {factor} with broad appeal")
    } else if composite >= 0.85 {
        format!("Very strong {factor} throughout the clip")
    } else if composite >= 0.8 {
        format!("Strong {factor} drives retention")
    } else if composite >= 0.75 {
        format!("Solid {factor} with good retention potential")
    } else if composite >= 0.7 {
        format!("Good {factor} for steady engagement")
    } else {
        format!("Moderate engagement led by {factor}")
    };

    if hook {
        format!("{base} - strong opening hook detected!")
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::CaptionWord;

    fn meta(start: f64, duration: f64, video: f64) -> WindowMeta {
        WindowMeta {
            start,
            duration,
            video_duration: video,
        }
    }

    fn neutral_analysis(meta: &WindowMeta) -> RetentionAnalysis {
        score(
            &AudioSignal::neutral(),
            &VisualSignal::neutral(),
            &SpeechSignal::neutral(),
            meta,
        )
    }

    #[test]
    fn test_composite_always_in_bounds() {
        let hot_audio = AudioSignal {
            mean_volume: 0.0,
            max_volume: 0.0,
            silences: Vec::new(),
            loud_moments: vec![0.5, 1.0, 2.0, 5.0, 9.0],
            fallback: false,
        };
        let busy_visual = VisualSignal::from_boundaries((0..20).map(|i| i as f64).collect(), 30.0);
        let dense_speech = SpeechSignal::from_words(
            (0..120)
                .map(|i| CaptionWord::new("amazing", i as f64 * 0.25, i as f64 * 0.25 + 0.2))
                .collect(),
            30.0,
        );

        for (start, duration, video) in
            [(0.0, 30.0, 100.0), (150.0, 40.0, 300.0), (280.0, 15.0, 300.0)]
        {
            let analysis = score(
                &hot_audio,
                &busy_visual,
                &dense_speech,
                &meta(start, duration, video),
            );
            assert!((0.0..=1.0).contains(&analysis.composite));
            assert!((0.0..=1.0).contains(&analysis.confidence));
        }
    }

    #[test]
    fn test_neutral_fallback_mid_video_band() {
        // All-fallback signals: audio 0.328, speech 0.5, visual 0, then the
        // mid-video and duration multipliers. The band is tight because every
        // input is fixed.
        let analysis = neutral_analysis(&meta(150.0, 30.0, 300.0));
        assert!(
            analysis.composite > 0.30 && analysis.composite < 0.36,
            "composite {} outside the expected neutral band",
            analysis.composite
        );
    }

    #[test]
    fn test_position_bonus_mid_video() {
        let mid = neutral_analysis(&meta(150.0, 30.0, 300.0));
        let edge = neutral_analysis(&meta(270.0, 30.0, 300.0));
        assert!(mid.composite > edge.composite);
    }

    #[test]
    fn test_hook_bonus_applies_early_with_trigger() {
        let speech = SpeechSignal::from_words(
            vec![
                CaptionWord::new("imagine", 2.0, 2.5),
                CaptionWord::new("this", 2.6, 3.0),
            ],
            30.0,
        );
        let early = score(
            &AudioSignal::neutral(),
            &VisualSignal::neutral(),
            &speech,
            &meta(0.0, 30.0, 600.0),
        );
        assert!(early.hook);
        assert!(early.reason.ends_with("strong opening hook detected!"));

        // Same speech but the hook word arrives after the 3-second window
        let late_word = SpeechSignal::from_words(
            vec![CaptionWord::new("imagine", 5.0, 5.5)],
            30.0,
        );
        let no_hook = score(
            &AudioSignal::neutral(),
            &VisualSignal::neutral(),
            &late_word,
            &meta(0.0, 30.0, 600.0),
        );
        assert!(!no_hook.hook);
        assert!(early.composite > no_hook.composite);
    }

    #[test]
    fn test_hook_requires_early_position() {
        let speech = SpeechSignal::from_words(
            vec![CaptionWord::new("imagine", 1.0, 1.5)],
            30.0,
        );
        // Window starts at 60% of the video
        let analysis = score(
            &AudioSignal::neutral(),
            &VisualSignal::neutral(),
            &speech,
            &meta(360.0, 30.0, 600.0),
        );
        assert!(!analysis.hook);
    }

    #[test]
    fn test_hook_from_loud_moment() {
        let audio = AudioSignal {
            mean_volume: -24.0,
            max_volume: -12.0,
            silences: Vec::new(),
            loud_moments: vec![1.5],
            fallback: false,
        };
        let analysis = score(
            &audio,
            &VisualSignal::neutral(),
            &SpeechSignal::neutral(),
            &meta(30.0, 30.0, 600.0),
        );
        assert!(analysis.hook);
    }

    #[test]
    fn test_duration_band_bonus() {
        let in_band = neutral_analysis(&meta(150.0, 35.0, 300.0));
        let out_of_band = neutral_analysis(&meta(150.0, 20.0, 300.0));
        assert!(in_band.composite > out_of_band.composite);
    }

    #[test]
    fn test_confidence_accumulates() {
        let bare = neutral_analysis(&meta(150.0, 30.0, 300.0));
        assert_eq!(bare.confidence, 0.5);

        let audio = AudioSignal {
            mean_volume: -20.0,
            max_volume: -5.0,
            silences: vec![(1.0, 2.5)],
            loud_moments: vec![4.0],
            fallback: false,
        };
        let visual = VisualSignal::from_boundaries(vec![5.0, 15.0], 30.0);
        let speech = SpeechSignal::from_words(
            vec![
                CaptionWord::new("what", 0.0, 0.3),
                CaptionWord::new("happened", 0.3, 0.9),
            ],
            30.0,
        );
        let full = score(&audio, &visual, &speech, &meta(150.0, 30.0, 300.0));
        // 0.5 + 0.15 + 0.1 + 0.15 + 0.2 + 0.1 = 1.2, capped
        assert_eq!(full.confidence, 1.0);
    }

    #[test]
    fn test_reason_band_thresholds() {
        assert!(build_reason(0.96, 0.9, 0.2, 0.2, false).starts_with("Exceptional"));
        assert!(build_reason(0.92, 0.9, 0.2, 0.2, false).starts_with("Outstanding"));
        assert!(build_reason(0.86, 0.9, 0.2, 0.2, false).starts_with("Very strong"));
        assert!(build_reason(0.82, 0.9, 0.2, 0.2, false).starts_with("Strong"));
        assert!(build_reason(0.76, 0.9, 0.2, 0.2, false).starts_with("Solid"));
        assert!(build_reason(0.72, 0.9, 0.2, 0.2, false).starts_with("Good"));
        assert!(build_reason(0.5, 0.9, 0.2, 0.2, false).starts_with("Moderate"));
    }

    #[test]
    fn test_reason_dominant_factor() {
        assert!(build_reason(0.8, 0.9, 0.2, 0.3, false).contains("audio energy"));
        assert!(build_reason(0.8, 0.2, 0.9, 0.3, false).contains("visual pacing"));
        assert!(build_reason(0.8, 0.2, 0.3, 0.9, false).contains("speech content"));
    }

    #[test]
    fn test_determinism() {
        let speech = SpeechSignal::from_words(
            vec![CaptionWord::new("what", 0.5, 0.8)],
            30.0,
        );
        let m = meta(50.0, 30.0, 300.0);
        let a = score(&AudioSignal::neutral(), &VisualSignal::neutral(), &speech, &m);
        let b = score(&AudioSignal::neutral(), &VisualSignal::neutral(), &speech, &m);
        assert_eq!(a.composite, b.composite);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.reason, b.reason);
    }
}
