//! Typed per-window signal records and their engagement scorers.
//!
//! The scorers are pure functions so the whole scoring path is testable
//! without media files. Every failed signal source substitutes a neutral
//! fallback record and scoring continues.

use clipforge_models::CaptionWord;

use super::triggers::{self, TriggerMatch};

/// Ideal scene-change rate in changes per minute.
const IDEAL_SCENE_RATE: f64 = 8.0;

/// Ideal speech density in words per second.
const IDEAL_SPEECH_DENSITY: f64 = 3.0;

/// Audio signal for one candidate window.
#[derive(Debug, Clone)]
pub struct AudioSignal {
    /// Mean volume in dB
    pub mean_volume: f64,
    /// Max volume in dB
    pub max_volume: f64,
    /// Silence intervals (start, end), window-relative seconds
    pub silences: Vec<(f64, f64)>,
    /// Loud-burst start times, window-relative seconds
    pub loud_moments: Vec<f64>,
    /// True when this is the neutral substitute for a failed probe
    pub fallback: bool,
}

impl AudioSignal {
    /// Neutral fallback: energy score lands at 0.52, no loud moments,
    /// no silence data.
    pub fn neutral() -> Self {
        Self {
            mean_volume: -24.0,
            max_volume: -12.0,
            silences: Vec::new(),
            loud_moments: Vec::new(),
            fallback: true,
        }
    }

    pub fn dynamic_range(&self) -> f64 {
        (self.max_volume - self.mean_volume).max(0.0)
    }

    pub fn total_silence(&self) -> f64 {
        self.silences.iter().map(|(s, e)| e - s).sum()
    }

    /// Whether a loud burst starts in the first `secs` of the window.
    pub fn loud_moment_before(&self, secs: f64) -> bool {
        self.loud_moments.iter().any(|&t| t < secs)
    }
}

/// Visual signal for one candidate window.
#[derive(Debug, Clone)]
pub struct VisualSignal {
    /// Scene boundaries, absolute seconds in the source
    pub scene_changes: Vec<f64>,
    /// Scene changes per minute over the window
    pub changes_per_minute: f64,
    /// True when this is the neutral substitute for a failed detector
    pub fallback: bool,
}

impl VisualSignal {
    /// Neutral fallback: no scene changes.
    pub fn neutral() -> Self {
        Self {
            scene_changes: Vec::new(),
            changes_per_minute: 0.0,
            fallback: true,
        }
    }

    pub fn from_boundaries(scene_changes: Vec<f64>, window_duration: f64) -> Self {
        let changes_per_minute = if window_duration > 0.0 {
            scene_changes.len() as f64 * 60.0 / window_duration
        } else {
            0.0
        };
        Self {
            scene_changes,
            changes_per_minute,
            fallback: false,
        }
    }
}

/// Speech signal for one candidate window.
#[derive(Debug, Clone)]
pub struct SpeechSignal {
    /// Transcribed words, window-relative times
    pub words: Vec<CaptionWord>,
    /// Joined transcript text
    pub text: String,
    /// Words per second over the window
    pub density: f64,
    /// Trigger matches in the text
    pub triggers: Vec<TriggerMatch>,
    /// Key 2-3 word phrases
    pub key_phrases: Vec<String>,
    /// True when this is the neutral substitute for a failed transcription
    pub fallback: bool,
}

impl SpeechSignal {
    /// Neutral fallback: density 0; the speech scorer pins it at 0.5.
    pub fn neutral() -> Self {
        Self {
            words: Vec::new(),
            text: String::new(),
            density: 0.0,
            triggers: Vec::new(),
            key_phrases: Vec::new(),
            fallback: true,
        }
    }

    pub fn from_words(words: Vec<CaptionWord>, window_duration: f64) -> Self {
        let text = words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let density = if window_duration > 0.0 {
            words.len() as f64 / window_duration
        } else {
            0.0
        };
        let triggers = triggers::find_triggers(&text);
        let key_phrases = triggers::key_phrases(&text, 5);

        Self {
            words,
            text,
            density,
            triggers,
            key_phrases,
            fallback: false,
        }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Joined text of the words spoken in the first `secs` of the window.
    pub fn text_before(&self, secs: f64) -> String {
        self.words
            .iter()
            .filter(|w| w.start < secs)
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Map a dB value into [0, 1] over the given range.
pub fn normalize_db(value: f64, floor: f64, ceil: f64) -> f64 {
    if ceil <= floor {
        return 0.0;
    }
    ((value - floor) / (ceil - floor)).clamp(0.0, 1.0)
}

/// Energy score: `0.6 * normalize(mean, -60..0) + 0.4 * clamp(range/30)`.
pub fn energy_score(audio: &AudioSignal) -> f64 {
    let level = normalize_db(audio.mean_volume, -60.0, 0.0);
    let range = (audio.dynamic_range() / 30.0).clamp(0.0, 1.0);
    0.6 * level + 0.4 * range
}

/// Audio engagement: energy (0.4), dynamic range (0.3), loud-moment density
/// bonus (0.2), minus silence penalty (0.1).
pub fn audio_score(audio: &AudioSignal, window_duration: f64) -> f64 {
    let energy = energy_score(audio);
    let range = (audio.dynamic_range() / 30.0).clamp(0.0, 1.0);

    // Saturates at one loud burst per 10 seconds
    let loud_density = if window_duration > 0.0 {
        (audio.loud_moments.len() as f64 / (window_duration / 10.0)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let silence_penalty = if window_duration > 0.0 {
        (audio.total_silence() / window_duration).clamp(0.0, 1.0)
    } else {
        0.0
    };

    (0.4 * energy + 0.3 * range + 0.2 * loud_density - 0.1 * silence_penalty).clamp(0.0, 1.0)
}

/// Visual engagement: `0.6 * rate score (ideal 8/min) + 0.4 * variety`.
pub fn visual_score(visual: &VisualSignal) -> f64 {
    let rate_score =
        (1.0 - (visual.changes_per_minute - IDEAL_SCENE_RATE).abs() / IDEAL_SCENE_RATE)
            .clamp(0.0, 1.0);
    let variety = if visual.scene_changes.len() >= 2 {
        1.0
    } else {
        0.0
    };
    (0.6 * rate_score + 0.4 * variety).clamp(0.0, 1.0)
}

/// Speech engagement: density closeness to 3 w/s (0.4), trigger count over 3
/// (0.4), content-present flag (0.2). The neutral fallback scores 0.5.
pub fn speech_score(speech: &SpeechSignal) -> f64 {
    if speech.fallback {
        return 0.5;
    }

    let density_score =
        (1.0 - (speech.density - IDEAL_SPEECH_DENSITY).abs() / IDEAL_SPEECH_DENSITY)
            .clamp(0.0, 1.0);
    let trigger_score = (speech.triggers.len() as f64 / 3.0).clamp(0.0, 1.0);
    let content = if speech.word_count() > 0 { 1.0 } else { 0.0 };

    (0.4 * density_score + 0.4 * trigger_score + 0.2 * content).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_audio_energy_is_052() {
        let energy = energy_score(&AudioSignal::neutral());
        assert!((energy - 0.52).abs() < 1e-9, "got {energy}");
    }

    #[test]
    fn test_normalize_db() {
        assert_eq!(normalize_db(-60.0, -60.0, 0.0), 0.0);
        assert_eq!(normalize_db(0.0, -60.0, 0.0), 1.0);
        assert_eq!(normalize_db(-30.0, -60.0, 0.0), 0.5);
        // Clamped outside the range
        assert_eq!(normalize_db(-80.0, -60.0, 0.0), 0.0);
        assert_eq!(normalize_db(5.0, -60.0, 0.0), 1.0);
    }

    #[test]
    fn test_audio_score_bounds() {
        let loud = AudioSignal {
            mean_volume: -5.0,
            max_volume: 0.0,
            silences: Vec::new(),
            loud_moments: vec![1.0, 5.0, 12.0, 20.0],
            fallback: false,
        };
        let score = audio_score(&loud, 30.0);
        assert!((0.0..=1.0).contains(&score));

        let silent = AudioSignal {
            mean_volume: -60.0,
            max_volume: -60.0,
            silences: vec![(0.0, 30.0)],
            loud_moments: Vec::new(),
            fallback: false,
        };
        let score = audio_score(&silent, 30.0);
        assert!((0.0..=1.0).contains(&score));
        assert!(score < 0.1);
    }

    #[test]
    fn test_silence_penalty_lowers_score() {
        let base = AudioSignal {
            mean_volume: -20.0,
            max_volume: -5.0,
            silences: Vec::new(),
            loud_moments: Vec::new(),
            fallback: false,
        };
        let mut silent = base.clone();
        silent.silences = vec![(0.0, 15.0)];

        assert!(audio_score(&silent, 30.0) < audio_score(&base, 30.0));
    }

    #[test]
    fn test_visual_score_ideal_rate() {
        // 4 changes in 30s = 8/min, with variety
        let ideal = VisualSignal::from_boundaries(vec![5.0, 12.0, 20.0, 27.0], 30.0);
        assert!((ideal.changes_per_minute - 8.0).abs() < 1e-9);
        assert_eq!(visual_score(&ideal), 1.0);

        // No changes at all
        assert_eq!(visual_score(&VisualSignal::neutral()), 0.0);
    }

    #[test]
    fn test_visual_variety_requires_two_changes() {
        let one = VisualSignal::from_boundaries(vec![10.0], 30.0);
        let two = VisualSignal::from_boundaries(vec![10.0, 20.0], 30.0);
        assert!(visual_score(&two) > visual_score(&one));
    }

    #[test]
    fn test_speech_fallback_is_half() {
        assert_eq!(speech_score(&SpeechSignal::neutral()), 0.5);
    }

    #[test]
    fn test_speech_score_components() {
        // 90 words over 30s = 3 w/s (ideal), no triggers
        let words: Vec<CaptionWord> = (0..90)
            .map(|i| CaptionWord::new("word", i as f64 / 3.0, (i as f64 + 1.0) / 3.0))
            .collect();
        let speech = SpeechSignal::from_words(words, 30.0);
        let score = speech_score(&speech);
        // density 0.4 + triggers 0.0 + content 0.2
        assert!((score - 0.6).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_speech_triggers_raise_score() {
        let plain = SpeechSignal::from_words(
            vec![CaptionWord::new("hello", 0.0, 0.4)],
            30.0,
        );
        let triggered = SpeechSignal::from_words(
            vec![
                CaptionWord::new("what", 0.0, 0.3),
                CaptionWord::new("amazing", 0.3, 0.8),
                CaptionWord::new("secret", 0.8, 1.2),
            ],
            30.0,
        );
        assert!(speech_score(&triggered) > speech_score(&plain));
    }

    #[test]
    fn test_text_before() {
        let speech = SpeechSignal::from_words(
            vec![
                CaptionWord::new("imagine", 2.0, 2.5),
                CaptionWord::new("this", 3.5, 3.9),
            ],
            30.0,
        );
        assert_eq!(speech.text_before(3.0), "imagine");
        assert_eq!(speech.text_before(10.0), "imagine this");
    }
}
