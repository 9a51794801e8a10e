//! Caption grouping and styling.
//!
//! Timed words become short display segments: 2-5 words each targeting 3,
//! broken at punctuation, at speech gaps, or forced at the cap. Styles key
//! off the text content.

use clipforge_models::{CaptionSegment, CaptionStyle, CaptionWord};

use crate::analysis::triggers;

/// Forced break at this many words.
const MAX_WORDS_PER_SEGMENT: usize = 5;

/// An inter-word gap at least this long breaks the segment.
const GAP_BREAK_SECS: f64 = 0.3;

/// Punctuation that ends a segment.
const BREAK_PUNCTUATION: [char; 5] = [',', ';', '.', '!', '?'];

/// Group timed words into caption segments and style them.
pub fn build_caption_segments(words: &[CaptionWord]) -> Vec<CaptionSegment> {
    let mut segments = group_words(words);
    apply_styles(&mut segments);
    segments
}

/// Group words into 2-5 word segments.
///
/// Breaks happen after a word carrying trailing punctuation, before a >=0.3s
/// gap to the next word, or when the segment reaches the word cap.
pub fn group_words(words: &[CaptionWord]) -> Vec<CaptionSegment> {
    let mut segments = Vec::new();
    let mut current: Vec<CaptionWord> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        current.push(word.clone());

        let ends_with_punctuation = word
            .word
            .trim_end()
            .chars()
            .last()
            .map(|c| BREAK_PUNCTUATION.contains(&c))
            .unwrap_or(false);

        let gap_follows = words
            .get(i + 1)
            .map(|next| next.start - word.end >= GAP_BREAK_SECS)
            .unwrap_or(false);

        if ends_with_punctuation || gap_follows || current.len() >= MAX_WORDS_PER_SEGMENT {
            segments.push(CaptionSegment::from_words(std::mem::take(&mut current)));
        }
    }

    if !current.is_empty() {
        segments.push(CaptionSegment::from_words(current));
    }

    segments
}

/// Apply styles and emojis to grouped segments.
///
/// The first segment matching the hook regex becomes the hook; excitement
/// words mark emphasis; exclamations and contrast conjunctions mark
/// punchlines; numbers mark emphasis.
pub fn apply_styles(segments: &mut [CaptionSegment]) {
    let mut hook_assigned = false;

    for segment in segments.iter_mut() {
        let text = segment.text.to_lowercase();

        if !hook_assigned && triggers::has_caption_hook(&segment.text) {
            segment.style = CaptionStyle::Hook;
            segment.emoji = Some("👀".to_string());
            hook_assigned = true;
        } else if is_excitement(&segment.text) {
            segment.style = CaptionStyle::Emphasis;
            segment.emoji = Some("🔥".to_string());
        } else if text.contains('!') || contains_word(&text, "but") || contains_word(&text, "however")
        {
            segment.style = CaptionStyle::Punchline;
            segment.emoji = Some("💥".to_string());
        } else if text.chars().any(|c| c.is_ascii_digit()) {
            segment.style = CaptionStyle::Emphasis;
            segment.emoji = Some("✨".to_string());
        } else {
            segment.style = CaptionStyle::Normal;
            segment.emoji = None;
        }
    }
}

fn is_excitement(text: &str) -> bool {
    triggers::find_triggers(text)
        .iter()
        .any(|m| m.class == triggers::TriggerClass::Excitement)
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(entries: &[(&str, f64, f64)]) -> Vec<CaptionWord> {
        entries.iter()
            .map(|(w, s, e)| CaptionWord::new(*w, *s, *e))
            .collect()
    }

    #[test]
    fn test_group_forced_at_five() {
        let ws = words(&[
            ("one", 0.0, 0.2),
            ("two", 0.2, 0.4),
            ("three", 0.4, 0.6),
            ("four", 0.6, 0.8),
            ("five", 0.8, 1.0),
            ("six", 1.0, 1.2),
        ]);
        let segments = group_words(&ws);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].words.len(), 5);
        assert_eq!(segments[1].words.len(), 1);
    }

    #[test]
    fn test_group_breaks_at_punctuation() {
        let ws = words(&[
            ("hello,", 0.0, 0.3),
            ("there", 0.3, 0.6),
            ("friend.", 0.6, 0.9),
            ("bye", 0.9, 1.2),
        ]);
        let segments = group_words(&ws);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "hello,");
        assert_eq!(segments[1].text, "there friend.");
        assert_eq!(segments[2].text, "bye");
    }

    #[test]
    fn test_group_breaks_at_gap() {
        let ws = words(&[
            ("before", 0.0, 0.4),
            ("pause", 0.4, 0.8),
            // 0.35s gap
            ("after", 1.15, 1.5),
        ]);
        let segments = group_words(&ws);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "before pause");
        assert_eq!(segments[1].text, "after");
    }

    #[test]
    fn test_group_small_gap_does_not_break() {
        let ws = words(&[("a", 0.0, 0.4), ("b", 0.6, 0.9)]); // 0.2s gap
        let segments = group_words(&ws);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_segment_timing_spans_words() {
        let ws = words(&[("first", 1.0, 1.4), ("last.", 1.5, 2.1)]);
        let segments = group_words(&ws);
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[0].end, 2.1);
    }

    #[test]
    fn test_first_hook_only() {
        let mut segments = vec![
            CaptionSegment::from_words(words(&[("what", 0.0, 0.3), ("happened", 0.3, 0.8)])),
            CaptionSegment::from_words(words(&[("why", 1.0, 1.3), ("though", 1.3, 1.7)])),
        ];
        apply_styles(&mut segments);

        assert_eq!(segments[0].style, CaptionStyle::Hook);
        assert_eq!(segments[0].emoji.as_deref(), Some("👀"));
        // Second interrogative is not a hook; "why" matches no other rule
        assert_ne!(segments[1].style, CaptionStyle::Hook);
    }

    #[test]
    fn test_excitement_emphasis() {
        let mut segments =
            vec![CaptionSegment::from_words(words(&[("totally", 0.0, 0.4), ("insane", 0.4, 0.9)]))];
        apply_styles(&mut segments);
        assert_eq!(segments[0].style, CaptionStyle::Emphasis);
        assert_eq!(segments[0].emoji.as_deref(), Some("🔥"));
    }

    #[test]
    fn test_excitement_first_segment_is_not_hook() {
        // An excitement-only opener stays emphasis; the hook goes to the
        // first interrogative/attention segment after it.
        let mut segments = vec![
            CaptionSegment::from_words(words(&[("totally", 0.0, 0.4), ("insane", 0.4, 0.9)])),
            CaptionSegment::from_words(words(&[("how", 1.0, 1.3), ("though", 1.3, 1.7)])),
        ];
        apply_styles(&mut segments);

        assert_eq!(segments[0].style, CaptionStyle::Emphasis);
        assert_eq!(segments[0].emoji.as_deref(), Some("🔥"));
        assert_eq!(segments[1].style, CaptionStyle::Hook);
        assert_eq!(segments[1].emoji.as_deref(), Some("👀"));
    }

    #[test]
    fn test_punchline_on_contrast() {
        let mut segments = vec![
            CaptionSegment::from_words(words(&[("but", 0.0, 0.2), ("then", 0.2, 0.5)])),
            CaptionSegment::from_words(words(&[("no", 1.0, 1.2), ("way!", 1.2, 1.6)])),
        ];
        apply_styles(&mut segments);
        assert_eq!(segments[0].style, CaptionStyle::Punchline);
        assert_eq!(segments[1].style, CaptionStyle::Punchline);
        assert_eq!(segments[1].emoji.as_deref(), Some("💥"));
    }

    #[test]
    fn test_number_emphasis() {
        let mut segments =
            vec![CaptionSegment::from_words(words(&[("top", 0.0, 0.2), ("10", 0.2, 0.5)]))];
        apply_styles(&mut segments);
        assert_eq!(segments[0].style, CaptionStyle::Emphasis);
        assert_eq!(segments[0].emoji.as_deref(), Some("✨"));
    }

    #[test]
    fn test_normal_without_markers() {
        let mut segments =
            vec![CaptionSegment::from_words(words(&[("plain", 0.0, 0.3), ("words", 0.3, 0.7)]))];
        apply_styles(&mut segments);
        assert_eq!(segments[0].style, CaptionStyle::Normal);
        assert!(segments[0].emoji.is_none());
    }

    #[test]
    fn test_empty_words_yield_no_segments() {
        assert!(build_caption_segments(&[]).is_empty());
    }
}
