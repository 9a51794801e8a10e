//! Caption models: timed words grouped into styled segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single transcribed word with timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionWord {
    /// The word text
    pub word: String,
    /// Start time in seconds, relative to the clip
    pub start: f64,
    /// End time in seconds, relative to the clip
    pub end: f64,
}

impl CaptionWord {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }
}

/// Visual style applied to a caption segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStyle {
    /// Plain white text
    #[default]
    Normal,
    /// Highlighted keyword
    Emphasis,
    /// Opening attention-grab
    Hook,
    /// Punchline / reversal
    Punchline,
}

impl CaptionStyle {
    /// Named style as it appears in the ASS style table.
    pub fn ass_style_name(&self) -> &'static str {
        match self {
            CaptionStyle::Normal => "Normal",
            CaptionStyle::Emphasis => "Emphasis",
            CaptionStyle::Hook => "Hook",
            CaptionStyle::Punchline => "Punchline",
        }
    }
}

impl fmt::Display for CaptionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ass_style_name())
    }
}

/// A short group of words displayed together, with a style and optional emoji.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSegment {
    /// Display text (words joined by spaces)
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// The words making up this segment
    pub words: Vec<CaptionWord>,
    /// Visual style
    #[serde(default)]
    pub style: CaptionStyle,
    /// Optional emoji appended to the rendered text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl CaptionSegment {
    /// Build a segment from a run of words.
    pub fn from_words(words: Vec<CaptionWord>) -> Self {
        let text = words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let start = words.first().map(|w| w.start).unwrap_or(0.0);
        let end = words.last().map(|w| w.end).unwrap_or(start);
        Self {
            text,
            start,
            end,
            words,
            style: CaptionStyle::Normal,
            emoji: None,
        }
    }

    /// Rendered text including the emoji suffix.
    pub fn display_text(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!("{} {}", self.text, emoji),
            None => self.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_words_joins_and_spans() {
        let seg = CaptionSegment::from_words(vec![
            CaptionWord::new("hello", 0.5, 0.9),
            CaptionWord::new("world", 1.0, 1.4),
        ]);
        assert_eq!(seg.text, "hello world");
        assert_eq!(seg.start, 0.5);
        assert_eq!(seg.end, 1.4);
        assert_eq!(seg.style, CaptionStyle::Normal);
    }

    #[test]
    fn test_display_text_with_emoji() {
        let mut seg = CaptionSegment::from_words(vec![CaptionWord::new("wow", 0.0, 0.3)]);
        seg.emoji = Some("🔥".to_string());
        assert_eq!(seg.display_text(), "wow 🔥");
    }

    #[test]
    fn test_serde_roundtrip() {
        let seg = CaptionSegment::from_words(vec![CaptionWord::new("test", 1.2, 1.8)]);
        let json = serde_json::to_string(&seg).unwrap();
        let decoded: CaptionSegment = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, seg);
    }
}
