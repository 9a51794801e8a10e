//! Viral-trigger lexicon.
//!
//! Weighted regex classes applied to transcribed text per window.

use regex::Regex;
use std::sync::OnceLock;

/// A class of viral-indicator patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerClass {
    Interrogative,
    Excitement,
    Controversy,
    Action,
    NumericList,
    CallToAction,
}

/// A weighted pattern in the lexicon.
pub struct TriggerPattern {
    pub class: TriggerClass,
    pub weight: f64,
    pub regex: Regex,
}

/// A single match found in a window's text.
#[derive(Debug, Clone)]
pub struct TriggerMatch {
    pub class: TriggerClass,
    pub weight: f64,
    pub text: String,
}

/// The weighted trigger lexicon.
pub fn lexicon() -> &'static [TriggerPattern] {
    static LEXICON: OnceLock<Vec<TriggerPattern>> = OnceLock::new();
    LEXICON.get_or_init(|| {
        let pattern = |class, weight, pattern: &str| TriggerPattern {
            class,
            weight,
            regex: Regex::new(pattern).expect("valid trigger pattern"),
        };

        vec![
            pattern(
                TriggerClass::Interrogative,
                0.80,
                r"(?i)\b(what|how|why|when|where)\b",
            ),
            pattern(
                TriggerClass::Excitement,
                0.90,
                r"(?i)\b(amazing|incredible|insane|crazy|wow|unbelievable)\b",
            ),
            pattern(
                TriggerClass::Controversy,
                0.85,
                r"(?i)\b(secret|truth|exposed|reveal|hidden)\b",
            ),
            pattern(
                TriggerClass::Action,
                0.70,
                r"(?i)\b(watch|look|see|check|discover)\b",
            ),
            pattern(
                TriggerClass::NumericList,
                0.80,
                r"(?i)\b\d+ (ways|tips|tricks|secrets|things|reasons)\b",
            ),
            pattern(
                TriggerClass::CallToAction,
                0.60,
                r"(?i)\b(subscribe|like|comment|share|follow)\b",
            ),
        ]
    })
}

/// Find every trigger match in a text.
pub fn find_triggers(text: &str) -> Vec<TriggerMatch> {
    let mut matches = Vec::new();

    for pattern in lexicon() {
        for m in pattern.regex.find_iter(text) {
            matches.push(TriggerMatch {
                class: pattern.class,
                weight: pattern.weight,
                text: m.as_str().to_lowercase(),
            });
        }
    }

    matches
}

/// Attention-grab openers that count as hooks but carry no lexicon weight.
fn attention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(imagine|listen|attention|wait|stop)\b").expect("valid pattern")
    })
}

/// Whether the text contains an opening-hook trigger for scoring: an
/// interrogative, an excitement word, or an attention-grab opener.
pub fn has_hook_trigger(text: &str) -> bool {
    if attention_pattern().is_match(text) {
        return true;
    }
    lexicon()
        .iter()
        .filter(|p| {
            matches!(
                p.class,
                TriggerClass::Interrogative | TriggerClass::Excitement
            )
        })
        .any(|p| p.regex.is_match(text))
}

/// Whether the text matches the interrogative/attention caption-hook rule.
///
/// Excitement words are excluded: in caption styling they mark emphasis,
/// never the hook.
pub fn has_caption_hook(text: &str) -> bool {
    if attention_pattern().is_match(text) {
        return true;
    }
    lexicon()
        .iter()
        .filter(|p| p.class == TriggerClass::Interrogative)
        .any(|p| p.regex.is_match(text))
}

/// Extract key 2-3 word phrases around trigger matches.
pub fn key_phrases(text: &str, limit: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut phrases = Vec::new();

    for (i, word) in words.iter().enumerate() {
        if phrases.len() >= limit {
            break;
        }
        let is_trigger = lexicon().iter().any(|p| p.regex.is_match(word));
        if is_trigger {
            let end = (i + 3).min(words.len());
            let phrase = words[i..end].join(" ").to_lowercase();
            if !phrases.contains(&phrase) {
                phrases.push(phrase);
            }
        }
    }

    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_weights() {
        let find_weight = |class| {
            lexicon()
                .iter()
                .find(|p| p.class == class)
                .map(|p| p.weight)
                .unwrap()
        };

        assert_eq!(find_weight(TriggerClass::Interrogative), 0.80);
        assert_eq!(find_weight(TriggerClass::Excitement), 0.90);
        assert_eq!(find_weight(TriggerClass::Controversy), 0.85);
        assert_eq!(find_weight(TriggerClass::Action), 0.70);
        assert_eq!(find_weight(TriggerClass::NumericList), 0.80);
        assert_eq!(find_weight(TriggerClass::CallToAction), 0.60);
    }

    #[test]
    fn test_find_triggers() {
        let matches = find_triggers("What an amazing secret, watch this");
        let classes: Vec<_> = matches.iter().map(|m| m.class).collect();
        assert!(classes.contains(&TriggerClass::Interrogative));
        assert!(classes.contains(&TriggerClass::Excitement));
        assert!(classes.contains(&TriggerClass::Controversy));
        assert!(classes.contains(&TriggerClass::Action));
    }

    #[test]
    fn test_numeric_list_pattern() {
        assert_eq!(find_triggers("5 ways to cook pasta").len(), 1);
        assert!(find_triggers("many ways to cook pasta").is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(!find_triggers("WHY did this happen").is_empty());
        assert!(!find_triggers("INCREDIBLE result").is_empty());
    }

    #[test]
    fn test_hook_trigger_classes_only() {
        assert!(has_hook_trigger("what is this"));
        assert!(has_hook_trigger("that was insane"));
        assert!(has_hook_trigger("imagine a world"));
        // Controversy and action words are not hooks
        assert!(!has_hook_trigger("the secret is out"));
        assert!(!has_hook_trigger("check closely"));
    }

    #[test]
    fn test_caption_hook_excludes_excitement() {
        assert!(has_caption_hook("what is this"));
        assert!(has_caption_hook("imagine a world"));
        // Excitement opens the scoring hook but not the caption hook
        assert!(has_hook_trigger("that was insane"));
        assert!(!has_caption_hook("that was insane"));
        assert!(!has_caption_hook("the secret is out"));
    }

    #[test]
    fn test_no_triggers_in_plain_text() {
        assert!(find_triggers("the weather is mild today").is_empty());
    }

    #[test]
    fn test_key_phrases() {
        let phrases = key_phrases("you will not believe this amazing new recipe", 3);
        assert_eq!(phrases, vec!["amazing new recipe"]);
    }
}
