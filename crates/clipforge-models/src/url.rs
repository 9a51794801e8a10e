//! Source-URL parsing.
//!
//! Extracts the platform-level video identifier from a public video URL.
//! Patterns are tried in order; the first match wins.

use regex::Regex;
use std::sync::OnceLock;

/// Errors that can occur during external-ID extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// No known pattern matched the URL
    UnrecognizedUrl,
    /// A pattern matched but captured an empty identifier
    EmptyId,
}

impl std::fmt::Display for UrlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlError::UnrecognizedUrl => write!(f, "URL does not match any supported pattern"),
            UrlError::EmptyId => write!(f, "URL matched but contains no video identifier"),
        }
    }
}

impl std::error::Error for UrlError {}

/// Result type for URL extraction.
pub type UrlResult<T> = Result<T, UrlError>;

fn patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"youtube\.com/watch\?.*?v=([^&\n?#]+)",
            r"youtu\.be/([^&\n?#]+)",
            r"youtube\.com/embed/([^&\n?#]+)",
            r"youtube\.com/v/([^&\n?#]+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid URL pattern"))
        .collect()
    })
}

/// Extract the platform video ID from a source URL.
///
/// Supported formats, tried in order:
/// - `youtube.com/watch?v=ID`
/// - `youtu.be/ID`
/// - `youtube.com/embed/ID`
/// - `youtube.com/v/ID`
pub fn extract_external_id(url: &str) -> UrlResult<String> {
    let url = url.trim();

    for pattern in patterns() {
        if let Some(caps) = pattern.captures(url) {
            let id = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if id.is_empty() {
                return Err(UrlError::EmptyId);
            }
            return Ok(id.to_string());
        }
    }

    Err(UrlError::UnrecognizedUrl)
}
