//! Transcription endpoint client.
//!
//! Submits an audio file as a multipart form and expects a verbose JSON
//! response with word-level timestamps. A text-only response is tolerated:
//! words are distributed evenly across the window.

use std::path::Path;

use reqwest::multipart;
use serde::Deserialize;
use tracing::{debug, info, warn};

use clipforge_models::CaptionWord;

use crate::error::{WorkerError, WorkerResult};

/// Default transcription model.
const DEFAULT_MODEL: &str = "whisper-1";

/// Request timeout (seconds).
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Transcription client configuration.
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// Endpoint URL
    pub api_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model name sent in the form
    pub model: String,
}

/// Transcription endpoint client.
pub struct Transcriber {
    client: reqwest::Client,
    config: TranscriberConfig,
}

/// Wire response from the endpoint.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[allow(dead_code)]
    duration: Option<f64>,
    words: Option<Vec<TranscribedWord>>,
}

#[derive(Debug, Deserialize)]
struct TranscribedWord {
    word: String,
    start: f64,
    end: f64,
    #[allow(dead_code)]
    confidence: Option<f64>,
}

impl Transcriber {
    /// Create a client when the endpoint is configured, else None.
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var("TRANSCRIBE_API_URL").ok()?;
        let api_key = std::env::var("TRANSCRIBE_API_KEY").ok()?;
        let model = std::env::var("TRANSCRIBE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .ok()?;

        Some(Self {
            client,
            config: TranscriberConfig {
                api_url,
                api_key,
                model,
            },
        })
    }

    /// Transcribe an audio file, returning timed words.
    ///
    /// `window_duration` is the length of the submitted audio; it anchors the
    /// even distribution fallback when the endpoint omits word timestamps.
    pub async fn transcribe_file(
        &self,
        audio_path: &Path,
        window_duration: f64,
    ) -> WorkerResult<Vec<CaptionWord>> {
        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("audio/mpeg")
                    .map_err(|e| WorkerError::transcription_failed(e.to_string()))?,
            )
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("language", "en")
            .text("temperature", "0");

        debug!(path = %audio_path.display(), "Submitting audio for transcription");

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| WorkerError::transcription_failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::transcription_failed(format!(
                "endpoint returned {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::transcription_failed(format!("bad response: {e}")))?;

        let words = match parsed.words {
            Some(words) if !words.is_empty() => words
                .into_iter()
                .map(|w| CaptionWord::new(w.word.trim(), w.start, w.end))
                .filter(|w| !w.word.is_empty())
                .collect(),
            _ => {
                warn!("Endpoint returned no word timestamps, distributing evenly");
                distribute_words(&parsed.text, window_duration)
            }
        };

        info!(words = words.len(), "Transcription complete");
        Ok(words)
    }
}

/// Distribute the words of a plain transcript evenly across a window.
pub fn distribute_words(text: &str, window_duration: f64) -> Vec<CaptionWord> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() || window_duration <= 0.0 {
        return Vec::new();
    }

    let slot = window_duration / tokens.len() as f64;
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let start = i as f64 * slot;
            CaptionWord::new(*token, start, start + slot)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribute_words_even_slots() {
        let words = distribute_words("one two three four", 8.0);
        assert_eq!(words.len(), 4);
        assert_eq!(words[0].start, 0.0);
        assert_eq!(words[0].end, 2.0);
        assert_eq!(words[3].start, 6.0);
        assert_eq!(words[3].end, 8.0);
    }

    #[test]
    fn test_distribute_words_empty() {
        assert!(distribute_words("", 10.0).is_empty());
        assert!(distribute_words("   ", 10.0).is_empty());
        assert!(distribute_words("word", 0.0).is_empty());
    }

    #[test]
    fn test_response_parsing_with_words() {
        let json = r#"{
            "text": "hello world",
            "duration": 2.0,
            "words": [
                {"word": "hello", "start": 0.1, "end": 0.5, "confidence": 0.99},
                {"word": "world", "start": 0.6, "end": 1.1}
            ]
        }"#;
        let parsed: TranscriptionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.words.as_ref().unwrap().len(), 2);
        assert_eq!(parsed.text, "hello world");
    }

    #[test]
    fn test_response_parsing_text_only() {
        let json = r#"{"text": "just text"}"#;
        let parsed: TranscriptionResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.words.is_none());
    }
}
