//! Transcription result types shared by both STT modes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transcription result produced by a speech-recognition adapter.
///
/// Both batch and streaming adapters hand these to the STT stage, which
/// turns non-empty results into transcription frames. Missing `user_id`
/// and `timestamp` are filled from the stage's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// The recognized text.
    pub text: String,
    /// Whether this is an interim (non-final) result.
    #[serde(default)]
    pub interim: bool,
    /// BCP-47 language tag, when the provider reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Speaker identifier, when the provider reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Capture timestamp, when the provider reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Raw provider payload, for downstream consumers that need it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl TranscriptionResult {
    /// A final result carrying only text.
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            interim: false,
            language: None,
            user_id: None,
            timestamp: None,
            raw: None,
        }
    }

    /// An interim result carrying only text.
    pub fn interim_text(text: impl Into<String>) -> Self {
        Self {
            interim: true,
            ..Self::final_text(text)
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let fin = TranscriptionResult::final_text("hello");
        assert!(!fin.interim);

        let interim = TranscriptionResult::interim_text("hel").with_language("en");
        assert!(interim.interim);
        assert_eq!(interim.language.as_deref(), Some("en"));
    }
}
