//! Speech processing adapter traits

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::frame::AudioData;
use crate::transcript::TranscriptionResult;

/// Batch speech-to-text interface.
///
/// The STT stage hands a complete utterance to `transcribe` and emits
/// exactly one transcription frame from the returned result.
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn SpeechToText> = Arc::new(WhisperHttpStt::new(config));
/// let result = stt.transcribe(&bytes, 16000, 1).await?;
/// println!("Transcribed: {}", result.text);
/// ```
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe one utterance of PCM16-LE audio.
    async fn transcribe(
        &self,
        audio: &[u8],
        sample_rate: u32,
        channels: u16,
    ) -> Result<TranscriptionResult>;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}

/// Where a streaming adapter posts results and errors.
///
/// The STT stage hands one of these to [`StreamingSpeechToText::connect`];
/// the adapter's receive loop calls it for every provider event. Results
/// are posted back into the owning processor's queue machinery, so
/// ordering with other frames is preserved.
pub trait TranscriptionSink: Send + Sync {
    /// Post a transcription result (interim or final).
    fn push_result(&self, result: TranscriptionResult);

    /// Post a non-fatal provider error.
    fn push_error(&self, message: &str);
}

/// Streaming speech-to-text interface.
///
/// A long-lived provider connection is opened in `connect` and fed one
/// audio buffer at a time; results arrive asynchronously through the
/// [`TranscriptionSink`].
#[async_trait]
pub trait StreamingSpeechToText: Send + Sync + 'static {
    /// Open the provider connection; called from the stage's `setup`.
    async fn connect(&self, sink: Arc<dyn TranscriptionSink>) -> Result<()>;

    /// Dispatch one buffer of PCM16-LE audio to the connection.
    async fn send_audio(&self, audio: &[u8], sample_rate: u32, channels: u16) -> Result<()>;

    /// Close the provider connection; called from the stage's `cleanup`.
    async fn disconnect(&self) -> Result<()>;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}

/// Text-to-speech interface.
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize text into PCM16-LE audio.
    async fn synthesize(&self, text: &str) -> Result<AudioData>;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStt;

    #[async_trait]
    impl SpeechToText for MockStt {
        async fn transcribe(
            &self,
            _audio: &[u8],
            _sample_rate: u32,
            _channels: u16,
        ) -> Result<TranscriptionResult> {
            Ok(TranscriptionResult::final_text("test transcription"))
        }

        fn model_name(&self) -> &str {
            "mock-stt"
        }
    }

    #[tokio::test]
    async fn test_mock_stt() {
        let stt = MockStt;
        let result = stt.transcribe(&[0u8; 640], 16000, 1).await.unwrap();
        assert_eq!(result.text, "test transcription");
        assert!(!result.interim);
    }
}
