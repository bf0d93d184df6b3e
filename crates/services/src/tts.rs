//! Text-to-speech stage
//!
//! Speaks text data frames through the configured adapter, wrapping each
//! utterance in a TTS-started/TTS-stopped control pair. Transcriptions
//! (user speech) and text marked `skip_tts` pass through untouched.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use voicepipe_config::TtsConfig;
use voicepipe_core::{
    ControlFrame, DataFrame, Direction, Frame, FramePayload, Result, TextToSpeech,
};
use voicepipe_pipeline::{FrameHandler, ProcessorContext};

/// Pushes the TTS-stopped control frame on every exit path, so the
/// started/stopped pair stays symmetric even when synthesis fails.
struct TtsStopGuard {
    ctx: ProcessorContext,
}

impl Drop for TtsStopGuard {
    fn drop(&mut self) {
        self.ctx
            .push(Frame::control(ControlFrame::TtsStopped), Direction::Downstream);
    }
}

/// Generic speech-synthesis stage.
pub struct TtsStage {
    adapter: Arc<dyn TextToSpeech>,
    config: TtsConfig,
}

impl TtsStage {
    pub fn new(adapter: Arc<dyn TextToSpeech>, config: TtsConfig) -> Self {
        Self { adapter, config }
    }

    async fn speak(&self, text: &str, ctx: &ProcessorContext) -> Result<()> {
        ctx.push(
            Frame::control(ControlFrame::TtsStarted),
            Direction::Downstream,
        );
        let _stop = TtsStopGuard { ctx: ctx.clone() };

        let audio = self.adapter.synthesize(text).await?;
        debug!(
            model = self.adapter.model_name(),
            voice = self.config.voice_id.as_deref().unwrap_or("default"),
            bytes = audio.bytes.len(),
            sample_rate = audio.sample_rate,
            "synthesized utterance"
        );
        ctx.push(Frame::data(DataFrame::TtsAudio(audio)), Direction::Downstream);
        Ok(())
    }
}

#[async_trait]
impl FrameHandler for TtsStage {
    fn name(&self) -> &str {
        "tts"
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        match &frame.payload {
            FramePayload::Data(DataFrame::Text { text, skip_tts }) if !*skip_tts => {
                if text.trim().is_empty() {
                    return Ok(());
                }
                let text = text.clone();
                self.speak(&text, ctx).await
            }
            _ => {
                // Transcriptions, skip_tts text, and everything else pass
                // through unchanged.
                ctx.push(frame, direction);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;
    use voicepipe_core::{AudioData, Error};
    use voicepipe_pipeline::{CollectorStage, Pipeline};

    struct StubTts {
        spoken: Mutex<Vec<String>>,
        fail: bool,
    }

    impl StubTts {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().clone()
        }
    }

    #[async_trait]
    impl TextToSpeech for StubTts {
        async fn synthesize(&self, text: &str) -> Result<AudioData> {
            self.spoken.lock().push(text.to_string());
            if self.fail {
                return Err(Error::Tts("voice unavailable".into()));
            }
            // One byte pair per input character keeps lengths predictable.
            Ok(AudioData::new(vec![0u8; text.len() * 2], 24000, 1))
        }

        fn model_name(&self) -> &str {
            "stub-tts"
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    async fn run_stage(adapter: Arc<StubTts>) -> (Pipeline, Arc<CollectorStage>) {
        let collector = Arc::new(CollectorStage::new());
        let pipeline = Pipeline::builder()
            .handler(Arc::new(TtsStage::new(adapter, TtsConfig::default())))
            .handler(collector.clone())
            .build();
        pipeline.start().await.unwrap();
        (pipeline, collector)
    }

    fn kinds(collector: &CollectorStage) -> Vec<&'static str> {
        collector.frames().iter().map(Frame::kind).collect()
    }

    #[tokio::test]
    async fn test_text_is_spoken_with_start_stop_envelope() {
        let adapter = StubTts::new();
        let (pipeline, collector) = run_stage(adapter.clone()).await;

        pipeline.queue(Frame::text("Hello world"));
        wait_until(|| collector.len() >= 3).await;
        assert_eq!(kinds(&collector), vec!["tts_started", "tts_audio", "tts_stopped"]);

        let frames = collector.frames();
        match &frames[1].payload {
            FramePayload::Data(DataFrame::TtsAudio(audio)) => {
                assert_eq!(audio.sample_rate, 24000);
                assert_eq!(audio.channels, 1);
                assert_eq!(audio.bytes.len(), "Hello world".len() * 2);
            }
            other => panic!("expected tts audio, got {other:?}"),
        }
        assert_eq!(adapter.spoken(), vec!["Hello world"]);
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_skip_tts_text_passes_through() {
        let adapter = StubTts::new();
        let (pipeline, collector) = run_stage(adapter.clone()).await;

        pipeline.queue(Frame::data(DataFrame::Text {
            text: "silent".into(),
            skip_tts: true,
        }));
        wait_until(|| collector.len() >= 1).await;
        sleep(Duration::from_millis(20)).await;
        assert_eq!(kinds(&collector), vec!["text"]);
        assert!(adapter.spoken().is_empty());
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_empty_text_is_dropped() {
        let adapter = StubTts::new();
        let (pipeline, collector) = run_stage(adapter.clone()).await;

        pipeline.queue(Frame::text("   "));
        // A sentinel that passes through untouched, to bound the wait.
        pipeline.queue(Frame::data(DataFrame::Text {
            text: "sentinel".into(),
            skip_tts: true,
        }));
        wait_until(|| !collector.frames().is_empty()).await;
        // Only the sentinel arrives; the empty text produced nothing.
        assert_eq!(kinds(&collector), vec!["text"]);
        assert!(adapter.spoken().is_empty());
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_stopped_emitted_when_synthesis_fails() {
        let adapter = StubTts::failing();
        let (pipeline, collector) = run_stage(adapter).await;

        pipeline.queue(Frame::text("doomed"));
        wait_until(|| collector.len() >= 3).await;

        let observed = kinds(&collector);
        let started = observed.iter().position(|k| *k == "tts_started");
        let stopped = observed.iter().position(|k| *k == "tts_stopped");
        assert!(started.is_some() && stopped.is_some());
        assert!(started < stopped);
        assert!(!observed.contains(&"tts_audio"));
        assert!(observed.contains(&"error"));
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_transcriptions_are_not_spoken() {
        let adapter = StubTts::new();
        let (pipeline, collector) = run_stage(adapter.clone()).await;

        pipeline.queue(Frame::data(DataFrame::Transcription {
            text: "user said this".into(),
            user_id: "u".into(),
            timestamp: Utc::now(),
            language: None,
            raw: None,
        }));
        wait_until(|| collector.len() >= 1).await;
        assert_eq!(kinds(&collector), vec!["transcription"]);
        assert!(adapter.spoken().is_empty());
        pipeline.stop().await;
    }
}
