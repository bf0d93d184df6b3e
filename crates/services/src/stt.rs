//! Speech-to-text stage
//!
//! Two modes share one output contract. Batch mode transcribes each
//! input-audio frame with a single adapter call; streaming mode opens a
//! long-lived connection in `setup` and dispatches bytes per frame, with
//! results arriving asynchronously through a [`TranscriptionSink`] that
//! posts them back into the stage's own queue machinery.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use voicepipe_config::SttConfig;
use voicepipe_core::{
    DataFrame, Direction, Frame, FramePayload, Result, SpeechToText, StreamingSpeechToText,
    TranscriptionResult, TranscriptionSink,
};
use voicepipe_pipeline::{FrameHandler, ProcessorContext};

enum Backend {
    Batch(Arc<dyn SpeechToText>),
    Streaming(Arc<dyn StreamingSpeechToText>),
}

/// Build a transcription frame from an adapter result, filling the
/// stage defaults. Empty (trimmed) text yields nothing.
fn transcription_frame(result: TranscriptionResult, config: &SttConfig) -> Option<Frame> {
    if result.text.trim().is_empty() {
        return None;
    }
    let user_id = result.user_id.unwrap_or_else(|| config.user_id.clone());
    let timestamp = result.timestamp.unwrap_or_else(Utc::now);
    let frame = if result.interim {
        Frame::data(DataFrame::InterimTranscription {
            text: result.text,
            user_id,
            timestamp,
            raw: result.raw,
        })
    } else {
        Frame::data(DataFrame::Transcription {
            text: result.text,
            user_id,
            timestamp,
            language: result.language.or_else(|| config.language.clone()),
            raw: result.raw,
        })
    };
    Some(frame)
}

/// Sink handed to streaming adapters; posts provider events into the
/// owning processor's queues so handling stays on its scheduler.
struct StageSink {
    ctx: ProcessorContext,
    config: SttConfig,
}

impl TranscriptionSink for StageSink {
    fn push_result(&self, result: TranscriptionResult) {
        if let Some(frame) = transcription_frame(result, &self.config) {
            self.ctx.enqueue(frame, Direction::Downstream);
        }
    }

    fn push_error(&self, message: &str) {
        self.ctx
            .enqueue(Frame::error(message, false), Direction::Downstream);
    }
}

/// Generic speech-recognition stage.
pub struct SttStage {
    backend: Backend,
    config: SttConfig,
}

impl SttStage {
    /// Batch mode: one `transcribe` call per input-audio frame.
    pub fn batch(adapter: Arc<dyn SpeechToText>, config: SttConfig) -> Self {
        Self {
            backend: Backend::Batch(adapter),
            config,
        }
    }

    /// Streaming mode: a long-lived connection fed one frame at a time.
    pub fn streaming(adapter: Arc<dyn StreamingSpeechToText>, config: SttConfig) -> Self {
        Self {
            backend: Backend::Streaming(adapter),
            config,
        }
    }

    /// Emit one transcription (or interim transcription) frame from an
    /// adapter result. Shared by both modes.
    pub fn push_transcription_result(&self, result: TranscriptionResult, ctx: &ProcessorContext) {
        if let Some(frame) = transcription_frame(result, &self.config) {
            ctx.push(frame, Direction::Downstream);
        }
    }
}

#[async_trait]
impl FrameHandler for SttStage {
    fn name(&self) -> &str {
        "stt"
    }

    async fn setup(&self, ctx: &ProcessorContext) -> Result<()> {
        if let Backend::Streaming(adapter) = &self.backend {
            let sink = Arc::new(StageSink {
                ctx: ctx.clone(),
                config: self.config.clone(),
            });
            adapter.connect(sink).await?;
            debug!(model = adapter.model_name(), "streaming STT connected");
        }
        Ok(())
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        let audio = match &frame.payload {
            FramePayload::Data(DataFrame::InputAudio(audio)) => audio.clone(),
            _ => {
                ctx.push(frame, direction);
                return Ok(());
            }
        };

        match &self.backend {
            Backend::Batch(adapter) => {
                // Audio remains available to later stages.
                ctx.push(frame, direction);
                let result = adapter
                    .transcribe(&audio.bytes, audio.sample_rate, audio.channels)
                    .await?;
                self.push_transcription_result(result, ctx);
            }
            Backend::Streaming(adapter) => {
                adapter
                    .send_audio(&audio.bytes, audio.sample_rate, audio.channels)
                    .await?;
                ctx.push(frame, direction);
            }
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        if let Backend::Streaming(adapter) = &self.backend {
            adapter.disconnect().await?;
            debug!(model = adapter.model_name(), "streaming STT disconnected");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;
    use voicepipe_pipeline::{CollectorStage, Pipeline};

    struct StubBatchStt {
        result: TranscriptionResult,
        calls: Mutex<Vec<usize>>,
    }

    impl StubBatchStt {
        fn new(result: TranscriptionResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SpeechToText for StubBatchStt {
        async fn transcribe(
            &self,
            audio: &[u8],
            _sample_rate: u32,
            _channels: u16,
        ) -> Result<TranscriptionResult> {
            self.calls.lock().push(audio.len());
            Ok(self.result.clone())
        }

        fn model_name(&self) -> &str {
            "stub-batch"
        }
    }

    struct StubStreamingStt {
        sink: Mutex<Option<Arc<dyn TranscriptionSink>>>,
        sent: Mutex<Vec<usize>>,
        disconnected: Mutex<bool>,
    }

    impl StubStreamingStt {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sink: Mutex::new(None),
                sent: Mutex::new(Vec::new()),
                disconnected: Mutex::new(false),
            })
        }

        fn emit(&self, result: TranscriptionResult) {
            let sink = self.sink.lock().clone().expect("connected");
            sink.push_result(result);
        }

        fn emit_error(&self, message: &str) {
            let sink = self.sink.lock().clone().expect("connected");
            sink.push_error(message);
        }
    }

    #[async_trait]
    impl StreamingSpeechToText for StubStreamingStt {
        async fn connect(&self, sink: Arc<dyn TranscriptionSink>) -> Result<()> {
            *self.sink.lock() = Some(sink);
            Ok(())
        }

        async fn send_audio(
            &self,
            audio: &[u8],
            _sample_rate: u32,
            _channels: u16,
        ) -> Result<()> {
            self.sent.lock().push(audio.len());
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            *self.disconnected.lock() = true;
            Ok(())
        }

        fn model_name(&self) -> &str {
            "stub-streaming"
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

    fn kinds(collector: &CollectorStage) -> Vec<&'static str> {
        collector.frames().iter().map(Frame::kind).collect()
    }

    async fn run_stage(stage: SttStage) -> (Pipeline, Arc<CollectorStage>) {
        let collector = Arc::new(CollectorStage::new());
        let pipeline = Pipeline::builder()
            .handler(Arc::new(stage))
            .handler(collector.clone())
            .build();
        pipeline.start().await.unwrap();
        (pipeline, collector)
    }

    #[tokio::test]
    async fn test_batch_forwards_audio_then_emits_transcription() {
        let adapter = StubBatchStt::new(TranscriptionResult::final_text("hello there"));
        let stage = SttStage::batch(adapter.clone(), SttConfig::default());
        let (pipeline, collector) = run_stage(stage).await;

        pipeline.queue(Frame::input_audio(vec![0u8; 640], 16000, 1));
        wait_until(|| collector.len() >= 2).await;
        assert_eq!(kinds(&collector), vec!["input_audio", "transcription"]);
        assert_eq!(adapter.calls.lock().as_slice(), &[640]);

        let frames = collector.frames();
        match &frames[1].payload {
            FramePayload::Data(DataFrame::Transcription { text, user_id, .. }) => {
                assert_eq!(text, "hello there");
                // Missing user id fell back to the stage default.
                assert_eq!(user_id, "user");
            }
            other => panic!("expected transcription, got {other:?}"),
        }
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_batch_drops_empty_transcriptions() {
        let adapter = StubBatchStt::new(TranscriptionResult::final_text("  "));
        let stage = SttStage::batch(adapter, SttConfig::default());
        let (pipeline, collector) = run_stage(stage).await;

        pipeline.queue(Frame::input_audio(vec![0u8; 640], 16000, 1));
        wait_until(|| collector.len() >= 1).await;
        sleep(Duration::from_millis(20)).await;
        assert_eq!(kinds(&collector), vec!["input_audio"]);
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_interim_results_become_interim_frames() {
        let adapter = StubBatchStt::new(TranscriptionResult::interim_text("hel"));
        let stage = SttStage::batch(adapter, SttConfig::default());
        let (pipeline, collector) = run_stage(stage).await;

        pipeline.queue(Frame::input_audio(vec![0u8; 640], 16000, 1));
        wait_until(|| collector.len() >= 2).await;
        assert_eq!(kinds(&collector), vec!["input_audio", "interim_transcription"]);
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_streaming_dispatches_and_posts_results() {
        let adapter = StubStreamingStt::new();
        let stage = SttStage::streaming(adapter.clone(), SttConfig::default());
        let (pipeline, collector) = run_stage(stage).await;

        pipeline.queue(Frame::input_audio(vec![0u8; 320], 16000, 1));
        wait_until(|| collector.len() >= 1).await;
        assert_eq!(adapter.sent.lock().as_slice(), &[320]);
        assert_eq!(kinds(&collector), vec!["input_audio"]);

        // A provider result arrives later, through the sink.
        adapter.emit(TranscriptionResult::final_text("streamed").with_user_id("alice"));
        wait_until(|| collector.len() >= 2).await;
        let frames = collector.frames();
        match &frames[1].payload {
            FramePayload::Data(DataFrame::Transcription { text, user_id, .. }) => {
                assert_eq!(text, "streamed");
                assert_eq!(user_id, "alice");
            }
            other => panic!("expected transcription, got {other:?}"),
        }

        pipeline.stop().await;
        assert!(*adapter.disconnected.lock());
    }

    #[tokio::test]
    async fn test_streaming_provider_errors_surface_as_error_frames() {
        let adapter = StubStreamingStt::new();
        let stage = SttStage::streaming(adapter.clone(), SttConfig::default());
        let (pipeline, collector) = run_stage(stage).await;

        adapter.emit_error("socket closed");
        wait_until(|| collector.len() >= 1).await;
        assert_eq!(kinds(&collector), vec!["error"]);
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_non_audio_frames_forward() {
        let adapter = StubBatchStt::new(TranscriptionResult::final_text("x"));
        let stage = SttStage::batch(adapter.clone(), SttConfig::default());
        let (pipeline, collector) = run_stage(stage).await;

        pipeline.queue(Frame::text("passthrough"));
        wait_until(|| collector.len() >= 1).await;
        assert_eq!(kinds(&collector), vec!["text"]);
        assert!(adapter.calls.lock().is_empty());
        pipeline.stop().await;
    }
}
