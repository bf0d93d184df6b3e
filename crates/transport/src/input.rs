//! Input transport stage
//!
//! A background reader task pulls raw buffers from the peer and posts
//! them into the stage's own queues as input-audio frames; the frame
//! handler applies VAD and pushes downstream. Speaking-state transitions
//! go downstream and are mirrored upstream for the source back-channel.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use voicepipe_config::{AudioInputConfig, VadConfig};
use voicepipe_core::{
    DataFrame, Direction, Frame, FramePayload, Result, TransportReceiver,
};
use voicepipe_pipeline::{FrameHandler, ProcessorContext};

use crate::vad::{EnergyVad, SpeakingTransition};

/// Audio ingress: shapes raw peer audio into framed input.
pub struct InputTransport {
    receiver: Arc<dyn TransportReceiver>,
    config: AudioInputConfig,
    vad_enabled: bool,
    vad: Mutex<EnergyVad>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl InputTransport {
    pub fn new(
        receiver: Arc<dyn TransportReceiver>,
        config: AudioInputConfig,
        vad_config: VadConfig,
    ) -> Self {
        let vad_enabled = vad_config.enabled;
        Self {
            receiver,
            config,
            vad_enabled,
            vad: Mutex::new(EnergyVad::new(vad_config)),
            reader: Mutex::new(None),
        }
    }

    fn push_transition(&self, transition: SpeakingTransition, ctx: &ProcessorContext) {
        let payload = match transition {
            SpeakingTransition::Started => DataFrame::UserStartedSpeaking,
            SpeakingTransition::Stopped => DataFrame::UserStoppedSpeaking,
        };
        ctx.push(Frame::data(payload.clone()), Direction::Downstream);
        // Mirrored upstream so the source back-channel surfaces it.
        ctx.push(Frame::data(payload), Direction::Upstream);
    }
}

#[async_trait]
impl FrameHandler for InputTransport {
    fn name(&self) -> &str {
        "input_transport"
    }

    async fn setup(&self, ctx: &ProcessorContext) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let receiver = Arc::clone(&self.receiver);
        let ctx = ctx.clone();
        let sample_rate = self.config.sample_rate;
        let channels = self.config.channels;

        let task = tokio::spawn(async move {
            loop {
                match receiver.receive_audio().await {
                    Ok(Some(bytes)) => {
                        ctx.enqueue(
                            Frame::input_audio(bytes, sample_rate, channels),
                            Direction::Downstream,
                        );
                    }
                    Ok(None) => {
                        debug!("peer audio stream ended");
                        break;
                    }
                    Err(error) => {
                        warn!(%error, "audio receive failed");
                        ctx.push_error(&error.to_string(), false);
                        break;
                    }
                }
            }
        });
        *self.reader.lock() = Some(task);
        Ok(())
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        match &frame.payload {
            FramePayload::Data(DataFrame::InputAudio(audio)) => {
                if !self.vad_enabled {
                    ctx.push(frame, direction);
                    return Ok(());
                }
                let update = self.vad.lock().process(&audio.bytes);
                if let Some(transition) = update.transition {
                    self.push_transition(transition, ctx);
                }
                // Silence is consumed; only speech-classified chunks
                // continue downstream.
                if update.is_speech {
                    ctx.push(frame, direction);
                }
                Ok(())
            }
            _ => {
                // Inbound transport messages and everything else forward.
                ctx.push(frame, direction);
                Ok(())
            }
        }
    }

    async fn cleanup(&self) -> Result<()> {
        if let Some(task) = self.reader.lock().take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::sleep;
    use voicepipe_core::audio::pcm16_from_f32;
    use voicepipe_pipeline::{CollectorStage, Pipeline};

    struct ScriptedReceiver {
        buffers: Mutex<VecDeque<Vec<u8>>>,
    }

    impl ScriptedReceiver {
        fn new(buffers: Vec<Vec<u8>>) -> Arc<Self> {
            Arc::new(Self {
                buffers: Mutex::new(buffers.into()),
            })
        }
    }

    #[async_trait]
    impl TransportReceiver for ScriptedReceiver {
        async fn receive_audio(&self) -> Result<Option<Vec<u8>>> {
            Ok(self.buffers.lock().pop_front())
        }
    }

    fn loud_chunk() -> Vec<u8> {
        pcm16_from_f32(&vec![0.5f32; 320])
    }

    fn silent_chunk() -> Vec<u8> {
        vec![0u8; 640]
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

    #[tokio::test]
    async fn test_vad_gates_audio_and_emits_transitions() {
        let mut buffers = vec![loud_chunk(), loud_chunk(), loud_chunk()];
        buffers.extend((0..3).map(|_| silent_chunk()));
        let receiver = ScriptedReceiver::new(buffers);

        let vad = VadConfig {
            start_frames: 2,
            stop_frames: 3,
            ..Default::default()
        };
        let collector = Arc::new(CollectorStage::new());
        let upstream: Arc<Mutex<Vec<Frame>>> = Arc::new(Mutex::new(Vec::new()));
        let up = Arc::clone(&upstream);
        let pipeline = Pipeline::builder()
            .handler(Arc::new(InputTransport::new(
                receiver,
                AudioInputConfig::default(),
                vad,
            )))
            .handler(collector.clone())
            .on_upstream(move |frame| up.lock().push(frame))
            .build();
        pipeline.start().await.unwrap();

        wait_until(|| {
            kinds(&collector)
                .iter()
                .any(|k| *k == "user_stopped_speaking")
        })
        .await;

        // Three loud chunks forwarded (transition before the second), no
        // silent chunks forwarded.
        assert_eq!(
            kinds(&collector),
            vec![
                "input_audio",
                "user_started_speaking",
                "input_audio",
                "input_audio",
                "user_stopped_speaking"
            ]
        );

        // Transitions were mirrored to the source back-channel.
        wait_until(|| upstream.lock().len() == 2).await;
        let mirrored: Vec<&'static str> = upstream.lock().iter().map(Frame::kind).collect();
        assert_eq!(
            mirrored,
            vec!["user_started_speaking", "user_stopped_speaking"]
        );
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_vad_disabled_forwards_everything() {
        let receiver = ScriptedReceiver::new(vec![silent_chunk(), loud_chunk()]);
        let vad = VadConfig {
            enabled: false,
            ..Default::default()
        };
        let collector = Arc::new(CollectorStage::new());
        let pipeline = Pipeline::builder()
            .handler(Arc::new(InputTransport::new(
                receiver,
                AudioInputConfig::default(),
                vad,
            )))
            .handler(collector.clone())
            .build();
        pipeline.start().await.unwrap();

        wait_until(|| collector.len() >= 2).await;
        assert_eq!(kinds(&collector), vec!["input_audio", "input_audio"]);
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_inbound_transport_messages_forward() {
        let receiver = ScriptedReceiver::new(vec![]);
        let collector = Arc::new(CollectorStage::new());
        let pipeline = Pipeline::builder()
            .handler(Arc::new(InputTransport::new(
                receiver,
                AudioInputConfig::default(),
                VadConfig::default(),
            )))
            .handler(collector.clone())
            .build();
        pipeline.start().await.unwrap();

        pipeline.queue(Frame::data(DataFrame::TransportMessageIn {
            payload: serde_json::json!({"type": "message", "data": {"k": 1}}),
        }));
        wait_until(|| collector.len() >= 1).await;
        assert_eq!(kinds(&collector), vec!["transport_message_in"]);
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_configured_geometry_stamped_on_frames() {
        let receiver = ScriptedReceiver::new(vec![loud_chunk()]);
        let vad = VadConfig {
            enabled: false,
            ..Default::default()
        };
        let config = AudioInputConfig {
            sample_rate: 8000,
            channels: 2,
            ..Default::default()
        };
        let collector = Arc::new(CollectorStage::new());
        let pipeline = Pipeline::builder()
            .handler(Arc::new(InputTransport::new(receiver, config, vad)))
            .handler(collector.clone())
            .build();
        pipeline.start().await.unwrap();

        wait_until(|| collector.len() >= 1).await;
        match &collector.frames()[0].payload {
            FramePayload::Data(DataFrame::InputAudio(audio)) => {
                assert_eq!(audio.sample_rate, 8000);
                assert_eq!(audio.channels, 2);
            }
            other => panic!("expected input audio, got {other:?}"),
        }
        pipeline.stop().await;
    }
}
