//! Output transport stage
//!
//! Buffers synthesized audio and drains it to the peer one chunk at a
//! time from a background task, tracking bot speaking-state from the TTS
//! envelope. Outbound transport messages go straight to the peer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::warn;

use voicepipe_config::AudioOutputConfig;
use voicepipe_core::{
    AudioData, ControlFrame, DataFrame, Direction, Frame, FramePayload, Result, TransportSender,
};
use voicepipe_pipeline::{FrameHandler, ProcessorContext};

/// Poll interval for the drain task when the buffer is empty.
const DRAIN_IDLE: Duration = Duration::from_millis(1);

/// State shared between the frame handler and the drain task.
struct Shared {
    tts_active: AtomicBool,
    bot_speaking: AtomicBool,
    buffer: Mutex<VecDeque<AudioData>>,
}

impl Shared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            tts_active: AtomicBool::new(false),
            bot_speaking: AtomicBool::new(false),
            buffer: Mutex::new(VecDeque::new()),
        })
    }

    /// Emit bot-stopped-speaking once synthesis is inactive and the
    /// buffer has fully drained.
    fn check_stopped(&self, ctx: &ProcessorContext) {
        if !self.tts_active.load(Ordering::Acquire)
            && self.buffer.lock().is_empty()
            && self.bot_speaking.swap(false, Ordering::AcqRel)
        {
            ctx.push(
                Frame::data(DataFrame::BotStoppedSpeaking),
                Direction::Downstream,
            );
        }
    }

    fn ensure_speaking(&self, ctx: &ProcessorContext) {
        if !self.bot_speaking.swap(true, Ordering::AcqRel) {
            ctx.push(
                Frame::data(DataFrame::BotStartedSpeaking),
                Direction::Downstream,
            );
        }
    }
}

/// Audio egress: drains framed output to the remote peer.
pub struct OutputTransport {
    sender: Arc<dyn TransportSender>,
    config: AudioOutputConfig,
    shared: Arc<Shared>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl OutputTransport {
    pub fn new(sender: Arc<dyn TransportSender>, config: AudioOutputConfig) -> Self {
        Self {
            sender,
            config,
            shared: Shared::new(),
            drain: Mutex::new(None),
        }
    }
}

#[async_trait]
impl FrameHandler for OutputTransport {
    fn name(&self) -> &str {
        "output_transport"
    }

    async fn setup(&self, ctx: &ProcessorContext) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let sender = Arc::clone(&self.sender);
        let ctx = ctx.clone();

        let task = tokio::spawn(async move {
            loop {
                let chunk = shared.buffer.lock().pop_front();
                match chunk {
                    Some(audio) => {
                        if let Err(error) = sender.send_audio(&audio).await {
                            warn!(%error, "audio send failed");
                        }
                        shared.check_stopped(&ctx);
                    }
                    None => {
                        shared.check_stopped(&ctx);
                        sleep(DRAIN_IDLE).await;
                    }
                }
            }
        });
        *self.drain.lock() = Some(task);
        Ok(())
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        match &frame.payload {
            FramePayload::Control(ControlFrame::TtsStarted) => {
                self.shared.tts_active.store(true, Ordering::Release);
                self.shared.ensure_speaking(ctx);
                Ok(())
            }
            FramePayload::Control(ControlFrame::TtsStopped) => {
                self.shared.tts_active.store(false, Ordering::Release);
                Ok(())
            }
            FramePayload::Data(DataFrame::TtsAudio(audio))
            | FramePayload::Data(DataFrame::OutputAudio(audio)) => {
                self.shared.ensure_speaking(ctx);
                self.shared.buffer.lock().push_back(audio.clone());
                Ok(())
            }
            FramePayload::Data(DataFrame::TransportMessageOut { payload, urgent }) => {
                self.sender.send_message(payload, *urgent).await?;
                Ok(())
            }
            _ => {
                ctx.push(frame, direction);
                Ok(())
            }
        }
    }

    async fn cleanup(&self) -> Result<()> {
        if let Some(task) = self.drain.lock().take() {
            task.abort();
        }
        Ok(())
    }
}
