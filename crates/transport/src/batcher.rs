//! Utterance batching for batch STT
//!
//! Accumulates input-audio chunks between user-started-speaking and
//! user-stopped-speaking and emits one concatenated frame on stop. A
//! small pre-roll ring, filled while not speaking, is prepended so the
//! first phoneme is not clipped. Individual chunks are consumed in every
//! state; only the combined utterance continues downstream.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use voicepipe_config::BatcherConfig;
use voicepipe_core::{audio, DataFrame, Direction, Frame, FramePayload, Result};
use voicepipe_pipeline::{FrameHandler, ProcessorContext};

#[derive(Default)]
struct BatchState {
    speaking: bool,
    pre_roll: VecDeque<Vec<u8>>,
    utterance: Vec<Vec<u8>>,
}

/// Accumulates one utterance of audio between speaking-state frames.
pub struct AudioBatcher {
    config: BatcherConfig,
    state: Mutex<BatchState>,
}

impl AudioBatcher {
    pub fn new(config: BatcherConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BatchState::default()),
        }
    }

    /// Take the finished utterance, if any audio was collected.
    fn finish_utterance(&self) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state.speaking = false;
        if state.utterance.is_empty() {
            return None;
        }
        let chunks = std::mem::take(&mut state.utterance);
        Some(audio::concat(&chunks))
    }
}

#[async_trait]
impl FrameHandler for AudioBatcher {
    fn name(&self) -> &str {
        "audio_batcher"
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        match &frame.payload {
            FramePayload::Data(DataFrame::UserStartedSpeaking) => {
                {
                    let mut state = self.state.lock();
                    state.speaking = true;
                    // The pre-roll becomes the head of the utterance.
                    let pre_roll = std::mem::take(&mut state.pre_roll);
                    state.utterance.extend(pre_roll);
                }
                ctx.push(frame, direction);
                Ok(())
            }
            FramePayload::Data(DataFrame::UserStoppedSpeaking) => {
                ctx.push(frame, direction);
                if let Some(bytes) = self.finish_utterance() {
                    debug!(bytes = bytes.len(), "emitting batched utterance");
                    ctx.push(
                        Frame::input_audio(bytes, self.config.sample_rate, self.config.channels),
                        Direction::Downstream,
                    );
                }
                Ok(())
            }
            FramePayload::Data(DataFrame::InputAudio(chunk)) => {
                let mut state = self.state.lock();
                if state.speaking {
                    state.utterance.push(chunk.bytes.clone());
                } else {
                    state.pre_roll.push_back(chunk.bytes.clone());
                    while state.pre_roll.len() > self.config.pre_roll_frames {
                        state.pre_roll.pop_front();
                    }
                }
                Ok(())
            }
            _ => {
                ctx.push(frame, direction);
                Ok(())
            }
        }
    }
}
