//! Voice-activity detection
//!
//! RMS energy thresholding over PCM16-LE with two consecutive-frame
//! counters. The state machine transitions to speaking after
//! `start_frames` consecutive speech chunks and back after `stop_frames`
//! consecutive silence chunks.

use voicepipe_config::VadConfig;
use voicepipe_core::audio::pcm16_rms;

/// A speaking-state transition produced by one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakingTransition {
    Started,
    Stopped,
}

/// Per-chunk VAD output.
#[derive(Debug, Clone, Copy)]
pub struct VadUpdate {
    /// Whether this chunk classified as speech.
    pub is_speech: bool,
    /// Normalized RMS of the chunk.
    pub rms: f32,
    /// State transition triggered by this chunk, if any.
    pub transition: Option<SpeakingTransition>,
}

/// Energy-based voice-activity detector.
pub struct EnergyVad {
    config: VadConfig,
    speaking: bool,
    speech_count: u32,
    silence_count: u32,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            speaking: false,
            speech_count: 0,
            silence_count: 0,
        }
    }

    /// Whether the detector is currently in the speaking state.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Classify one chunk and advance the state machine.
    pub fn process(&mut self, bytes: &[u8]) -> VadUpdate {
        let rms = pcm16_rms(bytes);
        let is_speech = rms >= self.config.threshold;

        if is_speech {
            self.speech_count = self.speech_count.saturating_add(1);
            self.silence_count = 0;
        } else {
            self.silence_count = self.silence_count.saturating_add(1);
            self.speech_count = 0;
        }

        let transition = if !self.speaking && self.speech_count >= self.config.start_frames {
            self.speaking = true;
            Some(SpeakingTransition::Started)
        } else if self.speaking && self.silence_count >= self.config.stop_frames {
            self.speaking = false;
            Some(SpeakingTransition::Stopped)
        } else {
            None
        };

        VadUpdate {
            is_speech,
            rms,
            transition,
        }
    }

    /// Return to the initial not-speaking state.
    pub fn reset(&mut self) {
        self.speaking = false;
        self.speech_count = 0;
        self.silence_count = 0;
    }
}
