//! Per-stage configuration types
//!
//! Every option has a default; partial files and environment overrides
//! fill in only what they name.

use serde::{Deserialize, Serialize};
use voicepipe_core::{GenerationSettings, ToolChoice, ToolDefinition};

use crate::ConfigError;

/// Processor identity and instrumentation switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Explicit processor id; assigned from a process-wide counter when
    /// absent.
    pub id: Option<u64>,
    /// Explicit processor name; the handler's name when absent.
    pub name: Option<String>,
    pub enable_metrics: bool,
    pub enable_logging: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            enable_metrics: true,
            enable_logging: true,
        }
    }
}

impl ProcessorConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Voice-activity detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub enabled: bool,
    /// Normalized RMS threshold in [0, 1].
    pub threshold: f32,
    /// Consecutive speech frames before the speaking transition.
    pub start_frames: u32,
    /// Consecutive silence frames before the stopping transition.
    pub stop_frames: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.01,
            start_frames: 3,
            stop_frames: 12,
        }
    }
}

impl VadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidValue {
                field: "vad.threshold".into(),
                message: format!("{} is outside [0, 1]", self.threshold),
            });
        }
        Ok(())
    }
}

/// Audio ingress geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioInputConfig {
    pub enabled: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_size_ms: u32,
}

impl Default for AudioInputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 16000,
            channels: 1,
            chunk_size_ms: 20,
        }
    }
}

/// Audio egress geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioOutputConfig {
    pub enabled: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_size_ms: u32,
}

impl Default for AudioOutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 24000,
            channels: 1,
            chunk_size_ms: 20,
        }
    }
}

/// Utterance batching between VAD and a batch STT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Chunks of pre-roll kept while not speaking (≈100 ms at 20 ms
    /// chunks), prepended on the speaking transition.
    pub pre_roll_frames: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            pre_roll_frames: 5,
        }
    }
}

/// Language-model stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    pub model_id: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    /// When set, generated text frames bypass speech synthesis.
    pub skip_tts: bool,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
}

impl LlmConfig {
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    /// The generation settings forwarded on every completion request.
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        }
    }
}

/// Speech-synthesis stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub language: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice_id: None,
            model_id: None,
            language: None,
            sample_rate: 24000,
            channels: 1,
        }
    }
}

/// Speech-recognition stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Default speaker id attached to results that carry none.
    pub user_id: String,
    pub language: Option<String>,
    pub sample_rate: u32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            user_id: "user".into(),
            language: None,
            sample_rate: 16000,
        }
    }
}
