//! Layered settings loading

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::stages::{
    AudioInputConfig, AudioOutputConfig, BatcherConfig, LlmConfig, SttConfig, TtsConfig, VadConfig,
};
use crate::ConfigError;

/// Aggregate configuration for one pipeline deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub vad: VadConfig,
    pub audio_in: AudioInputConfig,
    pub audio_out: AudioOutputConfig,
    pub batcher: BatcherConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub stt: SttConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vad.validate()
    }
}

/// Load settings: defaults, then an optional TOML/YAML file, then
/// `VOICEPIPE_`-prefixed environment overrides
/// (e.g. `VOICEPIPE_VAD__THRESHOLD=0.02`).
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(config::File::from(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("VOICEPIPE")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    info!(
        vad = settings.vad.enabled,
        ingress_rate = settings.audio_in.sample_rate,
        egress_rate = settings.audio_out.sample_rate,
        "settings loaded"
    );
    Ok(settings)
}
