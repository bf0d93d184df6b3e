//! Configuration management for voicepipe
//!
//! Supports loading configuration from:
//! - TOML/YAML files
//! - Environment variables (VOICEPIPE_ prefix)
//! - In-code defaults (every option has one)

pub mod settings;
pub mod stages;

pub use settings::{load_settings, Settings};
pub use stages::{
    AudioInputConfig, AudioOutputConfig, BatcherConfig, LlmConfig, ProcessorConfig, SttConfig,
    TtsConfig, VadConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for voicepipe_core::Error {
    fn from(err: ConfigError) -> Self {
        voicepipe_core::Error::Config(err.to_string())
    }
}
