//! Error types shared across the workspace

use thiserror::Error;

/// Errors raised by pipeline stages and adapters.
///
/// Errors are local to the stage that raised them: the runtime recovers
/// from handler errors by pushing a non-fatal error frame downstream, so
/// these values describe faults, they do not unwind the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("speech recognition error: {0}")]
    Stt(String),

    #[error("language model error: {0}")]
    Llm(String),

    #[error("speech synthesis error: {0}")]
    Tts(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("lifecycle error in {processor}: {message}")]
    Lifecycle { processor: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Lifecycle failure during `setup`.
    pub fn lifecycle(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Lifecycle {
            processor: processor.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::Stt("connection refused".into());
        assert_eq!(err.to_string(), "speech recognition error: connection refused");

        let err = Error::lifecycle("stt", "model missing");
        assert_eq!(err.to_string(), "lifecycle error in stt: model missing");
    }
}
