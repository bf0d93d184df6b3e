//! Generic service stages: speech recognition, language model, synthesis
//!
//! Each stage is a [`voicepipe_pipeline::FrameHandler`] that translates
//! between frame types through an adapter trait from `voicepipe-core`:
//! - [`SttStage`]: input audio → transcriptions (batch or streaming)
//! - [`LlmStage`]: transcriptions and control frames → text and
//!   function calls, with an owned conversation context
//! - [`TtsStage`]: text → synthesized audio, in a started/stopped
//!   envelope

pub mod llm;
pub mod stt;
pub mod tts;

pub use llm::LlmStage;
pub use stt::SttStage;
pub use tts::TtsStage;
