//! Core frame model and shared types for the voicepipe pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - The typed frame model (System / Control / Data categories)
//! - Adapter traits for pluggable backends (STT, LLM, TTS, transports)
//! - Language-model request/response types and the conversation context
//! - Transcription result types
//! - PCM audio helpers
//! - Error types

pub mod audio;
pub mod error;
pub mod frame;
pub mod llm;
pub mod traits;
pub mod transcript;

pub use error::{Error, Result};
pub use frame::{
    AudioData, ControlFrame, DataFrame, Direction, Frame, FrameCategory, FramePayload,
    ProcessorTarget, SystemFrame,
};
pub use llm::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, ConversationContext,
    FunctionCall, GenerationSettings, TokenUsage, ToolChoice, ToolDefinition,
};
pub use traits::{
    LanguageModel, SpeechToText, StreamingSpeechToText, TextToSpeech, TranscriptionSink,
    TransportReceiver, TransportSender,
};
pub use transcript::TranscriptionResult;
