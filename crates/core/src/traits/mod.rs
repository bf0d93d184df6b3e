//! Adapter traits for pluggable backends
//!
//! Concrete cloud providers (STT, LLM, TTS) and peer transports live
//! outside this workspace; these traits are the entire boundary they
//! implement.

mod llm;
mod speech;
mod transport;

pub use llm::LanguageModel;
pub use speech::{SpeechToText, StreamingSpeechToText, TextToSpeech, TranscriptionSink};
pub use transport::{TransportReceiver, TransportSender};
