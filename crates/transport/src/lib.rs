//! Transport stages: audio ingress and egress for the pipeline
//!
//! This crate shapes raw peer audio into framed input and drains framed
//! output back to the peer:
//! - [`InputTransport`]: reader task, VAD, speaking-state transitions
//! - [`OutputTransport`]: audio buffering, drain task, bot speaking-state
//! - [`AudioBatcher`]: utterance accumulation for batch STT
//! - [`EnergyVad`]: the RMS-threshold state machine
//! - [`PeerMessage`]: the peer-channel JSON wire protocol

pub mod batcher;
pub mod factory;
pub mod input;
pub mod output;
pub mod protocol;
pub mod vad;

pub use batcher::AudioBatcher;
pub use factory::{transport_pair, TransportPair, TransportParams};
pub use input::InputTransport;
pub use output::OutputTransport;
pub use protocol::{PeerMessage, TranscriptionPayload};
pub use vad::{EnergyVad, SpeakingTransition, VadUpdate};
