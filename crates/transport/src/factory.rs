//! Transport pair construction
//!
//! The input and output transports are siblings: one concrete peer
//! connection backs both. This factory builds the pair from an adapter
//! pair and the audio configuration, ready to slot into a pipeline.

use std::sync::Arc;

use voicepipe_config::{AudioInputConfig, AudioOutputConfig, ProcessorConfig, VadConfig};
use voicepipe_core::{TransportReceiver, TransportSender};
use voicepipe_pipeline::Processor;

use crate::input::InputTransport;
use crate::output::OutputTransport;

/// Configuration for one transport pair.
#[derive(Debug, Clone, Default)]
pub struct TransportParams {
    pub input: AudioInputConfig,
    pub output: AudioOutputConfig,
    pub vad: VadConfig,
}

/// The two sibling processors of one peer connection.
pub struct TransportPair {
    pub input: Arc<Processor>,
    pub output: Arc<Processor>,
}

/// Build the input/output transport pair. The input processor goes at
/// the head of the pipeline stages, the output near the tail.
pub fn transport_pair(
    receiver: Arc<dyn TransportReceiver>,
    sender: Arc<dyn TransportSender>,
    params: TransportParams,
) -> TransportPair {
    let input = Processor::with_config(
        Arc::new(InputTransport::new(
            receiver,
            params.input,
            params.vad,
        )),
        &ProcessorConfig::named("transport_in"),
    );
    let output = Processor::with_config(
        Arc::new(OutputTransport::new(sender, params.output)),
        &ProcessorConfig::named("transport_out"),
    );
    TransportPair { input, output }
}
