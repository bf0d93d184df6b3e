//! Peer transport adapter traits

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::frame::AudioData;

/// Audio ingress from the remote peer.
///
/// The input transport's reader task awaits `receive_audio` in a loop;
/// each returned buffer becomes one input-audio frame. `None` means the
/// peer stream has ended and the reader task exits.
#[async_trait]
pub trait TransportReceiver: Send + Sync + 'static {
    /// Await the next raw PCM16-LE buffer from the peer.
    async fn receive_audio(&self) -> Result<Option<Vec<u8>>>;
}

/// Audio and message egress to the remote peer.
#[async_trait]
pub trait TransportSender: Send + Sync + 'static {
    /// Deliver one chunk of audio to the peer.
    async fn send_audio(&self, audio: &AudioData) -> Result<()>;

    /// Deliver a structured JSON message to the peer.
    async fn send_message(&self, payload: &Value, urgent: bool) -> Result<()>;
}
