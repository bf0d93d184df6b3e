//! Peer-channel wire protocol
//!
//! Control messages over the peer channel are JSON objects carrying a
//! `type` tag and a `data` payload. Audio travels beside them as raw
//! PCM16-LE. These types cover the recognized outgoing messages; hosts
//! with richer protocols use the free-form `message` variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use voicepipe_core::{DataFrame, Frame, Result};

/// `transcription` message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionPayload {
    pub text: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    /// ISO-8601 capture timestamp.
    pub timestamp: String,
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// A structured message exchanged with the remote peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PeerMessage {
    /// A user transcription, interim or final.
    Transcription(TranscriptionPayload),
    /// The bot's textual response.
    BotResponse { text: String },
    /// Free-form host payload.
    Message(Value),
}

impl PeerMessage {
    pub fn transcription(
        text: impl Into<String>,
        user_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        is_final: bool,
    ) -> Self {
        PeerMessage::Transcription(TranscriptionPayload {
            text: text.into(),
            user_id: user_id.into(),
            timestamp: timestamp.to_rfc3339(),
            is_final,
        })
    }

    pub fn bot_response(text: impl Into<String>) -> Self {
        PeerMessage::BotResponse { text: text.into() }
    }

    pub fn message(payload: Value) -> Self {
        PeerMessage::Message(payload)
    }

    /// Wrap into an outbound transport-message frame.
    pub fn into_frame(self, urgent: bool) -> Result<Frame> {
        let payload = serde_json::to_value(&self)?;
        Ok(Frame::data(DataFrame::TransportMessageOut {
            payload,
            urgent,
        }))
    }

    /// Parse a peer message out of an inbound JSON payload.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicepipe_core::FramePayload;

    #[test]
    fn test_transcription_wire_shape() {
        let timestamp = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let message = PeerMessage::transcription("hello", "u1", timestamp, true);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "transcription");
        assert_eq!(json["data"]["text"], "hello");
        assert_eq!(json["data"]["userId"], "u1");
        assert_eq!(json["data"]["final"], true);
        assert!(json["data"]["timestamp"]
            .as_str()
            .unwrap()
            .starts_with("2024-05-01T12:00:00"));
    }

    #[test]
    fn test_bot_response_wire_shape() {
        let json = serde_json::to_value(PeerMessage::bot_response("hi there")).unwrap();
        assert_eq!(json["type"], "bot_response");
        assert_eq!(json["data"]["text"], "hi there");
    }

    #[test]
    fn test_free_form_message_roundtrip() {
        let message = PeerMessage::message(serde_json::json!({"volume": 0.5}));
        let json = serde_json::to_value(&message).unwrap();
        let parsed = PeerMessage::from_value(&json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_into_frame_marks_urgency() {
        let frame = PeerMessage::bot_response("now").into_frame(true).unwrap();
        match &frame.payload {
            FramePayload::Data(DataFrame::TransportMessageOut { payload, urgent }) => {
                assert!(*urgent);
                assert_eq!(payload["type"], "bot_response");
            }
            other => panic!("expected outbound message, got {other:?}"),
        }
    }
}
