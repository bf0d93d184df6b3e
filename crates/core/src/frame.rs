//! Frame types that flow through the pipeline
//!
//! A [`Frame`] is a tagged value in one of three ordering categories:
//! System frames preempt content, Control frames are in-order flow control
//! tied to content, and Data frames carry the content itself. The category
//! is a stable property of the payload type and drives queue selection in
//! the processor runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Process-wide frame id counter. Ids are strictly increasing in creation
/// order and unique within the process.
static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

fn next_frame_id() -> u64 {
    NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed)
}

/// Direction of travel through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the sink.
    Downstream,
    /// Toward the source.
    Upstream,
}

/// Ordering category of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameCategory {
    /// Lifecycle and control signals that must preempt content.
    System,
    /// In-order flow control tied to content.
    Control,
    /// Content payloads.
    Data,
}

/// Target of a pause-one / resume-one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorTarget {
    /// Match by processor id.
    Id(u64),
    /// Match by processor name.
    Name(String),
}

impl ProcessorTarget {
    /// Check whether this target matches the given processor identity.
    pub fn matches(&self, id: u64, name: &str) -> bool {
        match self {
            ProcessorTarget::Id(target) => *target == id,
            ProcessorTarget::Name(target) => target == name,
        }
    }
}

/// Raw audio payload: bytes plus the immutable sample geometry.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioData {
    /// Raw PCM bytes (16-bit signed little-endian).
    pub bytes: Vec<u8>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

impl AudioData {
    pub fn new(bytes: Vec<u8>, sample_rate: u32, channels: u16) -> Self {
        Self {
            bytes,
            sample_rate,
            channels,
        }
    }

    /// Number of samples across all channels.
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / 2
    }

    /// Duration of this payload in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        let frames = self.sample_count() as u64 / self.channels.max(1) as u64;
        frames * 1000 / self.sample_rate.max(1) as u64
    }
}

impl std::fmt::Debug for AudioData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioData")
            .field("bytes_len", &self.bytes.len())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

/// High-priority lifecycle and control signals.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemFrame {
    /// Pipeline start marker; carries whether interruptions are allowed.
    Start { allow_interruptions: bool },
    /// Discard queued content at interruption-allowing processors.
    Cancel,
    /// Graceful shutdown marker; each processor forwards it and then stops.
    Stop,
    /// An error surfaced by a processor or adapter.
    Error { message: String, fatal: bool },
    /// User barge-in; discards queued content like Cancel.
    Interruption,
    /// Pause the ordinary queue of one processor.
    PauseProcessor { target: ProcessorTarget },
    /// Resume the ordinary queue of one processor.
    ResumeProcessor { target: ProcessorTarget },
    /// Point-in-time processor metrics, for downstream observers.
    Metrics {
        processor: String,
        handled: u64,
        errors: u64,
    },
}

/// In-order flow control tied to content.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFrame {
    /// End of stream.
    End,
    /// Speech synthesis started.
    TtsStarted,
    /// Speech synthesis finished.
    TtsStopped,
    /// A language-model response is about to be emitted.
    LlmResponseStart { skip_tts: bool },
    /// The language-model response is complete.
    LlmResponseEnd,
    /// The model requested a function call.
    FunctionCall {
        call_id: String,
        name: String,
        arguments: HashMap<String, Value>,
    },
    /// The host finished executing a function call.
    FunctionCallResult {
        call_id: String,
        name: String,
        value: Value,
    },
    /// Append messages to the LLM conversation context.
    LlmMessagesAppend {
        messages: Vec<crate::llm::ChatMessage>,
        run: bool,
    },
    /// Replace the LLM conversation context.
    LlmMessagesReplace {
        messages: Vec<crate::llm::ChatMessage>,
        run: bool,
    },
    /// Trigger a generation from the current context.
    LlmRun,
    /// Replace the LLM tool set.
    LlmSetTools {
        tools: Vec<crate::llm::ToolDefinition>,
    },
    /// Replace the LLM tool-choice policy.
    LlmSetToolChoice { choice: crate::llm::ToolChoice },
    /// Update whether generated text should bypass TTS.
    LlmConfigureOutput { skip_tts: bool },
    /// Free-form settings update for any stage that cares.
    SettingsUpdate { settings: HashMap<String, Value> },
}

/// Content payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum DataFrame {
    /// Raw audio entering the pipeline.
    InputAudio(AudioData),
    /// Raw audio leaving the pipeline.
    OutputAudio(AudioData),
    /// Synthesized speech audio.
    TtsAudio(AudioData),
    /// Text to be spoken (or passed through when `skip_tts`).
    Text { text: String, skip_tts: bool },
    /// Final transcription of user speech.
    Transcription {
        text: String,
        user_id: String,
        timestamp: DateTime<Utc>,
        language: Option<String>,
        raw: Option<Value>,
    },
    /// Interim (non-final) transcription of user speech.
    InterimTranscription {
        text: String,
        user_id: String,
        timestamp: DateTime<Utc>,
        raw: Option<Value>,
    },
    /// An image payload.
    Image { bytes: Vec<u8>, format: String },
    /// Voice activity began.
    UserStartedSpeaking,
    /// Voice activity ended.
    UserStoppedSpeaking,
    /// The bot began producing audible output.
    BotStartedSpeaking,
    /// The bot finished producing audible output.
    BotStoppedSpeaking,
    /// Structured message received from the remote peer.
    TransportMessageIn { payload: Value },
    /// Structured message to deliver to the remote peer.
    TransportMessageOut { payload: Value, urgent: bool },
}

/// The payload of a frame; the variant determines the ordering category.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    System(SystemFrame),
    Control(ControlFrame),
    Data(DataFrame),
}

impl FramePayload {
    pub fn category(&self) -> FrameCategory {
        match self {
            FramePayload::System(_) => FrameCategory::System,
            FramePayload::Control(_) => FrameCategory::Control,
            FramePayload::Data(_) => FrameCategory::Data,
        }
    }
}

/// A frame: identity and routing header plus a typed payload.
///
/// Frames are value-like: once constructed the payload is never mutated.
/// The metadata map is the one exception, reserved for annotation.
#[derive(Debug, Clone)]
pub struct Frame {
    id: u64,
    /// Presentation timestamp in nanoseconds, if known.
    pub pts: Option<u64>,
    /// Free-form annotations.
    pub metadata: HashMap<String, Value>,
    /// Name of the transport this frame arrived on.
    pub transport_source: Option<String>,
    /// Name of the transport this frame is destined for.
    pub transport_destination: Option<String>,
    /// The typed payload.
    pub payload: FramePayload,
}

impl Frame {
    /// Create a frame with a fresh id.
    pub fn new(payload: FramePayload) -> Self {
        Self {
            id: next_frame_id(),
            pts: None,
            metadata: HashMap::new(),
            transport_source: None,
            transport_destination: None,
            payload,
        }
    }

    pub fn system(frame: SystemFrame) -> Self {
        Self::new(FramePayload::System(frame))
    }

    pub fn control(frame: ControlFrame) -> Self {
        Self::new(FramePayload::Control(frame))
    }

    pub fn data(frame: DataFrame) -> Self {
        Self::new(FramePayload::Data(frame))
    }

    /// Convenience: a text data frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::data(DataFrame::Text {
            text: text.into(),
            skip_tts: false,
        })
    }

    /// Convenience: an error system frame.
    pub fn error(message: impl Into<String>, fatal: bool) -> Self {
        Self::system(SystemFrame::Error {
            message: message.into(),
            fatal,
        })
    }

    /// Convenience: an input-audio data frame.
    pub fn input_audio(bytes: Vec<u8>, sample_rate: u32, channels: u16) -> Self {
        Self::data(DataFrame::InputAudio(AudioData::new(
            bytes,
            sample_rate,
            channels,
        )))
    }

    /// Unique, strictly increasing frame id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Ordering category, a stable property of the payload type.
    pub fn category(&self) -> FrameCategory {
        self.payload.category()
    }

    /// Short payload-type name for logging.
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            FramePayload::System(f) => match f {
                SystemFrame::Start { .. } => "start",
                SystemFrame::Cancel => "cancel",
                SystemFrame::Stop => "stop",
                SystemFrame::Error { .. } => "error",
                SystemFrame::Interruption => "interruption",
                SystemFrame::PauseProcessor { .. } => "pause_processor",
                SystemFrame::ResumeProcessor { .. } => "resume_processor",
                SystemFrame::Metrics { .. } => "metrics",
            },
            FramePayload::Control(f) => match f {
                ControlFrame::End => "end",
                ControlFrame::TtsStarted => "tts_started",
                ControlFrame::TtsStopped => "tts_stopped",
                ControlFrame::LlmResponseStart { .. } => "llm_response_start",
                ControlFrame::LlmResponseEnd => "llm_response_end",
                ControlFrame::FunctionCall { .. } => "function_call",
                ControlFrame::FunctionCallResult { .. } => "function_call_result",
                ControlFrame::LlmMessagesAppend { .. } => "llm_messages_append",
                ControlFrame::LlmMessagesReplace { .. } => "llm_messages_replace",
                ControlFrame::LlmRun => "llm_run",
                ControlFrame::LlmSetTools { .. } => "llm_set_tools",
                ControlFrame::LlmSetToolChoice { .. } => "llm_set_tool_choice",
                ControlFrame::LlmConfigureOutput { .. } => "llm_configure_output",
                ControlFrame::SettingsUpdate { .. } => "settings_update",
            },
            FramePayload::Data(f) => match f {
                DataFrame::InputAudio(_) => "input_audio",
                DataFrame::OutputAudio(_) => "output_audio",
                DataFrame::TtsAudio(_) => "tts_audio",
                DataFrame::Text { .. } => "text",
                DataFrame::Transcription { .. } => "transcription",
                DataFrame::InterimTranscription { .. } => "interim_transcription",
                DataFrame::Image { .. } => "image",
                DataFrame::UserStartedSpeaking => "user_started_speaking",
                DataFrame::UserStoppedSpeaking => "user_stopped_speaking",
                DataFrame::BotStartedSpeaking => "bot_started_speaking",
                DataFrame::BotStoppedSpeaking => "bot_stopped_speaking",
                DataFrame::TransportMessageIn { .. } => "transport_message_in",
                DataFrame::TransportMessageOut { .. } => "transport_message_out",
            },
        }
    }

    /// Set the presentation timestamp (builder style).
    pub fn with_pts(mut self, pts_ns: u64) -> Self {
        self.pts = Some(pts_ns);
        self
    }

    /// Attach a metadata annotation (builder style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set the transport source name (builder style).
    pub fn with_transport_source(mut self, name: impl Into<String>) -> Self {
        self.transport_source = Some(name.into());
        self
    }

    /// Set the transport destination name (builder style).
    pub fn with_transport_destination(mut self, name: impl Into<String>) -> Self {
        self.transport_destination = Some(name.into());
        self
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_ids_strictly_increase() {
        let frames: Vec<Frame> = (0..100).map(|_| Frame::text("x")).collect();
        for pair in frames.windows(2) {
            assert!(pair[0].id() < pair[1].id());
        }
    }

    #[test]
    fn test_categories_are_stable() {
        assert_eq!(
            Frame::system(SystemFrame::Cancel).category(),
            FrameCategory::System
        );
        assert_eq!(
            Frame::control(ControlFrame::End).category(),
            FrameCategory::Control
        );
        assert_eq!(Frame::text("hi").category(), FrameCategory::Data);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Frame::system(SystemFrame::Stop).kind(), "stop");
        assert_eq!(
            Frame::data(DataFrame::UserStartedSpeaking).kind(),
            "user_started_speaking"
        );
        assert_eq!(Frame::control(ControlFrame::LlmRun).kind(), "llm_run");
    }

    #[test]
    fn test_processor_target_matching() {
        let by_id = ProcessorTarget::Id(7);
        assert!(by_id.matches(7, "tts"));
        assert!(!by_id.matches(8, "tts"));

        let by_name = ProcessorTarget::Name("tts".into());
        assert!(by_name.matches(99, "tts"));
        assert!(!by_name.matches(99, "stt"));
    }

    #[test]
    fn test_audio_data_geometry() {
        let audio = AudioData::new(vec![0u8; 640], 16000, 1);
        assert_eq!(audio.sample_count(), 320);
        assert_eq!(audio.duration_ms(), 20);
    }

    #[test]
    fn test_metadata_annotation() {
        let frame = Frame::text("hello").with_metadata("lang", serde_json::json!("en"));
        assert_eq!(frame.metadata.get("lang"), Some(&serde_json::json!("en")));
    }
}
