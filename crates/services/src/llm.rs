//! Language-model stage
//!
//! Owns the conversation context for the life of the processor, tracks
//! the tool set and tool-choice policy, and wraps every generation in a
//! response-start/response-end control pair. Function-call frames are
//! emitted before the text frame so a downstream dispatcher can begin
//! tool work while the text waits for speech.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use voicepipe_config::LlmConfig;
use voicepipe_core::{
    ChatMessage, CompletionRequest, ControlFrame, ConversationContext, DataFrame, Direction,
    Frame, FramePayload, LanguageModel, Result, ToolChoice, ToolDefinition,
};
use voicepipe_pipeline::{FrameHandler, ProcessorContext};

/// Pushes the response-end control frame on every exit path, so the
/// start/end pair stays symmetric even when the adapter fails.
struct ResponseEndGuard {
    ctx: ProcessorContext,
}

impl Drop for ResponseEndGuard {
    fn drop(&mut self) {
        self.ctx
            .push(Frame::control(ControlFrame::LlmResponseEnd), Direction::Downstream);
    }
}

/// Generic language-model stage.
pub struct LlmStage {
    adapter: Arc<dyn LanguageModel>,
    config: LlmConfig,
    context: Mutex<ConversationContext>,
    tools: Mutex<Vec<ToolDefinition>>,
    tool_choice: Mutex<ToolChoice>,
    skip_tts: AtomicBool,
}

impl LlmStage {
    pub fn new(adapter: Arc<dyn LanguageModel>, config: LlmConfig) -> Self {
        let context = ConversationContext::new(config.system_prompt.clone());
        let tools = config.tools.clone();
        let tool_choice = config.tool_choice.clone();
        let skip_tts = config.skip_tts;
        Self {
            adapter,
            config,
            context: Mutex::new(context),
            tools: Mutex::new(tools),
            tool_choice: Mutex::new(tool_choice),
            skip_tts: AtomicBool::new(skip_tts),
        }
    }

    /// Snapshot of the conversation context.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.context.lock().messages().to_vec()
    }

    fn build_request(&self) -> CompletionRequest {
        let request = CompletionRequest::new(self.context.lock().messages().to_vec())
            .with_tools(self.tools.lock().clone(), self.tool_choice.lock().clone())
            .with_settings(self.config.generation_settings());
        match &self.config.model_id {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }

    /// Run one generation against the current context.
    ///
    /// Emits response-start, then any function-call frames, then the text
    /// frame (when non-empty), then response-end — the end frame on every
    /// exit path.
    async fn generate(&self, ctx: &ProcessorContext) -> Result<()> {
        let skip_tts = self.skip_tts.load(Ordering::Acquire);
        let request = self.build_request();

        ctx.push(
            Frame::control(ControlFrame::LlmResponseStart { skip_tts }),
            Direction::Downstream,
        );
        let _end = ResponseEndGuard { ctx: ctx.clone() };

        let response = self.adapter.complete(request).await?;

        for call in response.function_calls {
            ctx.push(
                Frame::control(ControlFrame::FunctionCall {
                    call_id: call.call_id,
                    name: call.name,
                    arguments: call.arguments,
                }),
                Direction::Downstream,
            );
        }

        if !response.text.trim().is_empty() {
            self.context.lock().add_assistant(&response.text);
            ctx.push(
                Frame::data(DataFrame::Text {
                    text: response.text,
                    skip_tts,
                }),
                Direction::Downstream,
            );
        }

        if let Some(usage) = &response.usage {
            debug!(
                model = self.adapter.model_name(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl FrameHandler for LlmStage {
    fn name(&self) -> &str {
        "llm"
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        match &frame.payload {
            FramePayload::Data(DataFrame::Transcription { text, .. }) => {
                let text = text.clone();
                ctx.push(frame, direction);
                if text.trim().is_empty() {
                    return Ok(());
                }
                self.context.lock().add_user(text);
                self.generate(ctx).await
            }
            FramePayload::Control(ControlFrame::LlmMessagesAppend { messages, run }) => {
                let run = *run;
                self.context.lock().extend(messages.clone());
                if run {
                    self.generate(ctx).await?;
                }
                Ok(())
            }
            FramePayload::Control(ControlFrame::LlmMessagesReplace { messages, run }) => {
                let run = *run;
                self.context.lock().replace(messages.clone());
                if run {
                    self.generate(ctx).await?;
                }
                Ok(())
            }
            FramePayload::Control(ControlFrame::LlmRun) => self.generate(ctx).await,
            FramePayload::Control(ControlFrame::LlmSetTools { tools }) => {
                *self.tools.lock() = tools.clone();
                Ok(())
            }
            FramePayload::Control(ControlFrame::LlmSetToolChoice { choice }) => {
                *self.tool_choice.lock() = choice.clone();
                Ok(())
            }
            FramePayload::Control(ControlFrame::LlmConfigureOutput { skip_tts }) => {
                self.skip_tts.store(*skip_tts, Ordering::Release);
                Ok(())
            }
            FramePayload::Control(ControlFrame::FunctionCallResult { call_id, value, .. }) => {
                self.context.lock().add_function_result(call_id, value);
                self.generate(ctx).await
            }
            _ => {
                ctx.push(frame, direction);
                Ok(())
            }
        }
    }
}
