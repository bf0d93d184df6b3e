//! Language-model request/response types and the conversation context

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Function,
}

/// Chat message.
///
/// For `Function`-role messages the `name` field carries the call id the
/// provider expects to correlate with an earlier function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            name: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            name: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            name: None,
        }
    }

    /// Create a function-result message correlated by call id.
    pub fn function(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Function,
            content: content.into(),
            name: Some(call_id.into()),
        }
    }
}

/// Ordered sequence of messages owned by an LLM stage.
///
/// If a system prompt is configured it is the first element at
/// construction, and it is re-prepended after any replace that omits a
/// system message.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    system_prompt: Option<String>,
    messages: Vec<ChatMessage>,
}

impl ConversationContext {
    pub fn new(system_prompt: Option<String>) -> Self {
        let messages = match &system_prompt {
            Some(prompt) => vec![ChatMessage::system(prompt.clone())],
            None => Vec::new(),
        };
        Self {
            system_prompt,
            messages,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append one message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Append several messages.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.messages.extend(messages);
    }

    /// Replace the whole context.
    ///
    /// If the replacement has no system message and a system prompt is
    /// configured, the prompt is re-prepended.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        if let Some(prompt) = &self.system_prompt {
            let has_system = self.messages.iter().any(|m| m.role == ChatRole::System);
            if !has_system {
                self.messages.insert(0, ChatMessage::system(prompt.clone()));
            }
        }
    }

    /// Append a user message.
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::user(content));
    }

    /// Append an assistant message.
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::assistant(content));
    }

    /// Append a function-result message correlated by call id.
    pub fn add_function_result(&mut self, call_id: impl Into<String>, value: &Value) {
        self.push(ChatMessage::function(call_id, value.to_string()));
    }
}

/// Tool definition for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON schema for parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Tool-choice policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    #[default]
    Auto,
    /// The model must not call tools.
    None,
    /// The model must call some tool.
    Required,
    /// The model must call the named function.
    Function(String),
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-assigned call id.
    pub call_id: String,
    /// Function name.
    pub name: String,
    /// Arguments by name.
    pub arguments: HashMap<String, Value>,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Generation settings forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenerationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

/// A completion request: ordered messages plus tools and settings.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub settings: GenerationSettings,
    /// Model override, if the stage is configured with one.
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = choice;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A completion response: text plus any function calls.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Generated text; may be empty when only function calls are returned.
    pub text: String,
    /// Requested function calls, in provider order.
    pub function_calls: Vec<FunctionCall>,
    /// Token usage, when reported.
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// A plain text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: content.into(),
            function_calls: Vec::new(),
            usage: None,
        }
    }

    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_starts_with_system_prompt() {
        let ctx = ConversationContext::new(Some("Be brief.".into()));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.messages()[0].role, ChatRole::System);
        assert_eq!(ctx.messages()[0].content, "Be brief.");
    }

    #[test]
    fn test_replace_reprepends_system_prompt() {
        let mut ctx = ConversationContext::new(Some("S".into()));
        ctx.replace(vec![ChatMessage::user("hi")]);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.messages()[0].role, ChatRole::System);
        assert_eq!(ctx.messages()[1].content, "hi");

        // A replacement that carries its own system message is kept as-is.
        ctx.replace(vec![ChatMessage::system("T"), ChatMessage::user("yo")]);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.messages()[0].content, "T");
    }

    #[test]
    fn test_system_prompt_survives_appends() {
        let mut ctx = ConversationContext::new(Some("S".into()));
        for i in 0..20 {
            ctx.add_user(format!("msg {i}"));
            ctx.add_assistant("ok");
        }
        assert_eq!(ctx.messages()[0].role, ChatRole::System);
        assert_eq!(ctx.messages()[0].content, "S");
    }

    #[test]
    fn test_function_result_message() {
        let mut ctx = ConversationContext::new(None);
        ctx.add_function_result("call-1", &json!({"temp": 72}));
        let msg = &ctx.messages()[0];
        assert_eq!(msg.role, ChatRole::Function);
        assert_eq!(msg.name.as_deref(), Some("call-1"));
        assert_eq!(msg.content, r#"{"temp":72}"#);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_tool_choice_serde() {
        let auto: ToolChoice = serde_json::from_str(r#""auto""#).unwrap();
        assert_eq!(auto, ToolChoice::Auto);
        let func: ToolChoice = serde_json::from_str(r#"{"function":"weather"}"#).unwrap();
        assert_eq!(func, ToolChoice::Function("weather".into()));
    }
}
