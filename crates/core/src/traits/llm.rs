//! Language-model adapter trait

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::{CompletionRequest, CompletionResponse};

/// Language-model interface.
///
/// The LLM stage builds a [`CompletionRequest`] from its conversation
/// context, tools, and settings, and expects one complete response per
/// call. Streaming providers collect their deltas before returning.
///
/// # Example
///
/// ```ignore
/// let llm: Arc<dyn LanguageModel> = Arc::new(OpenAiChat::new(config));
/// let response = llm.complete(request).await?;
/// println!("{}", response.text);
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a completion from the ordered messages.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}
