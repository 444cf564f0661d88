//! LLM Provider trait.
//!
//! Every OpenAI-compatible backend is driven through [`LlmProvider`]. The
//! agent loop streams its main turns; compaction uses a single blocking
//! completion.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use mcpilot_core::types::{LlmResponse, Message, StreamDelta, ToolDefinition};
use mcpilot_core::ProviderError;

/// Ordered increments of one streamed model reply.
///
/// An `Err` item means the stream broke; consumers stop at the first one.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta, ProviderError>> + Send>>;

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 0.7,
        }
    }
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Start a streamed chat completion.
    ///
    /// # Arguments
    /// * `messages` — Conversation history in OpenAI format.
    /// * `tools`    — Tool definitions the model may call (`None` or empty for none).
    /// * `model`    — Model identifier (e.g. `"deepseek-reasoner"`).
    /// * `config`   — Temperature, max_tokens, etc.
    ///
    /// Errors before the first byte (connection refused, HTTP 4xx/5xx) are
    /// returned directly; later failures arrive as `Err` stream items.
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<DeltaStream, ProviderError>;

    /// Send a non-streamed completion without tools and wait for the reply.
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError>;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
