//! Provider traits.
//!
//! `ChatProvider` converts API failures into error responses rather than
//! propagating them: the agent loop shows the text to the LLM (or the
//! user) and carries on. Streaming and embedding calls return `Result`
//! because their callers have a retry/fallback path.

use async_trait::async_trait;
use futures::stream::BoxStream;

use oasis_core::types::{ChatRequest, ChatResponse, ToolDefinition};

/// Incremental tokens from a streaming chat call.
pub type TokenStream = BoxStream<'static, anyhow::Result<String>>;

/// A chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Plain chat completion.
    async fn chat(&self, request: &ChatRequest) -> ChatResponse;

    /// Chat completion with tool definitions the model may call.
    async fn chat_with_tools(
        &self,
        request: &ChatRequest,
        tools: &[ToolDefinition],
    ) -> ChatResponse;

    /// Streaming chat completion, yielding content tokens as they arrive.
    async fn chat_stream(&self, request: &ChatRequest) -> anyhow::Result<TokenStream>;

    /// Display name for logging.
    fn name(&self) -> &str;
}

/// An embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. Every returned vector has `dimensions()`
    /// entries.
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// The declared embedding dimension.
    fn dimensions(&self) -> usize;

    /// Display name for logging.
    fn name(&self) -> &str;
}
