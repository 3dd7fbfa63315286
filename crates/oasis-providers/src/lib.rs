//! Provider clients: chat (blocking + streaming) and embeddings over
//! any OpenAI-compatible HTTP API.

pub mod http_chat;
pub mod http_embedding;
pub mod registry;
pub mod traits;

pub use http_chat::HttpChatProvider;
pub use http_embedding::HttpEmbeddingProvider;
pub use traits::{ChatProvider, EmbeddingProvider, TokenStream};
