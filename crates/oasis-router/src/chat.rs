//! The streamed chat path: recall memory context, build the prompt,
//! stream tokens into an edited placeholder message, persist the turn
//! in the background.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use oasis_core::model::{MessageRole, StoredMessage};
use oasis_core::types::{ChatMessage, ChatRequest, ContentPart};
use oasis_core::utils::truncate_string;
use oasis_providers::{ChatProvider, EmbeddingProvider};
use oasis_store::Store;

use crate::frontend::Frontend;

/// Edit the placeholder once per this many tokens.
const EDIT_EVERY_TOKENS: usize = 20;

/// How many past turns go into the prompt.
const HISTORY_LIMIT: usize = 20;

/// Executes the conversational path.
pub struct ChatPath {
    provider: Arc<dyn ChatProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn Store>,
    model: String,
    system_prompt: String,
    context_window: usize,
    vector_top_k: usize,
}

impl ChatPath {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn Store>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        context_window: usize,
        vector_top_k: usize,
    ) -> Self {
        ChatPath {
            provider,
            embedder,
            store,
            model: model.into(),
            system_prompt: system_prompt.into(),
            context_window,
            vector_top_k,
        }
    }

    /// Run one conversational turn. Returns the handle of the
    /// fire-and-forget persistence task (callers may drop it).
    pub async fn respond(
        &self,
        frontend: &Arc<dyn Frontend>,
        chat_id: &str,
        thread_id: &str,
        user_text: &str,
        extra_context: Option<&str>,
        image: Option<ContentPart>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let request = self
            .build_request(thread_id, user_text, extra_context, image)
            .await;

        let placeholder = frontend.send(chat_id, "…").await?;
        let reply = self
            .stream_into(frontend, chat_id, &placeholder, &request)
            .await;

        let reply = match reply {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "chat turn failed");
                let message = format!("Sorry, I couldn't reply: {e}");
                let _ = frontend.edit(chat_id, &placeholder, &message).await;
                anyhow::bail!("chat turn failed: {e}");
            }
        };

        Ok(self.persist_turn(thread_id, user_text, &reply))
    }

    async fn build_request(
        &self,
        thread_id: &str,
        user_text: &str,
        extra_context: Option<&str>,
        image: Option<ContentPart>,
    ) -> ChatRequest {
        let mut messages = vec![ChatMessage::system(&self.system_prompt)];

        match self.recall_context(user_text).await {
            Ok(Some(context)) => messages.push(ChatMessage::system(context)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "memory recall failed, continuing without"),
        }

        if let Some(extra) = extra_context {
            let mut window = extra;
            if window.len() > self.context_window {
                let mut cut = self.context_window;
                while cut > 0 && !window.is_char_boundary(cut) {
                    cut -= 1;
                }
                window = &window[..cut];
            }
            messages.push(ChatMessage::system(format!(
                "Attached file content:\n{window}"
            )));
        }

        match self.store.recent_messages(thread_id, HISTORY_LIMIT).await {
            Ok(history) => {
                for message in history {
                    match message.role {
                        MessageRole::User => messages.push(ChatMessage::user(message.content)),
                        MessageRole::Assistant => {
                            messages.push(ChatMessage::assistant(message.content))
                        }
                        // Tool/system turns are not replayed into chat.
                        _ => {}
                    }
                }
            }
            Err(e) => warn!(error = %e, "history load failed, continuing without"),
        }

        match image {
            Some(image) => messages.push(ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: user_text.to_string(),
                },
                image,
            ])),
            None => messages.push(ChatMessage::user(user_text)),
        }

        ChatRequest::new(self.model.clone(), messages)
    }

    /// Long-term memory context: one embedding, then related past
    /// messages and document chunks.
    async fn recall_context(&self, user_text: &str) -> anyhow::Result<Option<String>> {
        let vectors = self.embedder.embed(&[user_text.to_string()]).await?;
        let Some(embedding) = vectors.into_iter().next() else {
            return Ok(None);
        };

        let (messages, chunks) = tokio::join!(
            self.store.search_messages(&embedding, self.vector_top_k),
            self.store.search_chunks(&embedding, self.vector_top_k, &[]),
        );

        let mut lines = Vec::new();
        for hit in messages.unwrap_or_default() {
            if hit.score > 0.0 {
                lines.push(format!("- {}", truncate_string(&hit.item.content, 200)));
            }
        }
        for hit in chunks.unwrap_or_default() {
            if hit.score > 0.0 {
                lines.push(format!("- {}", truncate_string(&hit.item.content, 200)));
            }
        }

        if lines.is_empty() {
            Ok(None)
        } else {
            debug!(facts = lines.len(), "memory context recalled");
            Ok(Some(format!(
                "Possibly relevant long-term memory:\n{}",
                lines.join("\n")
            )))
        }
    }

    /// Stream tokens into the placeholder; fall back to a blocking call
    /// when streaming is unavailable.
    async fn stream_into(
        &self,
        frontend: &Arc<dyn Frontend>,
        chat_id: &str,
        placeholder: &str,
        request: &ChatRequest,
    ) -> anyhow::Result<String> {
        let mut stream = match self.provider.chat_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(error = %e, "streaming unavailable, falling back");
                let response = self.provider.chat(request).await;
                if let Some(error) = response.error {
                    anyhow::bail!(error);
                }
                let text = response.content.unwrap_or_default();
                frontend.edit_formatted(chat_id, placeholder, &text).await?;
                return Ok(text);
            }
        };

        let mut text = String::new();
        let mut since_edit = 0usize;
        while let Some(token) = stream.next().await {
            text.push_str(&token?);
            since_edit += 1;
            if since_edit >= EDIT_EVERY_TOKENS {
                since_edit = 0;
                // Progress edits are best effort.
                let _ = frontend.edit(chat_id, placeholder, &text).await;
            }
        }

        if text.is_empty() {
            anyhow::bail!("empty response from provider");
        }
        frontend.edit_formatted(chat_id, placeholder, &text).await?;
        Ok(text)
    }

    /// Persist the (user, assistant) pair off the request path, with
    /// best-effort embedding backfill.
    fn persist_turn(&self, thread_id: &str, user_text: &str, reply: &str) -> JoinHandle<()> {
        let store = self.store.clone();
        let embedder = self.embedder.clone();
        let thread_id = thread_id.to_string();
        let user_text = user_text.to_string();
        let reply = reply.to_string();

        tokio::spawn(async move {
            let user = StoredMessage::new(&thread_id, MessageRole::User, &user_text);
            let assistant = StoredMessage::new(&thread_id, MessageRole::Assistant, &reply);

            for message in [&user, &assistant] {
                if let Err(e) = store.insert_message(message).await {
                    warn!(error = %e, "failed to persist turn");
                    return;
                }
            }
            let _ = store.touch_thread(&thread_id).await;

            match embedder.embed(&[user_text, reply]).await {
                Ok(vectors) => {
                    for (message, vector) in [&user, &assistant].iter().zip(vectors) {
                        if let Err(e) = store.set_message_embedding(&message.id, &vector).await {
                            warn!(error = %e, "embedding backfill failed");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "embedding backfill failed"),
            }
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::IncomingMessage;
    use async_trait::async_trait;
    use oasis_core::model::Thread;
    use oasis_core::types::{ChatResponse, ToolDefinition};
    use oasis_providers::TokenStream;
    use oasis_store::SqliteStore;
    use std::sync::Mutex;

    struct RecordingFrontend {
        sent: Mutex<Vec<String>>,
        edits: Mutex<Vec<String>>,
    }

    impl RecordingFrontend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                edits: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Frontend for RecordingFrontend {
        async fn poll(&self) -> Option<IncomingMessage> {
            None
        }
        async fn send(&self, _chat_id: &str, text: &str) -> anyhow::Result<String> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok("msg_1".to_string())
        }
        async fn edit(&self, _chat_id: &str, _message_id: &str, text: &str) -> anyhow::Result<()> {
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }
        async fn send_typing(&self, _chat_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn download_file(&self, _file_id: &str) -> anyhow::Result<(Vec<u8>, String)> {
            anyhow::bail!("no files")
        }
    }

    /// Streams fixed tokens; falls back to `chat` content when `stream`
    /// is disabled.
    struct StreamingProvider {
        tokens: Vec<String>,
        streaming: bool,
        last_request: Mutex<Option<ChatRequest>>,
    }

    #[async_trait]
    impl ChatProvider for StreamingProvider {
        async fn chat(&self, request: &ChatRequest) -> ChatResponse {
            *self.last_request.lock().unwrap() = Some(request.clone());
            ChatResponse {
                content: Some("blocking reply".into()),
                ..Default::default()
            }
        }
        async fn chat_with_tools(
            &self,
            request: &ChatRequest,
            _tools: &[ToolDefinition],
        ) -> ChatResponse {
            self.chat(request).await
        }
        async fn chat_stream(&self, request: &ChatRequest) -> anyhow::Result<TokenStream> {
            if !self.streaming {
                anyhow::bail!("streaming disabled");
            }
            *self.last_request.lock().unwrap() = Some(request.clone());
            let tokens = self.tokens.clone();
            Ok(Box::pin(futures::stream::iter(
                tokens.into_iter().map(Ok),
            )))
        }
        fn name(&self) -> &str {
            "streaming"
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
        fn dimensions(&self) -> usize {
            3
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    async fn setup(
        tokens: Vec<&str>,
        streaming: bool,
    ) -> (ChatPath, Arc<SqliteStore>, Arc<StreamingProvider>, String) {
        let store = Arc::new(SqliteStore::open_in_memory(Some(3)).await.unwrap());
        let thread = Thread::new("chat_1", "test");
        store.create_thread(&thread).await.unwrap();

        let provider = Arc::new(StreamingProvider {
            tokens: tokens.into_iter().map(String::from).collect(),
            streaming,
            last_request: Mutex::new(None),
        });

        let chat = ChatPath::new(
            provider.clone(),
            Arc::new(FixedEmbedder),
            store.clone(),
            "chat-model",
            "You are Oasis.",
            4096,
            5,
        );
        (chat, store, provider, thread.id)
    }

    #[tokio::test]
    async fn test_streamed_reply_edits_placeholder_and_persists() {
        let (chat, store, _, thread_id) = setup(vec!["Hel", "lo ", "there"], true).await;
        let frontend: Arc<dyn Frontend> = RecordingFrontend::new();

        let persist = chat
            .respond(&frontend, "chat_1", &thread_id, "hi!", None, None)
            .await
            .unwrap();
        persist.await.unwrap();

        let messages = store.recent_messages(&thread_id, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hi!");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "Hello there");
        // Embeddings were backfilled.
        assert!(messages[1].embedding.is_some());
    }

    #[tokio::test]
    async fn test_fallback_to_blocking_chat() {
        let (chat, store, _, thread_id) = setup(vec![], false).await;
        let frontend = RecordingFrontend::new();
        let dyn_frontend: Arc<dyn Frontend> = frontend.clone();

        let persist = chat
            .respond(&dyn_frontend, "chat_1", &thread_id, "hi!", None, None)
            .await
            .unwrap();
        persist.await.unwrap();

        assert_eq!(frontend.edits.lock().unwrap().last().unwrap(), "blocking reply");
        let messages = store.recent_messages(&thread_id, 10).await.unwrap();
        assert_eq!(messages[1].content, "blocking reply");
    }

    #[tokio::test]
    async fn test_memory_context_enters_prompt() {
        let (chat, store, provider, thread_id) = setup(vec!["ok"], true).await;

        // Seed a past embedded message that should be recalled.
        let other_thread = Thread::new("chat_1", "old");
        store.create_thread(&other_thread).await.unwrap();
        let mut old = StoredMessage::new(&other_thread.id, MessageRole::User, "I live in Lisbon");
        old.embedding = Some(vec![1.0, 0.0, 0.0]);
        store.insert_message(&old).await.unwrap();

        let frontend: Arc<dyn Frontend> = RecordingFrontend::new();
        let persist = chat
            .respond(&frontend, "chat_1", &thread_id, "where am I from?", None, None)
            .await
            .unwrap();
        persist.await.unwrap();

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        let joined = serde_json::to_string(&request.messages).unwrap();
        assert!(joined.contains("Possibly relevant long-term memory"));
        assert!(joined.contains("I live in Lisbon"));
    }

    #[tokio::test]
    async fn test_extra_context_truncated_to_window() {
        let (chat, _, provider, thread_id) = setup(vec!["ok"], true).await;
        let frontend: Arc<dyn Frontend> = RecordingFrontend::new();

        let long = "x".repeat(10_000);
        let persist = chat
            .respond(&frontend, "chat_1", &thread_id, "summarise", Some(&long), None)
            .await
            .unwrap();
        persist.await.unwrap();

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        let attached = request
            .messages
            .iter()
            .filter_map(|m| match m {
                ChatMessage::System { content } => Some(content),
                _ => None,
            })
            .find(|c| c.starts_with("Attached file content"))
            .unwrap()
            .clone();
        assert!(attached.len() <= 4096 + 32);
    }

    #[tokio::test]
    async fn test_failure_replaces_placeholder_with_error() {
        struct BrokenProvider;

        #[async_trait]
        impl ChatProvider for BrokenProvider {
            async fn chat(&self, _request: &ChatRequest) -> ChatResponse {
                ChatResponse::error("Error calling LLM: 500")
            }
            async fn chat_with_tools(
                &self,
                _request: &ChatRequest,
                _tools: &[ToolDefinition],
            ) -> ChatResponse {
                ChatResponse::error("Error calling LLM: 500")
            }
            async fn chat_stream(&self, _request: &ChatRequest) -> anyhow::Result<TokenStream> {
                anyhow::bail!("no stream")
            }
            fn name(&self) -> &str {
                "broken"
            }
        }

        let store = Arc::new(SqliteStore::open_in_memory(Some(3)).await.unwrap());
        let thread = Thread::new("chat_1", "t");
        store.create_thread(&thread).await.unwrap();
        let chat = ChatPath::new(
            Arc::new(BrokenProvider),
            Arc::new(FixedEmbedder),
            store.clone(),
            "m",
            "sys",
            4096,
            5,
        );

        let frontend = RecordingFrontend::new();
        let dyn_frontend: Arc<dyn Frontend> = frontend.clone();
        let result = chat
            .respond(&dyn_frontend, "chat_1", &thread.id, "hi", None, None)
            .await;

        assert!(result.is_err());
        let edits = frontend.edits.lock().unwrap();
        assert!(edits.last().unwrap().contains("Sorry, I couldn't reply"));
        // Nothing persisted for the failed turn.
        assert!(store.recent_messages(&thread.id, 10).await.unwrap().is_empty());
    }
}
