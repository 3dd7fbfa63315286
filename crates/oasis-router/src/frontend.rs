//! Abstract chat frontend.
//!
//! Concrete bindings (Telegram, console, …) live outside this crate;
//! the router only needs poll/send/edit/typing/download.

use async_trait::async_trait;

/// A file attachment reference on an incoming message.
#[derive(Clone, Debug)]
pub struct IncomingFile {
    /// Frontend-scoped id usable with `download_file`.
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

/// An inbound message from the frontend.
#[derive(Clone, Debug, Default)]
pub struct IncomingMessage {
    pub user_id: String,
    pub chat_id: String,
    pub message_id: String,
    pub reply_to_message_id: Option<String>,
    pub text: String,
    pub caption: Option<String>,
    pub document: Option<IncomingFile>,
    pub photos: Vec<IncomingFile>,
}

impl IncomingMessage {
    pub fn text(user_id: &str, chat_id: &str, message_id: &str, text: &str) -> Self {
        IncomingMessage {
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }
}

impl Default for IncomingFile {
    fn default() -> Self {
        IncomingFile {
            file_id: String::new(),
            file_name: None,
            mime_type: None,
        }
    }
}

/// The chat frontend collaborator.
#[async_trait]
pub trait Frontend: Send + Sync {
    /// Next inbound message; `None` when the frontend shuts down.
    async fn poll(&self) -> Option<IncomingMessage>;

    /// Send a message; returns the sent message's id.
    async fn send(&self, chat_id: &str, text: &str) -> anyhow::Result<String>;

    /// Edit a previously sent message.
    async fn edit(&self, chat_id: &str, message_id: &str, text: &str) -> anyhow::Result<()>;

    /// Edit with frontend-native formatting. Defaults to plain edit.
    async fn edit_formatted(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        self.edit(chat_id, message_id, text).await
    }

    /// Show a typing indicator (best effort).
    async fn send_typing(&self, chat_id: &str) -> anyhow::Result<()>;

    /// Download a file by id; returns bytes and a file name.
    async fn download_file(&self, file_id: &str) -> anyhow::Result<(Vec<u8>, String)>;
}
