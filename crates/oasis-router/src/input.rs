//! Chat-frontend input handler.
//!
//! Posts the agent's question as a bot message, binds the message id to
//! the agent in the manager, and blocks on the agent's input channel
//! until the router delivers the user's reply.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use oasis_agent::{InputHandler, InputRequest, InputResponse};

use crate::frontend::Frontend;
use crate::manager::{AgentManager, AgentStatus};

pub struct ChatInputHandler {
    frontend: Arc<dyn Frontend>,
    manager: Arc<AgentManager>,
    chat_id: String,
    agent_id: String,
    /// Receiving side of the agent's input channel; the sender lives in
    /// the manager entry.
    input_rx: Mutex<mpsc::Receiver<String>>,
}

impl ChatInputHandler {
    pub fn new(
        frontend: Arc<dyn Frontend>,
        manager: Arc<AgentManager>,
        chat_id: impl Into<String>,
        agent_id: impl Into<String>,
        input_rx: mpsc::Receiver<String>,
    ) -> Self {
        ChatInputHandler {
            frontend,
            manager,
            chat_id: chat_id.into(),
            agent_id: agent_id.into(),
            input_rx: Mutex::new(input_rx),
        }
    }

    fn format_question(request: &InputRequest) -> String {
        let mut text = request.question.clone();
        if !request.options.is_empty() {
            text.push_str("\n\nOptions:");
            for option in &request.options {
                text.push_str(&format!("\n• {option}"));
            }
        }
        text.push_str("\n\n(reply to this message to answer)");
        text
    }
}

#[async_trait]
impl InputHandler for ChatInputHandler {
    async fn request(&self, request: InputRequest) -> anyhow::Result<InputResponse> {
        self.manager
            .set_status(&self.agent_id, AgentStatus::WaitingForInput);

        let text = Self::format_question(&request);
        let bot_message_id = self.frontend.send(&self.chat_id, &text).await?;
        self.manager.register_message(&bot_message_id, &self.agent_id);
        debug!(
            agent = %self.agent_id,
            bot_message = %bot_message_id,
            "question posted, waiting for reply"
        );

        let value = {
            let mut rx = self.input_rx.lock().await;
            rx.recv()
                .await
                .ok_or_else(|| anyhow::anyhow!("input channel closed"))?
        };

        self.manager.set_status(&self.agent_id, AgentStatus::Running);
        Ok(InputResponse { value })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::IncomingMessage;
    use crate::manager::ActionAgentEntry;
    use std::sync::Mutex as StdMutex;
    use std::time::Instant;

    struct RecordingFrontend {
        sent: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Frontend for RecordingFrontend {
        async fn poll(&self) -> Option<IncomingMessage> {
            None
        }
        async fn send(&self, chat_id: &str, text: &str) -> anyhow::Result<String> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((chat_id.to_string(), text.to_string()));
            Ok(format!("bot_{}", sent.len()))
        }
        async fn edit(&self, _chat_id: &str, _message_id: &str, _text: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn send_typing(&self, _chat_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn download_file(&self, _file_id: &str) -> anyhow::Result<(Vec<u8>, String)> {
            anyhow::bail!("no files")
        }
    }

    #[tokio::test]
    async fn test_question_posted_and_reply_received() {
        let frontend = Arc::new(RecordingFrontend {
            sent: StdMutex::new(Vec::new()),
        });
        let manager = Arc::new(AgentManager::new(1));
        let (tx, rx) = mpsc::channel(1);
        manager.register(ActionAgentEntry {
            id: "agent-1".into(),
            chat_id: "chat".into(),
            description: "test".into(),
            status: AgentStatus::Running,
            started_at: Instant::now(),
            input_tx: tx,
            user_message_id: "u1".into(),
            ack_message_id: None,
        });

        let handler =
            ChatInputHandler::new(frontend.clone(), manager.clone(), "chat", "agent-1", rx);

        let manager_for_reply = manager.clone();
        let ask = tokio::spawn(async move {
            handler
                .request(InputRequest::new(
                    "Tea or coffee?",
                    vec!["tea".into(), "coffee".into()],
                    "agent-1",
                ))
                .await
        });

        // Wait until the question lands, then route the reply the way
        // the router would.
        let bot_message_id = loop {
            if frontend.sent.lock().unwrap().len() == 1 {
                break "bot_1".to_string();
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        };
        assert!(manager_for_reply.route_reply(&bot_message_id, "tea"));

        let response = ask.await.unwrap().unwrap();
        assert_eq!(response.value, "tea");

        let sent = frontend.sent.lock().unwrap();
        assert!(sent[0].1.contains("Tea or coffee?"));
        assert!(sent[0].1.contains("• tea"));
    }

    #[tokio::test]
    async fn test_closed_channel_errors() {
        let frontend = Arc::new(RecordingFrontend {
            sent: StdMutex::new(Vec::new()),
        });
        let manager = Arc::new(AgentManager::new(1));
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(tx);

        let handler = ChatInputHandler::new(frontend, manager, "chat", "agent-x", rx);
        let err = handler
            .request(InputRequest::new("q", Vec::new(), "agent-x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("input channel closed"));
    }
}
