//! Intent classifier — a one-shot LLM call deciding chat vs action.
//!
//! Fails open toward `action`: the more capable path handles a chatty
//! message gracefully, while the reverse loses the user's task.

use std::sync::Arc;

use tracing::{debug, warn};

use oasis_core::types::{ChatMessage, ChatRequest};
use oasis_providers::ChatProvider;

/// How an inbound text message should be handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Chat,
    Action,
}

const CLASSIFIER_PROMPT: &str = "\
You classify a user message for a personal assistant.
Reply with exactly one JSON object, nothing else:
{\"intent\": \"chat\"} for greetings, small talk, opinions, and questions \
answerable from conversation context alone.
{\"intent\": \"action\"} for anything needing tools: searching, fetching, \
scheduling, remembering, computing, or multi-step work.";

/// Classifies messages with a dedicated (usually small) model.
pub struct IntentClassifier {
    provider: Arc<dyn ChatProvider>,
    model: String,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        IntentClassifier {
            provider,
            model: model.into(),
        }
    }

    /// Classify a message. Any failure (HTTP, malformed JSON, unknown
    /// label) yields `Intent::Action`.
    pub async fn classify(&self, text: &str) -> Intent {
        let mut request = ChatRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::system(CLASSIFIER_PROMPT),
                ChatMessage::user(text),
            ],
        );
        request.max_tokens = 32;
        request.temperature = 0.0;

        let response = self.provider.chat(&request).await;
        if let Some(error) = &response.error {
            warn!(error = %error, "intent classifier failed, defaulting to action");
            return Intent::Action;
        }

        let content = response.content.unwrap_or_default();
        let intent = parse_intent(&content).unwrap_or(Intent::Action);
        debug!(?intent, "intent classified");
        intent
    }
}

/// Extract `{"intent": ...}` from the response, tolerating surrounding
/// prose.
fn parse_intent(content: &str) -> Option<Intent> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    let parsed: serde_json::Value = serde_json::from_str(&content[start..=end]).ok()?;
    match parsed.get("intent")?.as_str()? {
        "chat" => Some(Intent::Chat),
        "action" => Some(Intent::Action),
        _ => None,
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
