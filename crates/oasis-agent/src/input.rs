//! Human-in-the-loop input: the `ask_user` contract.
//!
//! When an agent has an input handler (its own or one inherited through
//! the context), the synthetic `ask_user` tool is exposed to the LLM.
//! Invoking it parks the agent in `WaitingForInput` until the handler
//! resolves with the human's answer.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use oasis_core::types::ToolDefinition;

/// A question for the human.
#[derive(Clone, Debug)]
pub struct InputRequest {
    pub question: String,
    pub options: Vec<String>,
    /// At least `{agent: <name>, source: "llm"}`.
    pub metadata: HashMap<String, String>,
}

impl InputRequest {
    pub fn new(question: impl Into<String>, options: Vec<String>, agent: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("agent".to_string(), agent.to_string());
        metadata.insert("source".to_string(), "llm".to_string());
        InputRequest {
            question: question.into(),
            options,
            metadata,
        }
    }
}

/// The human's answer.
#[derive(Clone, Debug)]
pub struct InputResponse {
    pub value: String,
}

/// Resolves `ask_user` calls into human answers.
///
/// A failure becomes a tool result containing the error text, so the
/// LLM sees it and may recover.
#[async_trait]
pub trait InputHandler: Send + Sync {
    async fn request(&self, request: InputRequest) -> anyhow::Result<InputResponse>;
}

/// The synthetic tool definition exposed when a handler is available.
pub fn ask_user_definition() -> ToolDefinition {
    ToolDefinition::new(
        "ask_user",
        "Ask the user a question and wait for their reply. Use when you need \
         information or a decision only the user can provide.",
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                },
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional multiple-choice answers"
                }
            },
            "required": ["question"]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metadata() {
        let req = InputRequest::new("Which city?", vec!["Lisbon".into()], "planner");
        assert_eq!(req.metadata.get("agent").unwrap(), "planner");
        assert_eq!(req.metadata.get("source").unwrap(), "llm");
        assert_eq!(req.options, vec!["Lisbon"]);
    }

    #[test]
    fn test_ask_user_definition_shape() {
        let def = ask_user_definition();
        assert_eq!(def.function.name, "ask_user");
        assert_eq!(def.function.parameters["required"][0], "question");
    }
}
