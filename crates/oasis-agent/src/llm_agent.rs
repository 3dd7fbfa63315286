//! LLMAgent — the bounded tool-calling loop.
//!
//! Each iteration: PreLLM processors → provider call → PostLLM
//! processors → tool dispatch (with `ask_user` interception and
//! unknown-tool synthesis) → PostTool processors. Tool failures are
//! internalised as `error:` results so the LLM can self-correct;
//! provider and processor failures terminate the run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use oasis_core::types::{ChatMessage, ChatRequest, ToolCall, ToolDefinition};
use oasis_providers::ChatProvider;

use crate::agent::Agent;
use crate::context::ExecContext;
use crate::handle::AgentState;
use crate::input::{ask_user_definition, InputHandler, InputRequest};
use crate::processor::{ProcessorChain, ProcessorError};
use crate::task::{AgentError, AgentTask};
use crate::tools::ToolRegistry;

/// Default maximum LLM ↔ tool iterations per task.
const DEFAULT_MAX_ITERATIONS: usize = 20;

/// A tool-calling agent around a chat provider.
pub struct LlmAgent {
    name: String,
    description: String,
    provider: Arc<dyn ChatProvider>,
    model: String,
    system_prompt: String,
    tools: Arc<ToolRegistry>,
    chain: Arc<ProcessorChain>,
    input_handler: Option<Arc<dyn InputHandler>>,
    max_iterations: usize,
    max_tokens: u32,
    temperature: f64,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        provider: Arc<dyn ChatProvider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        LlmAgent {
            name: name.into(),
            description: description.into(),
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            tools: Arc::new(ToolRegistry::new()),
            chain: Arc::new(ProcessorChain::new()),
            input_handler: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_chain(mut self, chain: Arc<ProcessorChain>) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_input_handler(mut self, handler: Arc<dyn InputHandler>) -> Self {
        self.input_handler = Some(handler);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f64) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The handler in effect: the agent's own, else the context's.
    pub(crate) fn effective_handler(&self, ctx: &ExecContext) -> Option<Arc<dyn InputHandler>> {
        self.input_handler.clone().or_else(|| ctx.input_handler())
    }

    /// Resolve an `ask_user` call through the input handler.
    async fn handle_ask_user(
        &self,
        ctx: &ExecContext,
        handler: &Arc<dyn InputHandler>,
        params: &HashMap<String, serde_json::Value>,
    ) -> String {
        let question = params
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let options: Vec<String> = params
            .get("options")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        ctx.set_state(AgentState::WaitingForInput);
        let outcome = tokio::select! {
            _ = ctx.cancel_token().cancelled() => Err(anyhow::anyhow!("cancelled while waiting for input")),
            outcome = handler.request(InputRequest::new(question, options, &self.name)) => outcome,
        };
        ctx.set_state(AgentState::Running);

        match outcome {
            Ok(response) => response.value,
            Err(e) => {
                warn!(agent = %self.name, error = %e, "input handler failed");
                format!("error: {e}")
            }
        }
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, ctx: &ExecContext, task: AgentTask) -> Result<String, AgentError> {
        let handler = self.effective_handler(ctx);

        let mut messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(&task.input),
        ];

        let mut tool_defs: Vec<ToolDefinition> = self.tools.definitions();
        if handler.is_some() {
            tool_defs.push(ask_user_definition());
        }

        for iteration in 0..self.max_iterations {
            if ctx.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let mut request = ChatRequest::new(self.model.clone(), messages.clone());
            request.max_tokens = self.max_tokens;
            request.temperature = self.temperature;

            match self.chain.run_pre_llm(&mut request).await {
                Ok(()) => {}
                Err(ProcessorError::Halt(response)) => return Ok(response),
                Err(ProcessorError::Fatal(e)) => return Err(AgentError::Processor(e)),
            }

            debug!(agent = %self.name, iteration, "LLM call");
            let mut response = tokio::select! {
                _ = ctx.cancel_token().cancelled() => return Err(AgentError::Cancelled),
                response = async {
                    if tool_defs.is_empty() {
                        self.provider.chat(&request).await
                    } else {
                        self.provider.chat_with_tools(&request, &tool_defs).await
                    }
                } => response,
            };

            if let Some(error) = response.error.take() {
                return Err(AgentError::Provider(error));
            }

            match self.chain.run_post_llm(&mut response).await {
                Ok(()) => {}
                Err(ProcessorError::Halt(halt)) => return Ok(halt),
                Err(ProcessorError::Fatal(e)) => return Err(AgentError::Processor(e)),
            }

            if !response.has_tool_calls() {
                return Ok(response.content.unwrap_or_default());
            }

            let tool_calls: Vec<ToolCall> = response.tool_calls.clone();
            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                tool_calls.clone(),
            ));

            for call in &tool_calls {
                let params: HashMap<String, serde_json::Value> =
                    serde_json::from_str(&call.function.arguments).unwrap_or_default();

                info!(
                    agent = %self.name,
                    tool = %call.function.name,
                    iteration,
                    "executing tool call"
                );

                let mut result = if call.function.name == "ask_user" {
                    match &handler {
                        Some(handler) => self.handle_ask_user(ctx, handler, &params).await,
                        None => "error: unknown tool 'ask_user'".to_string(),
                    }
                } else {
                    self.tools.execute(ctx, &call.function.name, params).await
                };

                match self.chain.run_post_tool(call, &mut result).await {
                    Ok(()) => {}
                    Err(ProcessorError::Halt(halt)) => return Ok(halt),
                    Err(ProcessorError::Fatal(e)) => return Err(AgentError::Processor(e)),
                }

                messages.push(ChatMessage::tool_result(&call.id, result));
            }
        }

        warn!(agent = %self.name, "agent loop exhausted iterations");
        Ok(format!(
            "reached max iterations ({}) without a final answer",
            self.max_iterations
        ))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputResponse;
    use crate::processor::{Hooks, Processor};
    use crate::tools::base::Tool;
    use oasis_core::types::{ChatResponse, ToolDefinition};
    use oasis_providers::TokenStream;
    use std::sync::Mutex;

    /// Provider returning canned responses in order.
    pub(crate) struct MockProvider {
        responses: Mutex<Vec<ChatResponse>>,
        pub tool_defs_seen: Mutex<Vec<Vec<String>>>,
    }

    impl MockProvider {
        pub fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                tool_defs_seen: Mutex::new(Vec::new()),
            }
        }

        pub fn simple(text: &str) -> Self {
            Self::new(vec![ChatResponse {
                content: Some(text.into()),
                ..Default::default()
            }])
        }

        fn next(&self) -> ChatResponse {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                ChatResponse {
                    content: Some("(no more responses)".into()),
                    ..Default::default()
                }
            } else {
                responses.remove(0)
            }
        }
    }

    #[async_trait]
    impl ChatProvider for MockProvider {
        async fn chat(&self, _request: &ChatRequest) -> ChatResponse {
            self.tool_defs_seen.lock().unwrap().push(Vec::new());
            self.next()
        }

        async fn chat_with_tools(
            &self,
            _request: &ChatRequest,
            tools: &[ToolDefinition],
        ) -> ChatResponse {
            self.tool_defs_seen
                .lock()
                .unwrap()
                .push(tools.iter().map(|t| t.function.name.clone()).collect());
            self.next()
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> anyhow::Result<TokenStream> {
            anyhow::bail!("not streamed in tests")
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn tool_call_response(name: &str, args: &str) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: vec![ToolCall::new("call_1", name, args)],
            ..Default::default()
        }
    }

    struct UppercaseTool;

    #[async_trait]
    impl Tool for UppercaseTool {
        fn name(&self) -> &str {
            "uppercase"
        }
        fn description(&self) -> &str {
            "Uppercases text"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            _ctx: &ExecContext,
            params: HashMap<String, serde_json::Value>,
        ) -> anyhow::Result<String> {
            Ok(params
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_uppercase())
        }
    }

    fn agent_with(provider: MockProvider) -> LlmAgent {
        LlmAgent::new("tester", "test agent", Arc::new(provider), "mock-model", "You are a test.")
    }

    #[tokio::test]
    async fn test_simple_response() {
        let agent = agent_with(MockProvider::simple("Hello!"));
        let out = agent
            .execute(&ExecContext::root(), AgentTask::new("hi"))
            .await
            .unwrap();
        assert_eq!(out, "Hello!");
    }

    #[tokio::test]
    async fn test_tool_loop_round_trip() {
        let provider = MockProvider::new(vec![
            tool_call_response("uppercase", r#"{"text":"shout"}"#),
            ChatResponse {
                content: Some("It said SHOUT".into()),
                ..Default::default()
            },
        ]);
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(UppercaseTool));
        let agent = agent_with(provider).with_tools(Arc::new(tools));

        let out = agent
            .execute(&ExecContext::root(), AgentTask::new("shout please"))
            .await
            .unwrap();
        assert_eq!(out, "It said SHOUT");
    }

    #[tokio::test]
    async fn test_unknown_tool_synthesised() {
        let provider = MockProvider::new(vec![
            tool_call_response("nonexistent", "{}"),
            ChatResponse {
                content: Some("recovered".into()),
                ..Default::default()
            },
        ]);
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(UppercaseTool));
        let agent = agent_with(provider).with_tools(Arc::new(tools));

        // The unknown tool becomes an error result; the LLM recovers.
        let out = agent
            .execute(&ExecContext::root(), AgentTask::new("x"))
            .await
            .unwrap();
        assert_eq!(out, "recovered");
    }

    #[tokio::test]
    async fn test_max_iterations_diagnostic() {
        let responses: Vec<ChatResponse> = (0..10)
            .map(|_| tool_call_response("uppercase", r#"{"text":"x"}"#))
            .collect();
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(UppercaseTool));
        let agent = agent_with(MockProvider::new(responses))
            .with_tools(Arc::new(tools))
            .with_max_iterations(3);

        let out = agent
            .execute(&ExecContext::root(), AgentTask::new("loop"))
            .await
            .unwrap();
        assert!(out.contains("reached max iterations"));
    }

    #[tokio::test]
    async fn test_provider_error_surfaces() {
        let agent = agent_with(MockProvider::new(vec![ChatResponse::error(
            "Error calling LLM: 503",
        )]));
        let err = agent
            .execute(&ExecContext::root(), AgentTask::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Provider(e) if e.contains("503")));
    }

    struct HaltPre;

    #[async_trait]
    impl Processor for HaltPre {
        fn name(&self) -> &str {
            "halt-pre"
        }
        fn hooks(&self) -> Hooks {
            Hooks::PRE_LLM
        }
        async fn pre_llm(&self, _request: &mut ChatRequest) -> Result<(), ProcessorError> {
            Err(ProcessorError::Halt("halted verbatim".into()))
        }
    }

    #[tokio::test]
    async fn test_halt_returns_response_verbatim_no_error() {
        let mut chain = ProcessorChain::new();
        chain.add(Arc::new(HaltPre)).unwrap();
        let agent = agent_with(MockProvider::simple("never reached")).with_chain(Arc::new(chain));

        let out = agent
            .execute(&ExecContext::root(), AgentTask::new("x"))
            .await
            .unwrap();
        assert_eq!(out, "halted verbatim");
    }

    struct FatalPost;

    #[async_trait]
    impl Processor for FatalPost {
        fn name(&self) -> &str {
            "fatal-post"
        }
        fn hooks(&self) -> Hooks {
            Hooks::POST_LLM
        }
        async fn post_llm(&self, _response: &mut ChatResponse) -> Result<(), ProcessorError> {
            Err(ProcessorError::Fatal("bad response".into()))
        }
    }

    #[tokio::test]
    async fn test_fatal_processor_error_fails_run() {
        let mut chain = ProcessorChain::new();
        chain.add(Arc::new(FatalPost)).unwrap();
        let agent = agent_with(MockProvider::simple("content")).with_chain(Arc::new(chain));

        let err = agent
            .execute(&ExecContext::root(), AgentTask::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Processor(_)));
    }

    struct RecordingHandler {
        requests: Mutex<Vec<InputRequest>>,
        answer: String,
    }

    #[async_trait]
    impl InputHandler for RecordingHandler {
        async fn request(&self, request: InputRequest) -> anyhow::Result<InputResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(InputResponse {
                value: self.answer.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_ask_user_resolved_by_handler() {
        let provider = MockProvider::new(vec![
            tool_call_response("ask_user", r#"{"question":"Which day?","options":["Mon","Tue"]}"#),
            ChatResponse {
                content: Some("Booked for Mon".into()),
                ..Default::default()
            },
        ]);
        let handler = Arc::new(RecordingHandler {
            requests: Mutex::new(Vec::new()),
            answer: "Mon".into(),
        });
        let agent = agent_with(provider).with_input_handler(handler.clone());

        let out = agent
            .execute(&ExecContext::root(), AgentTask::new("book it"))
            .await
            .unwrap();
        assert_eq!(out, "Booked for Mon");

        let requests = handler.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].question, "Which day?");
        assert_eq!(requests[0].options, vec!["Mon", "Tue"]);
        assert_eq!(requests[0].metadata.get("agent").unwrap(), "tester");
    }

    struct FailingHandler;

    #[async_trait]
    impl InputHandler for FailingHandler {
        async fn request(&self, _request: InputRequest) -> anyhow::Result<InputResponse> {
            anyhow::bail!("user went offline")
        }
    }

    #[tokio::test]
    async fn test_ask_user_failure_becomes_tool_result() {
        let provider = MockProvider::new(vec![
            tool_call_response("ask_user", r#"{"question":"hm?"}"#),
            ChatResponse {
                content: Some("proceeding without input".into()),
                ..Default::default()
            },
        ]);
        let agent = agent_with(provider).with_input_handler(Arc::new(FailingHandler));

        // The handler failure is fed back to the LLM, which recovers.
        let out = agent
            .execute(&ExecContext::root(), AgentTask::new("x"))
            .await
            .unwrap();
        assert_eq!(out, "proceeding without input");
    }

    #[tokio::test]
    async fn test_ask_user_without_handler_is_unknown_tool() {
        let provider = MockProvider::new(vec![
            tool_call_response("ask_user", r#"{"question":"hm?"}"#),
            ChatResponse {
                content: Some("ok".into()),
                ..Default::default()
            },
        ]);
        // No handler anywhere: ask_user is not even advertised, and a
        // call to it is answered with an unknown-tool error.
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(UppercaseTool));
        let agent = agent_with(provider).with_tools(Arc::new(tools));

        let out = agent
            .execute(&ExecContext::root(), AgentTask::new("x"))
            .await
            .unwrap();
        assert_eq!(out, "ok");
    }

    #[tokio::test]
    async fn test_ask_user_advertised_only_with_handler() {
        let provider = Arc::new(MockProvider::simple("done"));
        let agent = LlmAgent::new(
            "t",
            "d",
            provider.clone(),
            "m",
            "sys",
        )
        .with_input_handler(Arc::new(RecordingHandler {
            requests: Mutex::new(Vec::new()),
            answer: "x".into(),
        }));

        agent
            .execute(&ExecContext::root(), AgentTask::new("q"))
            .await
            .unwrap();

        let seen = provider.tool_defs_seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains(&"ask_user".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let ctx = ExecContext::root();
        ctx.cancel_token().cancel();
        let agent = agent_with(MockProvider::simple("never"));
        let err = agent.execute(&ctx, AgentTask::new("x")).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }
}
