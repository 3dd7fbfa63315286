//! Processor chain — hooks around LLM calls and tool executions.
//!
//! Processors declare their hooks up front and are bucketed at
//! registration, so each hook site iterates only the processors that
//! implement it. A `Halt` terminates the agent with the given response
//! as output and no error; any other processor error is fatal for the
//! current execution.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use oasis_core::types::{ChatRequest, ChatResponse, ToolCall};

/// Hook sites a processor can participate in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hooks {
    pub pre_llm: bool,
    pub post_llm: bool,
    pub post_tool: bool,
}

impl Hooks {
    pub const PRE_LLM: Hooks = Hooks {
        pre_llm: true,
        post_llm: false,
        post_tool: false,
    };
    pub const POST_LLM: Hooks = Hooks {
        pre_llm: false,
        post_llm: true,
        post_tool: false,
    };
    pub const POST_TOOL: Hooks = Hooks {
        pre_llm: false,
        post_llm: false,
        post_tool: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.pre_llm && !self.post_llm && !self.post_tool
    }
}

/// Error returned by processor hooks.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Terminate the agent with this response as output, no error.
    #[error("halted")]
    Halt(String),

    /// Fatal for the current agent execution.
    #[error("{0}")]
    Fatal(String),
}

/// A hook plugged into the agent loop.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    /// Which hooks this processor implements. Must be non-empty.
    fn hooks(&self) -> Hooks;

    /// Mutate the outgoing chat request.
    async fn pre_llm(&self, _request: &mut ChatRequest) -> Result<(), ProcessorError> {
        Ok(())
    }

    /// Mutate the chat response before tool dispatch.
    async fn post_llm(&self, _response: &mut ChatResponse) -> Result<(), ProcessorError> {
        Ok(())
    }

    /// Mutate a tool result before it is appended to history.
    async fn post_tool(&self, _call: &ToolCall, _result: &mut String) -> Result<(), ProcessorError> {
        Ok(())
    }
}

/// Processors bucketed by hook; read-only after construction.
#[derive(Default)]
pub struct ProcessorChain {
    pre_llm: Vec<Arc<dyn Processor>>,
    post_llm: Vec<Arc<dyn Processor>>,
    post_tool: Vec<Arc<dyn Processor>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor. Execution order within a hook equals
    /// registration order. A processor declaring no hooks is rejected.
    pub fn add(&mut self, processor: Arc<dyn Processor>) -> anyhow::Result<()> {
        let hooks = processor.hooks();
        if hooks.is_empty() {
            anyhow::bail!(
                "processor '{}' implements no hooks",
                processor.name()
            );
        }
        if hooks.pre_llm {
            self.pre_llm.push(processor.clone());
        }
        if hooks.post_llm {
            self.post_llm.push(processor.clone());
        }
        if hooks.post_tool {
            self.post_tool.push(processor);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pre_llm.is_empty() && self.post_llm.is_empty() && self.post_tool.is_empty()
    }

    pub async fn run_pre_llm(&self, request: &mut ChatRequest) -> Result<(), ProcessorError> {
        for processor in &self.pre_llm {
            processor.pre_llm(request).await?;
        }
        Ok(())
    }

    pub async fn run_post_llm(&self, response: &mut ChatResponse) -> Result<(), ProcessorError> {
        for processor in &self.post_llm {
            processor.post_llm(response).await?;
        }
        Ok(())
    }

    pub async fn run_post_tool(
        &self,
        call: &ToolCall,
        result: &mut String,
    ) -> Result<(), ProcessorError> {
        for processor in &self.post_tool {
            processor.post_tool(call, result).await?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use oasis_core::types::ChatMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TagProcessor {
        tag: &'static str,
    }

    #[async_trait]
    impl Processor for TagProcessor {
        fn name(&self) -> &str {
            self.tag
        }
        fn hooks(&self) -> Hooks {
            Hooks::PRE_LLM
        }
        async fn pre_llm(&self, request: &mut ChatRequest) -> Result<(), ProcessorError> {
            request
                .messages
                .push(ChatMessage::system(format!("tag:{}", self.tag)));
            Ok(())
        }
    }

    struct HaltingProcessor;

    #[async_trait]
    impl Processor for HaltingProcessor {
        fn name(&self) -> &str {
            "halting"
        }
        fn hooks(&self) -> Hooks {
            Hooks::PRE_LLM
        }
        async fn pre_llm(&self, _request: &mut ChatRequest) -> Result<(), ProcessorError> {
            Err(ProcessorError::Halt("halted early".into()))
        }
    }

    struct HooklessProcessor;

    #[async_trait]
    impl Processor for HooklessProcessor {
        fn name(&self) -> &str {
            "hookless"
        }
        fn hooks(&self) -> Hooks {
            Hooks::default()
        }
    }

    struct CountingToolProcessor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Processor for CountingToolProcessor {
        fn name(&self) -> &str {
            "counting"
        }
        fn hooks(&self) -> Hooks {
            Hooks::POST_TOOL
        }
        async fn post_tool(
            &self,
            _call: &ToolCall,
            result: &mut String,
        ) -> Result<(), ProcessorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            result.push_str(" [seen]");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_registration_order_preserved() {
        let mut chain = ProcessorChain::new();
        chain.add(Arc::new(TagProcessor { tag: "first" })).unwrap();
        chain.add(Arc::new(TagProcessor { tag: "second" })).unwrap();

        let mut request = ChatRequest::new("m", vec![]);
        chain.run_pre_llm(&mut request).await.unwrap();

        let tags: Vec<String> = request
            .messages
            .iter()
            .map(|m| serde_json::to_value(m).unwrap()["content"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(tags, vec!["tag:first", "tag:second"]);
    }

    #[tokio::test]
    async fn test_halt_short_circuits() {
        let mut chain = ProcessorChain::new();
        chain.add(Arc::new(HaltingProcessor)).unwrap();
        chain.add(Arc::new(TagProcessor { tag: "after" })).unwrap();

        let mut request = ChatRequest::new("m", vec![]);
        let err = chain.run_pre_llm(&mut request).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Halt(r) if r == "halted early"));
        // No processor after the halt ran.
        assert!(request.messages.is_empty());
    }

    #[test]
    fn test_hookless_processor_rejected() {
        let mut chain = ProcessorChain::new();
        assert!(chain.add(Arc::new(HooklessProcessor)).is_err());
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn test_post_tool_mutates_result() {
        let mut chain = ProcessorChain::new();
        chain
            .add(Arc::new(CountingToolProcessor {
                calls: AtomicUsize::new(0),
            }))
            .unwrap();

        let call = ToolCall::new("c1", "web_search", "{}");
        let mut result = "raw".to_string();
        chain.run_post_tool(&call, &mut result).await.unwrap();
        assert_eq!(result, "raw [seen]");
    }
}
