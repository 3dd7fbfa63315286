//! Network — an agent that dispatches among registered sub-agents.
//!
//! Each sub-agent is exposed to the router LLM as a tool named
//! `agent_<name>` whose single argument is the delegated task input.
//! Execution recurses into the chosen sub-agent with the processor
//! chain and input handler propagated through the context.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use oasis_providers::ChatProvider;

use crate::agent::Agent;
use crate::context::ExecContext;
use crate::input::InputHandler;
use crate::llm_agent::LlmAgent;
use crate::processor::ProcessorChain;
use crate::task::{AgentError, AgentTask};
use crate::tools::base::{require_string, Tool};
use crate::tools::ToolRegistry;

/// Wraps a sub-agent as a router-callable tool.
struct AgentTool {
    agent: Arc<dyn Agent>,
    tool_name: String,
}

impl AgentTool {
    fn new(agent: Arc<dyn Agent>) -> Self {
        let tool_name = format!("agent_{}", agent.name());
        AgentTool { agent, tool_name }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        self.agent.description()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "The task to delegate to this agent"
                }
            },
            "required": ["input"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecContext,
        params: HashMap<String, Value>,
    ) -> anyhow::Result<String> {
        let input = require_string(&params, "input")?;
        debug!(agent = self.agent.name(), "delegating to sub-agent");
        self.agent
            .execute(&ctx.child(), AgentTask::new(input))
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// An agent whose sole role is choosing among sub-agents via an LLM
/// router.
pub struct Network {
    name: String,
    description: String,
    router: LlmAgent,
}

/// Builds a `Network` from its parts.
pub struct NetworkBuilder {
    name: String,
    description: String,
    provider: Arc<dyn ChatProvider>,
    model: String,
    agents: Vec<Arc<dyn Agent>>,
    chain: Arc<ProcessorChain>,
    input_handler: Option<Arc<dyn InputHandler>>,
    max_iterations: Option<usize>,
}

impl Network {
    pub fn builder(
        name: impl Into<String>,
        provider: Arc<dyn ChatProvider>,
        model: impl Into<String>,
    ) -> NetworkBuilder {
        NetworkBuilder {
            name: name.into(),
            description: String::new(),
            provider,
            model: model.into(),
            agents: Vec::new(),
            chain: Arc::new(ProcessorChain::new()),
            input_handler: None,
            max_iterations: None,
        }
    }
}

impl NetworkBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn chain(mut self, chain: Arc<ProcessorChain>) -> Self {
        self.chain = chain;
        self
    }

    pub fn input_handler(mut self, handler: Arc<dyn InputHandler>) -> Self {
        self.input_handler = Some(handler);
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn build(self) -> Network {
        let mut tools = ToolRegistry::new();
        let mut roster = String::new();
        for agent in &self.agents {
            roster.push_str(&format!("- {}: {}\n", agent.name(), agent.description()));
            tools.register(Arc::new(AgentTool::new(agent.clone())));
        }

        let system_prompt = format!(
            "You are a dispatcher. Choose the right agent for the task and \
             delegate via its tool, forwarding the task input. Available \
             agents:\n{roster}\
             Return the chosen agent's answer to the caller."
        );

        let mut router = LlmAgent::new(
            self.name.clone(),
            self.description.clone(),
            self.provider,
            self.model,
            system_prompt,
        )
        .with_tools(Arc::new(tools))
        .with_chain(self.chain);

        if let Some(handler) = self.input_handler {
            router = router.with_input_handler(handler);
        }
        if let Some(max) = self.max_iterations {
            router = router.with_max_iterations(max);
        }

        Network {
            name: self.name,
            description: self.description,
            router,
        }
    }
}

#[async_trait]
impl Agent for Network {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, ctx: &ExecContext, task: AgentTask) -> Result<String, AgentError> {
        // Sub-agents inherit the network's handler through the context.
        let ctx = match self.router.effective_handler(ctx) {
            Some(handler) => ctx.child().with_input_handler(handler),
            None => ctx.child(),
        };
        self.router.execute(&ctx, task).await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
