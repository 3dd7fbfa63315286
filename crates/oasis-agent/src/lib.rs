//! Agent runtime: a generic executor for tool-calling LLM agents with a
//! spawn/await/cancel lifecycle, processor hooks, nested sub-agent
//! networks, and human-in-the-loop input requests.

pub mod agent;
pub mod context;
pub mod handle;
pub mod input;
pub mod llm_agent;
pub mod network;
pub mod observer;
pub mod processor;
pub mod task;
pub mod tools;

pub use agent::Agent;
pub use context::ExecContext;
pub use handle::{spawn, AgentHandle, AgentState};
pub use input::{InputHandler, InputRequest, InputResponse};
pub use llm_agent::LlmAgent;
pub use network::Network;
pub use processor::{Hooks, Processor, ProcessorChain, ProcessorError};
pub use task::{AgentError, AgentResult, AgentTask};
