//! The `Agent` trait — anything that executes a task once.

use async_trait::async_trait;

use crate::context::ExecContext;
use crate::task::{AgentError, AgentTask};

/// An execute-once unit that may perform I/O and spawn sub-agents.
///
/// Implementations must honour `ctx` cancellation promptly at every
/// suspension point.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable name, used by networks to expose the agent as a tool.
    fn name(&self) -> &str;

    /// Short description shown to router LLMs.
    fn description(&self) -> &str;

    /// Run the task to completion and return the final output.
    async fn execute(&self, ctx: &ExecContext, task: AgentTask) -> Result<String, AgentError>;
}
