//! Task and result types for agent execution.

use std::collections::HashMap;

use thiserror::Error;

/// Work handed to an agent.
#[derive(Clone, Debug, Default)]
pub struct AgentTask {
    /// The task input (usually the user's request).
    pub input: String,
    /// Free-form metadata travelling with the task.
    pub metadata: HashMap<String, String>,
}

impl AgentTask {
    pub fn new(input: impl Into<String>) -> Self {
        AgentTask {
            input: input.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Outcome of an agent run, as recorded on its handle.
#[derive(Clone, Debug)]
pub struct AgentResult {
    pub output: String,
    pub error: Option<String>,
}

impl AgentResult {
    pub fn ok(output: impl Into<String>) -> Self {
        AgentResult {
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        AgentResult {
            output: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Errors terminating an agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("cancelled")]
    Cancelled,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("processor error: {0}")]
    Processor(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
