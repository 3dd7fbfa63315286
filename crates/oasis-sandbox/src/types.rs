//! Wire types of the sandbox HTTP contract.

use serde::{Deserialize, Serialize};

/// Supported runtimes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxRuntime {
    Python,
    Node,
}

impl SandboxRuntime {
    /// File name the code is written to inside the workspace.
    pub fn entry_file(&self) -> &'static str {
        match self {
            SandboxRuntime::Python => "main.py",
            SandboxRuntime::Node => "main.js",
        }
    }
}

/// A file travelling in or out of the sandbox, base64-encoded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilePayload {
    pub name: String,
    /// Base64 content.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// `POST /execute` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub execution_id: String,
    pub code: String,
    pub runtime: SandboxRuntime,
    /// Seconds; defaults to 30, capped at 300.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub files: Vec<FilePayload>,
}

/// `POST /execute` response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Captured stdout (JSON of the structured result where the code
    /// prints one).
    pub output: String,
    /// Captured stderr.
    pub logs: String,
    pub exit_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Files the run produced.
    #[serde(default)]
    pub files: Vec<FilePayload>,
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 300;

impl ExecuteRequest {
    /// Effective timeout with default and cap applied.
    pub fn effective_timeout(&self) -> u64 {
        self.timeout
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS)
    }
}
