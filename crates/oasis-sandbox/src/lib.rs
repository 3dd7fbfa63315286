//! Sandboxed code execution: an HTTP service running Python/Node
//! snippets in per-session workspaces, and the client the
//! `execute_code` tool talks to it with.

pub mod client;
pub mod exec;
pub mod service;
pub mod types;
pub mod workspace;

pub use client::SandboxClient;
pub use service::{build_router, SandboxConfig};
pub use types::{ExecuteRequest, ExecuteResponse, FilePayload, SandboxRuntime};
