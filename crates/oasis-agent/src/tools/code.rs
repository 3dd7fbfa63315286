//! Code execution tool — runs snippets through the sandbox service.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use oasis_sandbox::{ExecuteRequest, SandboxClient, SandboxRuntime};

use crate::context::ExecContext;

use super::base::{optional_i64, optional_string, require_string, Tool};

/// Executes Python or Node code in the sandbox.
pub struct ExecuteCodeTool {
    client: SandboxClient,
    session_id: String,
}

impl ExecuteCodeTool {
    /// `session_id` scopes the sandbox workspace, usually per chat.
    pub fn new(client: SandboxClient, session_id: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Run Python or Node code in a sandbox and return its output. \
         Files written by the code are returned too. Use print/console.log \
         for results."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The code to run"
                },
                "runtime": {
                    "type": "string",
                    "enum": ["python", "node"],
                    "description": "Interpreter to use (default python)"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Seconds before the run is killed (default 30, max 300)"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(
        &self,
        ctx: &ExecContext,
        params: HashMap<String, Value>,
    ) -> anyhow::Result<String> {
        let code = require_string(&params, "code")?;
        let runtime = match optional_string(&params, "runtime").as_deref() {
            None | Some("python") => SandboxRuntime::Python,
            Some("node") => SandboxRuntime::Node,
            Some(other) => anyhow::bail!("unsupported runtime '{other}': use python or node"),
        };

        let request = ExecuteRequest {
            execution_id: oasis_core::utils::new_id(),
            code,
            runtime,
            timeout: optional_i64(&params, "timeout").map(|t| t.max(1) as u64),
            session_id: Some(self.session_id.clone()),
            callback_url: None,
            files: Vec::new(),
        };

        debug!(execution = %request.execution_id, "dispatching to sandbox");
        let response = tokio::select! {
            _ = ctx.cancel_token().cancelled() => anyhow::bail!("cancelled"),
            response = self.client.execute(&request) => response?,
        };

        if let Some(error) = response.error {
            anyhow::bail!("execution failed: {error}");
        }

        let mut out = String::new();
        out.push_str(&format!("exit code: {}\n", response.exit_code));
        if !response.output.is_empty() {
            out.push_str(&format!("output:\n{}\n", response.output.trim_end()));
        }
        if !response.logs.is_empty() {
            out.push_str(&format!("logs:\n{}\n", response.logs.trim_end()));
        }
        if !response.files.is_empty() {
            let names: Vec<&str> = response.files.iter().map(|f| f.name.as_str()).collect();
            out.push_str(&format!("files produced: {}\n", names.join(", ")));
        }
        Ok(out.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(code: &str) -> HashMap<String, Value> {
        let mut params = HashMap::new();
        params.insert("code".into(), json!(code));
        params
    }

    #[tokio::test]
    async fn test_formats_sandbox_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .and(body_partial_json(json!({ "runtime": "python", "session_id": "chat-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": "42\n",
                "logs": "warning: deprecated\n",
                "exit_code": 0,
                "files": [{ "name": "plot.png", "data": "aGk=", "mime": "image/png" }]
            })))
            .mount(&server)
            .await;

        let tool = ExecuteCodeTool::new(SandboxClient::new(server.uri()), "chat-1");
        let out = tool
            .execute(&ExecContext::root(), params("print(42)"))
            .await
            .unwrap();

        assert!(out.contains("exit code: 0"));
        assert!(out.contains("42"));
        assert!(out.contains("warning: deprecated"));
        assert!(out.contains("files produced: plot.png"));
    }

    #[tokio::test]
    async fn test_sandbox_error_bubbles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": "",
                "logs": "",
                "exit_code": -1,
                "error": "execution timed out after 30 seconds",
                "files": []
            })))
            .mount(&server)
            .await;

        let tool = ExecuteCodeTool::new(SandboxClient::new(server.uri()), "chat-1");
        let err = tool
            .execute(&ExecContext::root(), params("while True: pass"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_rejects_unknown_runtime() {
        let tool = ExecuteCodeTool::new(SandboxClient::new("http://127.0.0.1:1"), "c");
        let mut p = params("puts 1");
        p.insert("runtime".into(), json!("ruby"));
        let err = tool.execute(&ExecContext::root(), p).await.unwrap_err();
        assert!(err.to_string().contains("unsupported runtime"));
    }
}
