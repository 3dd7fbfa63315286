//! HTTP client for the sandbox service.

use tracing::debug;

use crate::types::{ExecuteRequest, ExecuteResponse};

/// Talks to a running sandbox service.
#[derive(Clone)]
pub struct SandboxClient {
    base_url: String,
    http: reqwest::Client,
}

impl SandboxClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        SandboxClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(330))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Run code in the sandbox.
    pub async fn execute(&self, request: &ExecuteRequest) -> anyhow::Result<ExecuteResponse> {
        debug!(execution = %request.execution_id, "sandbox execute");
        let response = self
            .http
            .post(format!("{}/execute", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 503 {
            anyhow::bail!("sandbox busy, retry later");
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("sandbox error {status}: {body}");
        }
        Ok(response.json().await?)
    }

    /// Whether the service answers its health check.
    pub async fn health(&self) -> bool {
        self.http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Drop a session's workspace.
    pub async fn remove_workspace(&self, session_id: &str) -> anyhow::Result<()> {
        let response = self
            .http
            .delete(format!("{}/workspace/{session_id}", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("workspace removal failed: {}", response.status());
        }
        Ok(())
    }
}
