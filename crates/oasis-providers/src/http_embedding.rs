//! HTTP embedding provider for OpenAI-compatible `/embeddings` endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::registry::find_by_name;
use crate::traits::EmbeddingProvider;

/// An embedding provider talking to any OpenAI-compatible HTTP API.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: usize,
    display_name: String,
}

impl HttpEmbeddingProvider {
    pub fn new(
        provider: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        api_base: Option<String>,
    ) -> Self {
        let spec = find_by_name(provider);
        let api_base = api_base
            .or_else(|| spec.map(|s| s.default_api_base.to_string()))
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let display_name = spec
            .map(|s| s.display_name.to_string())
            .unwrap_or_else(|| provider.to_string());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        HttpEmbeddingProvider {
            client,
            api_base,
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
            display_name,
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.api_base.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = %self.display_name, batch = texts.len(), "embedding texts");

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding API error: {status} — {body}");
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            anyhow::bail!(
                "embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            );
        }

        parsed.data.sort_by_key(|d| d.index);
        let mut vectors = Vec::with_capacity(parsed.data.len());
        for datum in parsed.data {
            if datum.embedding.len() != self.dimensions {
                anyhow::bail!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimensions,
                    datum.embedding.len()
                );
            }
            vectors.push(datum.embedding);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.display_name
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
