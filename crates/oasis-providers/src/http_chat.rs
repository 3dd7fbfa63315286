//! Generic HTTP chat provider for OpenAI-compatible `/chat/completions`
//! endpoints, with an SSE streaming variant.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error};

use oasis_core::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatRequest, ChatResponse, ToolDefinition,
};

use crate::registry::find_by_name;
use crate::traits::{ChatProvider, TokenStream};

// ─────────────────────────────────────────────
// HttpChatProvider
// ─────────────────────────────────────────────

/// A chat provider talking to any OpenAI-compatible HTTP API.
pub struct HttpChatProvider {
    /// Shared, connection-pooled HTTP client.
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    display_name: String,
}

impl std::fmt::Debug for HttpChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChatProvider")
            .field("api_base", &self.api_base)
            .field("provider", &self.display_name)
            .finish()
    }
}

impl HttpChatProvider {
    /// Create a provider for a named backend. Unknown names default to
    /// the OpenAI API base so custom proxies keep working via
    /// `api_base`.
    pub fn new(provider: &str, api_key: impl Into<String>, api_base: Option<String>) -> Self {
        let spec = find_by_name(provider);
        let api_base = api_base
            .or_else(|| spec.map(|s| s.default_api_base.to_string()))
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let display_name = spec
            .map(|s| s.display_name.to_string())
            .unwrap_or_else(|| provider.to_string());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");

        HttpChatProvider {
            client,
            api_base,
            api_key: api_key.into(),
            display_name,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    fn build_body(
        &self,
        request: &ChatRequest,
        tools: Option<&[ToolDefinition]>,
        stream: bool,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.clone(),
            tools: tools.map(|t| t.to_vec()),
            tool_choice: tools.map(|_| "auto".to_string()),
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            stream,
        }
    }

    async fn send(&self, body: &ChatCompletionRequest) -> ChatResponse {
        debug!(
            provider = %self.display_name,
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, |t| t.len()),
            "calling LLM"
        );

        let result = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await;

        let response = match result {
            Ok(resp) => resp,
            Err(e) => {
                error!(provider = %self.display_name, error = %e, "HTTP request failed");
                return ChatResponse::error(format!("Error calling LLM: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            error!(provider = %self.display_name, status = %status, body = %error_text, "API error");
            return ChatResponse::error(format!("Error calling LLM: {status} — {error_text}"));
        }

        match response.json::<ChatCompletionResponse>().await {
            Ok(raw) => {
                let resp: ChatResponse = raw.into();
                debug!(
                    provider = %self.display_name,
                    has_content = resp.content.is_some(),
                    tool_calls = resp.tool_calls.len(),
                    "LLM response received"
                );
                resp
            }
            Err(e) => {
                error!(provider = %self.display_name, error = %e, "failed to parse LLM response");
                ChatResponse::error(format!("Error parsing LLM response: {e}"))
            }
        }
    }
}

/// One SSE chunk of a streaming completion.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    async fn chat(&self, request: &ChatRequest) -> ChatResponse {
        let body = self.build_body(request, None, false);
        self.send(&body).await
    }

    async fn chat_with_tools(
        &self,
        request: &ChatRequest,
        tools: &[ToolDefinition],
    ) -> ChatResponse {
        let body = self.build_body(request, Some(tools), false);
        self.send(&body).await
    }

    async fn chat_stream(&self, request: &ChatRequest) -> anyhow::Result<TokenStream> {
        let body = self.build_body(request, None, true);

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Error calling LLM: {status} — {error_text}");
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            return None;
                        }
                        match serde_json::from_str::<StreamChunk>(&event.data) {
                            Ok(chunk) => chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta.content)
                                .filter(|t| !t.is_empty())
                                .map(Ok),
                            // Tolerate non-delta frames (role headers, usage).
                            Err(_) => None,
                        }
                    }
                    Err(e) => Some(Err(anyhow::anyhow!("stream error: {e}"))),
                }
            });

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        &self.display_name
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use oasis_core::types::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(model: &str) -> ChatRequest {
        ChatRequest::new(model, vec![ChatMessage::user("Hello")])
    }

    #[test]
    fn test_completions_url_trailing_slash() {
        let provider =
            HttpChatProvider::new("openai", "key", Some("https://api.openai.com/v1/".into()));
        assert_eq!(
            provider.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_default_api_base_for_known_provider() {
        let provider = HttpChatProvider::new("openrouter", "key", None);
        assert_eq!(provider.api_base, "https://openrouter.ai/api/v1");
        assert_eq!(provider.name(), "OpenRouter");
    }

    #[test]
    fn test_unknown_provider_keeps_name() {
        let provider = HttpChatProvider::new("my-proxy", "key", Some("http://proxy/v1".into()));
        assert_eq!(provider.name(), "my-proxy");
        assert_eq!(provider.api_base, "http://proxy/v1");
    }

    #[tokio::test]
    async fn test_chat_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "message": { "content": "Hi! I'm Oasis.", "tool_calls": null },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 9, "completion_tokens": 5, "total_tokens": 14 }
            })))
            .mount(&mock_server)
            .await;

        let provider = HttpChatProvider::new("openai", "test-key", Some(mock_server.uri()));
        let resp = provider.chat(&request("gpt-4o")).await;

        assert_eq!(resp.content.as_deref(), Some("Hi! I'm Oasis."));
        assert_eq!(resp.usage.unwrap().total_tokens, 14);
    }

    #[tokio::test]
    async fn test_chat_with_tools_sends_definitions() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "tool_choice": "auto"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-2",
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "web_search", "arguments": "{\"query\":\"rust\"}" }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": null
            })))
            .mount(&mock_server)
            .await;

        let provider = HttpChatProvider::new("openai", "key", Some(mock_server.uri()));
        let tools = vec![ToolDefinition::new(
            "web_search",
            "Search the web",
            serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        )];
        let resp = provider.chat_with_tools(&request("gpt-4o"), &tools).await;

        assert!(resp.has_tool_calls());
        assert_eq!(resp.tool_calls[0].function.name, "web_search");
    }

    #[tokio::test]
    async fn test_chat_api_error_becomes_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&mock_server)
            .await;

        let provider = HttpChatProvider::new("openai", "key", Some(mock_server.uri()));
        let resp = provider.chat(&request("gpt-4o")).await;

        assert!(resp.is_error());
        let error = resp.error.unwrap();
        assert!(error.contains("Error calling LLM"));
        assert!(error.contains("429"));
    }

    #[tokio::test]
    async fn test_chat_network_error_becomes_error_response() {
        let provider = HttpChatProvider::new("openai", "key", Some("http://127.0.0.1:1".into()));
        let resp = provider.chat(&request("gpt-4o")).await;
        assert!(resp.error.unwrap().contains("Error calling LLM"));
    }

    #[tokio::test]
    async fn test_chat_stream_yields_tokens_in_order() {
        let mock_server = MockServer::start().await;
        let sse_body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo!\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({ "stream": true })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .mount(&mock_server)
            .await;

        let provider = HttpChatProvider::new("openai", "key", Some(mock_server.uri()));
        let mut stream = provider.chat_stream(&request("gpt-4o")).await.unwrap();

        let mut tokens = Vec::new();
        while let Some(token) = stream.next().await {
            tokens.push(token.unwrap());
        }
        assert_eq!(tokens, vec!["Hel", "lo!"]);
    }

    #[tokio::test]
    async fn test_chat_stream_http_error_is_err() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let provider = HttpChatProvider::new("openai", "key", Some(mock_server.uri()));
        assert!(provider.chat_stream(&request("gpt-4o")).await.is_err());
    }
}
