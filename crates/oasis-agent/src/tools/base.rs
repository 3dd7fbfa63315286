//! Tool trait — the interface every agent tool implements.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use oasis_core::types::ToolDefinition;

use crate::context::ExecContext;

/// Every agent tool implements this trait.
///
/// The agent loop discovers tools via `name()`, sends their schemas to
/// the LLM via `to_definition()`, and dispatches calls via `execute()`.
/// The context carries cancellation and the inherited input handler, so
/// tools that spawn sub-agents propagate both.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the LLM uses to call this tool.
    fn name(&self) -> &str;

    /// Description shown to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema of the parameters:
    /// `{"type": "object", "properties": {...}, "required": [...]}`.
    fn parameters(&self) -> Value;

    /// Execute with the given arguments; the returned string goes back
    /// to the LLM. On failure return `Err` — the registry converts it
    /// into an `error:` tool result the LLM can react to.
    async fn execute(
        &self,
        ctx: &ExecContext,
        params: HashMap<String, Value>,
    ) -> anyhow::Result<String>;

    /// The `ToolDefinition` sent to the LLM. Rarely overridden.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required `String` param.
pub fn require_string(params: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing required parameter: {key}"))
}

/// Extract an optional `String` param.
pub fn optional_string(params: &HashMap<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Extract an optional integer param.
pub fn optional_i64(params: &HashMap<String, Value>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

/// Extract an optional list of strings (absent → empty).
pub fn optional_string_list(params: &HashMap<String, Value>, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_string() {
        let mut params = HashMap::new();
        params.insert("query".into(), json!("rust"));
        assert_eq!(require_string(&params, "query").unwrap(), "rust");
        assert!(require_string(&params, "missing").is_err());
    }

    #[test]
    fn test_require_string_wrong_type() {
        let mut params = HashMap::new();
        params.insert("query".into(), json!(42));
        assert!(require_string(&params, "query").is_err());
    }

    #[test]
    fn test_optional_helpers() {
        let mut params = HashMap::new();
        params.insert("k".into(), json!("v"));
        params.insert("n".into(), json!(7));
        params.insert("list".into(), json!(["a", "b"]));

        assert_eq!(optional_string(&params, "k"), Some("v".into()));
        assert_eq!(optional_string(&params, "absent"), None);
        assert_eq!(optional_i64(&params, "n"), Some(7));
        assert_eq!(optional_string_list(&params, "list"), vec!["a", "b"]);
        assert!(optional_string_list(&params, "absent").is_empty());
    }

    #[tokio::test]
    async fn test_to_definition_default() {
        struct DummyTool;

        #[async_trait]
        impl Tool for DummyTool {
            fn name(&self) -> &str {
                "dummy"
            }
            fn description(&self) -> &str {
                "A test tool"
            }
            fn parameters(&self) -> Value {
                json!({"type": "object", "properties": {}, "required": []})
            }
            async fn execute(
                &self,
                _ctx: &ExecContext,
                _params: HashMap<String, Value>,
            ) -> anyhow::Result<String> {
                Ok("ok".into())
            }
        }

        let def = DummyTool.to_definition();
        assert_eq!(def.function.name, "dummy");
        assert_eq!(def.tool_type, "function");
    }
}
