//! Configuration schema.
//!
//! JSON on disk uses the same snake_case keys the documentation lists
//! (`llm.api_key`, `brain.vector_top_k`, …). Unset `intent.api_key`
//! falls back to `llm.api_key`; every unset `action.*` field falls back
//! to the corresponding `llm.*` field.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.oasis/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub database: DatabaseConfig,
    pub brain: BrainConfig,
    pub intent: ModelOverrideConfig,
    pub action: ModelOverrideConfig,
    pub search: SearchConfig,
    pub observer: ObserverConfig,
}

impl Config {
    /// Intent-classifier settings with `llm.*` fallbacks applied.
    pub fn resolved_intent(&self) -> LlmConfig {
        self.resolve_override(&self.intent)
    }

    /// Action-agent settings with `llm.*` fallbacks applied.
    pub fn resolved_action(&self) -> LlmConfig {
        self.resolve_override(&self.action)
    }

    fn resolve_override(&self, over: &ModelOverrideConfig) -> LlmConfig {
        LlmConfig {
            provider: over
                .provider
                .clone()
                .unwrap_or_else(|| self.llm.provider.clone()),
            model: over.model.clone().unwrap_or_else(|| self.llm.model.clone()),
            api_key: over
                .api_key
                .clone()
                .unwrap_or_else(|| self.llm.api_key.clone()),
        }
    }
}

// ─────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────

/// Telegram frontend settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    /// Static allowlist checked when no owner is registered yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_user_id: Option<String>,
}

/// Primary chat LLM settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
        }
    }
}

/// Embedding provider settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub api_key: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            api_key: String::new(),
        }
    }
}

/// Database settings — an embedded file by default, or a remote
/// libSQL/Turso endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the embedded database file. Empty means `~/.oasis/oasis.db`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turso_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turso_token: Option<String>,
}

impl DatabaseConfig {
    /// Resolve the database path, applying the default and `~` expansion.
    pub fn resolved_path(&self) -> std::path::PathBuf {
        if self.path.is_empty() {
            crate::utils::get_default_database_path()
        } else {
            crate::utils::expand_home(&self.path)
        }
    }
}

/// Assistant "brain" tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Byte window for inline file context in chat prompts.
    pub context_window: usize,
    /// Default top-k for memory recall.
    pub vector_top_k: usize,
    /// Hours offset applied when rendering times to the user.
    pub timezone_offset: i32,
    /// Workspace directory for agents. Empty means `~/.oasis/workspace`.
    pub workspace_path: String,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            context_window: 4096,
            vector_top_k: 5,
            timezone_offset: 0,
            workspace_path: String::new(),
        }
    }
}

/// Partial LLM settings for the intent classifier and action agents;
/// unset fields inherit `llm.*`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOverrideConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Web search settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub brave_api_key: String,
}

/// Usage observer settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub enabled: bool,
    pub pricing: PricingConfig,
}

/// Dollar cost per million tokens.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub input: f64,
    pub output: f64,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
