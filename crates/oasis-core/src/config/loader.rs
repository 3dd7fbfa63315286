//! Config loader — reads `~/.oasis/config.json` and applies `OASIS_`
//! environment overrides.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.oasis/config.json`
//! 3. Environment variables `OASIS_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't
/// be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;
    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `OASIS_<SECTION>__<FIELD>` (double underscore as the
/// section delimiter), e.g. `OASIS_LLM__API_KEY`.
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("OASIS_TELEGRAM__TOKEN") {
        config.telegram.token = val;
    }
    if let Ok(val) = std::env::var("OASIS_TELEGRAM__ALLOWED_USER_ID") {
        config.telegram.allowed_user_id = Some(val);
    }

    if let Ok(val) = std::env::var("OASIS_LLM__PROVIDER") {
        config.llm.provider = val;
    }
    if let Ok(val) = std::env::var("OASIS_LLM__MODEL") {
        config.llm.model = val;
    }
    if let Ok(val) = std::env::var("OASIS_LLM__API_KEY") {
        config.llm.api_key = val;
    }

    if let Ok(val) = std::env::var("OASIS_EMBEDDING__PROVIDER") {
        config.embedding.provider = val;
    }
    if let Ok(val) = std::env::var("OASIS_EMBEDDING__MODEL") {
        config.embedding.model = val;
    }
    if let Ok(val) = std::env::var("OASIS_EMBEDDING__DIMENSIONS") {
        if let Ok(n) = val.parse::<usize>() {
            config.embedding.dimensions = n;
        }
    }
    if let Ok(val) = std::env::var("OASIS_EMBEDDING__API_KEY") {
        config.embedding.api_key = val;
    }

    if let Ok(val) = std::env::var("OASIS_DATABASE__PATH") {
        config.database.path = val;
    }
    if let Ok(val) = std::env::var("OASIS_DATABASE__TURSO_URL") {
        config.database.turso_url = Some(val);
    }
    if let Ok(val) = std::env::var("OASIS_DATABASE__TURSO_TOKEN") {
        config.database.turso_token = Some(val);
    }

    if let Ok(val) = std::env::var("OASIS_BRAIN__CONTEXT_WINDOW") {
        if let Ok(n) = val.parse::<usize>() {
            config.brain.context_window = n;
        }
    }
    if let Ok(val) = std::env::var("OASIS_BRAIN__VECTOR_TOP_K") {
        if let Ok(n) = val.parse::<usize>() {
            config.brain.vector_top_k = n;
        }
    }
    if let Ok(val) = std::env::var("OASIS_BRAIN__TIMEZONE_OFFSET") {
        if let Ok(n) = val.parse::<i32>() {
            config.brain.timezone_offset = n;
        }
    }
    if let Ok(val) = std::env::var("OASIS_BRAIN__WORKSPACE_PATH") {
        config.brain.workspace_path = val;
    }

    if let Ok(val) = std::env::var("OASIS_INTENT__PROVIDER") {
        config.intent.provider = Some(val);
    }
    if let Ok(val) = std::env::var("OASIS_INTENT__MODEL") {
        config.intent.model = Some(val);
    }
    if let Ok(val) = std::env::var("OASIS_INTENT__API_KEY") {
        config.intent.api_key = Some(val);
    }

    if let Ok(val) = std::env::var("OASIS_ACTION__PROVIDER") {
        config.action.provider = Some(val);
    }
    if let Ok(val) = std::env::var("OASIS_ACTION__MODEL") {
        config.action.model = Some(val);
    }
    if let Ok(val) = std::env::var("OASIS_ACTION__API_KEY") {
        config.action.api_key = Some(val);
    }

    if let Ok(val) = std::env::var("OASIS_SEARCH__BRAVE_API_KEY") {
        config.search.brave_api_key = val;
    }

    if let Ok(val) = std::env::var("OASIS_OBSERVER__ENABLED") {
        config.observer.enabled = val == "true" || val == "1";
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
