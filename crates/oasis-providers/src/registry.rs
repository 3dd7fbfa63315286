//! Provider registry — static specs for the OpenAI-compatible backends
//! Oasis knows how to talk to, keyed by the `provider` config value.

/// Static description of a provider backend.
#[derive(Clone, Copy, Debug)]
pub struct ProviderSpec {
    /// Config key (e.g. `"openai"`).
    pub name: &'static str,
    /// Display name for logging.
    pub display_name: &'static str,
    /// Default API base URL.
    pub default_api_base: &'static str,
}

/// All known provider specs.
pub const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openai",
        display_name: "OpenAI",
        default_api_base: "https://api.openai.com/v1",
    },
    ProviderSpec {
        name: "anthropic",
        display_name: "Anthropic",
        default_api_base: "https://api.anthropic.com/v1",
    },
    ProviderSpec {
        name: "openrouter",
        display_name: "OpenRouter",
        default_api_base: "https://openrouter.ai/api/v1",
    },
    ProviderSpec {
        name: "deepseek",
        display_name: "DeepSeek",
        default_api_base: "https://api.deepseek.com/v1",
    },
    ProviderSpec {
        name: "groq",
        display_name: "Groq",
        default_api_base: "https://api.groq.com/openai/v1",
    },
    ProviderSpec {
        name: "ollama",
        display_name: "Ollama",
        default_api_base: "http://localhost:11434/v1",
    },
];

/// Look up a provider spec by its config name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|p| p.name == name)
}
