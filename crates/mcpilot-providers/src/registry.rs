//! Provider registry — static specs for the supported LLM providers.
//!
//! Each `ProviderSpec` describes how to reach one OpenAI-compatible endpoint:
//! keywords for model matching, env var names, API bases, quirks, etc.

use std::collections::HashMap;

// ─────────────────────────────────────────────
// ProviderSpec — static metadata for one provider
// ─────────────────────────────────────────────

/// Static specification describing one LLM provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name, also the config key (e.g. `"deepseek"`).
    pub name: &'static str,
    /// Keywords to match in model names (lowercase).
    pub keywords: &'static [&'static str],
    /// The provider's own environment variable for the API key.
    pub env_key: &'static str,
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Gateways (OpenRouter) route any model and are the fallback.
    pub is_gateway: bool,
    /// Self-hosted endpoint (vLLM); never matched by keyword.
    pub is_local: bool,
    /// If the API key starts with this prefix, auto-detect this provider.
    pub detect_by_key_prefix: Option<&'static str>,
    /// Default API base URL.
    pub default_api_base: &'static str,
    /// Per-model parameter overrides.
    pub model_overrides: &'static [ModelOverride],
}

/// A per-model parameter override.
#[derive(Clone, Debug)]
pub struct ModelOverride {
    /// Substring to match in the lowercase model name.
    pub pattern: &'static str,
    /// The field to override.
    pub field: OverrideField,
    /// The value to set.
    pub value: f64,
}

/// Fields that can be overridden per model.
#[derive(Clone, Debug)]
pub enum OverrideField {
    Temperature,
}

// ─────────────────────────────────────────────
// Providers (in matching priority order)
// ─────────────────────────────────────────────

/// Supported provider specifications, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    // OpenRouter — gateway, matched by key prefix "sk-or-"
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        env_key: "OPENROUTER_API_KEY",
        display_name: "OpenRouter",
        is_gateway: true,
        is_local: false,
        detect_by_key_prefix: Some("sk-or-"),
        default_api_base: "https://openrouter.ai/api/v1",
        model_overrides: &[],
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        env_key: "DEEPSEEK_API_KEY",
        display_name: "DeepSeek",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.deepseek.com",
        model_overrides: &[],
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt"],
        env_key: "OPENAI_API_KEY",
        display_name: "OpenAI",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.openai.com/v1",
        model_overrides: &[],
    },
    // Moonshot (Kimi) — Kimi K2.5 forces temperature=1.0
    ProviderSpec {
        name: "moonshot",
        keywords: &["moonshot", "kimi"],
        env_key: "MOONSHOT_API_KEY",
        display_name: "Moonshot",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.moonshot.ai/v1",
        model_overrides: &[ModelOverride {
            pattern: "kimi-k2.5",
            field: OverrideField::Temperature,
            value: 1.0,
        }],
    },
    // vLLM (self-hosted) — api_base normally comes from config
    ProviderSpec {
        name: "vllm",
        keywords: &["vllm"],
        env_key: "HOSTED_VLLM_API_KEY",
        display_name: "vLLM",
        is_gateway: false,
        is_local: true,
        detect_by_key_prefix: None,
        default_api_base: "http://localhost:8000/v1",
        model_overrides: &[],
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a provider spec by matching keywords against a model name.
///
/// Skips gateways and local providers — those are fallback only.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    PROVIDERS.iter().find(|spec| {
        !spec.is_gateway
            && !spec.is_local
            && spec.keywords.iter().any(|kw| model_lower.contains(kw))
    })
}

/// Find a provider spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Detect a gateway from the shape of an API key (e.g. `sk-or-…`).
pub fn find_gateway_by_key(api_key: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|s| {
        s.detect_by_key_prefix
            .is_some_and(|pfx| api_key.starts_with(pfx))
    })
}

/// Resolve the model name sent on the wire.
///
/// Direct providers get a leading `"<provider>/"` stripped
/// (`"deepseek/deepseek-chat"` → `"deepseek-chat"`); gateways route on the
/// full `vendor/model` name and get it unchanged.
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    if spec.is_gateway {
        return model.to_string();
    }
    model
        .strip_prefix(spec.name)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(model)
        .to_string()
}

/// Apply per-model overrides to request parameters.
///
/// Returns the (possibly overridden) temperature.
pub fn apply_model_overrides(model: &str, spec: &ProviderSpec, temperature: f64) -> f64 {
    let model_lower = model.to_lowercase();
    let mut temp = temperature;

    for ovr in spec.model_overrides {
        if model_lower.contains(ovr.pattern) {
            match ovr.field {
                OverrideField::Temperature => temp = ovr.value,
            }
        }
    }

    temp
}

/// Re-export the provider config from core — single source of truth.
pub use mcpilot_core::config::schema::ProviderConfig;

/// Match a model name to a configured provider.
///
/// 1. Keyword match, only if that provider has an API key.
/// 2. Fallback to the first configured gateway, then a configured local server.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a HashMap<String, ProviderConfig>,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    if let Some(spec) = find_by_model(model) {
        if let Some(config) = providers.get(spec.name).filter(|c| c.is_configured()) {
            return Some((config, spec));
        }
    }

    let configured = |spec: &'static ProviderSpec| {
        providers
            .get(spec.name)
            .filter(|c| c.is_configured())
            .map(|c| (c, spec))
    };

    PROVIDERS
        .iter()
        .filter(|s| s.is_gateway)
        .find_map(configured)
        .or_else(|| PROVIDERS.iter().filter(|s| s.is_local).find_map(configured))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
