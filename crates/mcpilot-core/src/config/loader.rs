//! Config loader — reads `~/.mcpilot/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.mcpilot/config.json`
//! 3. Environment variables `MCPILOT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
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
            warn!("Failed to parse config {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
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
/// Env var format: `MCPILOT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `MCPILOT_AGENTS__DEFAULTS__MODEL` → `agents.defaults.model`
/// - `MCPILOT_AGENTS__DEFAULTS__SUMMARY_MODEL` → `agents.defaults.summary_model`
/// - `MCPILOT_AGENTS__DEFAULTS__MAX_TOKENS` → `agents.defaults.max_tokens`
/// - `MCPILOT_AGENTS__DEFAULTS__MAX_TOOL_ITERATIONS` → `agents.defaults.max_tool_iterations`
/// - `MCPILOT_AGENTS__DEFAULTS__CONTEXT_CHAR_LIMIT` → `agents.defaults.context_char_limit`
/// - `MCPILOT_AGENTS__DEFAULTS__KEEP_LAST_MESSAGES` → `agents.defaults.keep_last_messages`
/// - `MCPILOT_PROVIDERS__<NAME>__API_KEY` → `providers.<name>.api_key`
/// - `MCPILOT_PROVIDERS__<NAME>__API_BASE` → `providers.<name>.api_base`
/// - `MCPILOT_TOOLS__TIMEOUT_SECS` → `tools.timeout_secs`
/// - `MCPILOT_SKILLS__PYTHON` → `skills.python`
fn apply_env_overrides(mut config: Config) -> Config {
    let defaults = &mut config.agents.defaults;
    if let Ok(val) = std::env::var("MCPILOT_AGENTS__DEFAULTS__MODEL") {
        defaults.model = val;
    }
    if let Ok(val) = std::env::var("MCPILOT_AGENTS__DEFAULTS__SUMMARY_MODEL") {
        defaults.summary_model = val;
    }
    if let Some(n) = parsed_env("MCPILOT_AGENTS__DEFAULTS__MAX_TOKENS") {
        defaults.max_tokens = n;
    }
    if let Some(n) = parsed_env("MCPILOT_AGENTS__DEFAULTS__MAX_TOOL_ITERATIONS") {
        defaults.max_tool_iterations = n;
    }
    if let Some(n) = parsed_env("MCPILOT_AGENTS__DEFAULTS__CONTEXT_CHAR_LIMIT") {
        defaults.context_char_limit = n;
    }
    if let Some(n) = parsed_env("MCPILOT_AGENTS__DEFAULTS__KEEP_LAST_MESSAGES") {
        defaults.keep_last_messages = n;
    }

    apply_provider_env(&mut config.providers.deepseek, "DEEPSEEK");
    apply_provider_env(&mut config.providers.openai, "OPENAI");
    apply_provider_env(&mut config.providers.openrouter, "OPENROUTER");
    apply_provider_env(&mut config.providers.moonshot, "MOONSHOT");
    apply_provider_env(&mut config.providers.vllm, "VLLM");

    if let Some(secs) = parsed_env("MCPILOT_TOOLS__TIMEOUT_SECS") {
        config.tools.timeout_secs = secs;
    }
    if let Ok(val) = std::env::var("MCPILOT_SKILLS__PYTHON") {
        config.skills.python = val;
    }

    config
}

/// Read an env var and parse it, ignoring unparsable values.
fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {key}={raw}: not a valid number");
            None
        }
    }
}

/// Apply env var overrides for a single provider.
fn apply_provider_env(provider: &mut ProviderConfig, name: &str) {
    if let Ok(val) = std::env::var(format!("MCPILOT_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("MCPILOT_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(val);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
