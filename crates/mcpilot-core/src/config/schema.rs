//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentsConfig`, `ProvidersConfig`, `SkillsConfig`,
//! `ToolsConfig`, `LoggingConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.mcpilot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agents: AgentsConfig,
    pub providers: ProvidersConfig,
    pub skills: SkillsConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
}

// ─────────────────────────────────────────────
// Agents
// ─────────────────────────────────────────────

/// Agent configuration container.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentsConfig {
    pub defaults: AgentDefaults,
}

/// Default agent settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDefaults {
    /// Main (reasoning) model identifier.
    pub model: String,
    /// Lightweight model used for context compaction summaries.
    pub summary_model: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0). Reasoning models ignore it.
    pub temperature: f64,
    /// Maximum tool round-trips per user turn.
    pub max_tool_iterations: u32,
    /// Transcript size, in characters, above which older history is summarized.
    pub context_char_limit: usize,
    /// Most recent messages kept verbatim by a compaction pass.
    pub keep_last_messages: usize,
    /// Refuse to dispatch an operation exposed by more than one loaded skill.
    pub strict_operation_names: bool,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: "deepseek-reasoner".to_string(),
            summary_model: "deepseek-chat".to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            max_tool_iterations: 1000,
            context_char_limit: 1_000_000,
            keep_last_messages: 10,
            strict_operation_names: false,
        }
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single LLM provider (API key, base URL, headers).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication.
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All provider configurations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub moonshot: ProviderConfig,
    #[serde(default)]
    pub vllm: ProviderConfig,
}

impl ProvidersConfig {
    const NAMES: [&'static str; 5] = ["deepseek", "openai", "openrouter", "moonshot", "vllm"];

    /// Get a provider config by name (e.g. `"deepseek"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "deepseek" => Some(&self.deepseek),
            "openai" => Some(&self.openai),
            "openrouter" => Some(&self.openrouter),
            "moonshot" => Some(&self.moonshot),
            "vllm" => Some(&self.vllm),
            _ => None,
        }
    }

    /// Mutable access by name, used when an API key is bootstrapped at runtime.
    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        match name {
            "deepseek" => Some(&mut self.deepseek),
            "openai" => Some(&mut self.openai),
            "openrouter" => Some(&mut self.openrouter),
            "moonshot" => Some(&mut self.moonshot),
            "vllm" => Some(&mut self.vllm),
            _ => None,
        }
    }

    /// Convert to a name-keyed map for use with the provider registry.
    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        Self::NAMES
            .iter()
            .filter_map(|name| self.get_by_name(name).map(|c| (name.to_string(), c.clone())))
            .collect()
    }
}

// ─────────────────────────────────────────────
// Skills
// ─────────────────────────────────────────────

/// Where skills come from and how their servers are launched.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillsConfig {
    /// Directories scanned for `<skill>/SKILL.md` + `<skill>/server.py`.
    pub dirs: Vec<String>,
    /// Interpreter used to launch `server.py` skills.
    pub python: String,
    /// Explicitly configured skill servers, registered before scanned ones.
    pub servers: Vec<SkillServerConfig>,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            dirs: vec!["~/.mcpilot/skills".to_string()],
            python: "python3".to_string(),
            servers: Vec::new(),
        }
    }
}

/// One explicitly configured MCP server.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Path to the capability document (`SKILL.md`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_md: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Tool dispatch configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    /// Per-request timeout, in seconds, for MCP server calls.
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

// ─────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────

/// Conversation log configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Write JSONL + Markdown logs for each session.
    pub session_logs: bool,
    /// Directory for session logs.
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            session_logs: true,
            dir: "~/.mcpilot/logs".to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        let d = &config.agents.defaults;
        assert_eq!(d.model, "deepseek-reasoner");
        assert_eq!(d.summary_model, "deepseek-chat");
        assert_eq!(d.max_tool_iterations, 1000);
        assert_eq!(d.context_char_limit, 1_000_000);
        assert_eq!(d.keep_last_messages, 10);
        assert!(!d.strict_operation_names);
        assert_eq!(config.tools.timeout_secs, 120);
        assert_eq!(config.skills.python, "python3");
        assert!(config.logging.session_logs);
    }

    #[test]
    fn test_config_from_json_camel_case() {
        let json = serde_json::json!({
            "agents": {
                "defaults": {
                    "model": "gpt-4o",
                    "summaryModel": "gpt-4o-mini",
                    "maxToolIterations": 10,
                    "contextCharLimit": 5000,
                    "strictOperationNames": true
                }
            },
            "skills": {
                "dirs": ["/opt/skills"],
                "servers": [{
                    "name": "notes",
                    "command": "node",
                    "args": ["notes.js"],
                    "skillMd": "/opt/notes/SKILL.md",
                    "env": {"NOTES_DIR": "/tmp"}
                }]
            },
            "tools": { "timeoutSecs": 30 }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        let d = &config.agents.defaults;
        assert_eq!(d.model, "gpt-4o");
        assert_eq!(d.summary_model, "gpt-4o-mini");
        assert_eq!(d.max_tool_iterations, 10);
        assert_eq!(d.context_char_limit, 5000);
        assert!(d.strict_operation_names);
        // Defaults preserved for missing fields
        assert_eq!(d.keep_last_messages, 10);
        assert_eq!(config.skills.python, "python3");
        assert_eq!(config.skills.dirs, vec!["/opt/skills"]);
        assert_eq!(config.skills.servers[0].skill_md.as_deref(), Some("/opt/notes/SKILL.md"));
        assert_eq!(config.skills.servers[0].env["NOTES_DIR"], "/tmp");
        assert_eq!(config.tools.timeout_secs, 30);
    }

    #[test]
    fn test_config_json_uses_camel_case() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["agents"]["defaults"].get("maxToolIterations").is_some());
        assert!(json["agents"]["defaults"].get("keepLastMessages").is_some());
        assert!(json["logging"].get("sessionLogs").is_some());
        assert!(json["agents"]["defaults"].get("max_tool_iterations").is_none());
    }

    #[test]
    fn test_provider_config_is_configured() {
        assert!(!ProviderConfig::default().is_configured());
        let with_key = ProviderConfig {
            api_key: "sk-123".to_string(),
            ..Default::default()
        };
        assert!(with_key.is_configured());
    }

    #[test]
    fn test_providers_by_name_and_map() {
        let mut providers = ProvidersConfig::default();
        providers.get_by_name_mut("deepseek").unwrap().api_key = "ds".into();

        assert_eq!(providers.get_by_name("deepseek").unwrap().api_key, "ds");
        assert!(providers.get_by_name("anthropic").is_none());

        let map = providers.to_map();
        assert_eq!(map.len(), 5);
        assert!(map["deepseek"].is_configured());
        assert!(!map["openai"].is_configured());
    }
}
