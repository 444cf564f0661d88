//! Shared CLI helpers — path expansion, agent assembly, output.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{info, warn};

use mcpilot_agent::{
    discover_skills, AgentLoop, CompactionPolicy, Compactor, ContextBuilder, SkillDescriptor,
    SkillRegistry, StdioConnector, TurnOutcome,
};
use mcpilot_core::config::Config;
use mcpilot_core::session::SessionLog;
use mcpilot_providers::{create_provider, LlmProvider, LlmRequestConfig};

use crate::printer::ConsolePrinter;

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Every skill the configuration names: explicit servers first, then the
/// scanned directories in order.
pub fn configured_skills(config: &Config) -> Vec<SkillDescriptor> {
    let mut skills: Vec<SkillDescriptor> = config
        .skills
        .servers
        .iter()
        .map(|server| {
            SkillDescriptor::new(
                &server.name,
                &server.command,
                server.args.clone(),
                server.skill_md.as_deref().map(expand_tilde),
                server.env.clone(),
            )
        })
        .collect();
    for dir in &config.skills.dirs {
        skills.extend(discover_skills(&expand_tilde(dir), &config.skills.python));
    }
    skills
}

/// A registry holding every configured skill. Duplicate names keep the first.
pub fn build_registry(config: &Config) -> SkillRegistry {
    let connector = Arc::new(StdioConnector::new(Duration::from_secs(config.tools.timeout_secs)));
    let mut registry =
        SkillRegistry::new(connector).with_strict(config.agents.defaults.strict_operation_names);
    for skill in configured_skills(config) {
        registry.register(skill);
    }
    registry
}

/// Build a started `AgentLoop` from the loaded configuration.
pub fn build_agent(config: &Config) -> Result<AgentLoop> {
    let defaults = &config.agents.defaults;
    let providers = config.providers.to_map();

    let provider: Arc<dyn LlmProvider> = Arc::new(
        create_provider(&defaults.model, &providers)
            .with_context(|| format!("cannot create a provider for model '{}'", defaults.model))?,
    );
    let summary_provider: Arc<dyn LlmProvider> =
        match create_provider(&defaults.summary_model, &providers) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                warn!(
                    model = %defaults.summary_model,
                    error = %e,
                    "No provider for the summary model; summarizing with the main provider"
                );
                Arc::clone(&provider)
            }
        };

    let request_config = LlmRequestConfig {
        max_tokens: defaults.max_tokens,
        temperature: defaults.temperature,
    };
    let compactor = Compactor::new(
        summary_provider,
        CompactionPolicy {
            char_limit: defaults.context_char_limit,
            keep_last: defaults.keep_last_messages,
            summary_model: defaults.summary_model.clone(),
        },
    )
    .with_request_config(request_config.clone());

    let registry = build_registry(config);
    let system_prompt = ContextBuilder::new().build_system_prompt(registry.descriptors());

    let mut agent = AgentLoop::new(provider, registry, compactor)
        .with_model(&defaults.model)
        .with_max_iterations(defaults.max_tool_iterations)
        .with_request_config(request_config);
    agent.add_observer(Box::new(ConsolePrinter::new()));

    if config.logging.session_logs {
        let dir = expand_tilde(&config.logging.dir);
        match SessionLog::create(&dir) {
            Ok(log) => {
                info!(path = %log.jsonl_path().display(), "Session log opened");
                agent.add_observer(Box::new(log));
            }
            Err(e) => warn!("Cannot open session log in {}: {}", dir.display(), e),
        }
    }

    agent.start(system_prompt);
    Ok(agent)
}

/// Finish the output of one turn. Streamed text has already been printed.
pub fn print_outcome(outcome: &TurnOutcome) {
    if let TurnOutcome::Answer { content, .. } = outcome {
        if content.trim().is_empty() {
            println!("{}", "(no response)".dimmed());
        }
    }
    println!();
}

/// Print the banner shown at REPL start.
pub fn print_banner(model: &str, skills: usize) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "mcpilot".cyan().bold(), version.dimmed());
    println!(
        "{}",
        format!("model: {model} | skills: {skills}").dimmed()
    );
    println!("{}", "Type a message, or \"exit\" to quit.".dimmed());
    println!();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
