//! `mcpilot status` — show configuration, provider, and skill status.

use anyhow::Result;
use colored::Colorize;

use mcpilot_core::config::{get_config_path, load_config};
use mcpilot_core::utils::truncate_string;
use mcpilot_providers::registry::PROVIDERS;

use crate::helpers::{configured_skills, expand_tilde};

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();
    let defaults = &config.agents.defaults;

    println!();
    println!("{}", "mcpilot status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        found(config_path.exists())
    );
    println!("  {:<18} {}", "Model:".bold(), defaults.model);
    println!("  {:<18} {}", "Summary model:".bold(), defaults.summary_model);
    println!(
        "  {:<18} {}",
        "Limits:".bold(),
        format!(
            "{} tool iterations | {} chars context | keep last {}",
            defaults.max_tool_iterations, defaults.context_char_limit, defaults.keep_last_messages
        )
        .dimmed()
    );

    let logs = expand_tilde(&config.logging.dir);
    if config.logging.session_logs {
        println!("  {:<18} {} {}", "Session logs:".bold(), logs.display(), found(logs.exists()));
    } else {
        println!("  {:<18} {}", "Session logs:".bold(), "off".dimmed());
    }

    // Providers
    println!();
    println!("  {}", "Providers:".bold());
    for spec in PROVIDERS {
        let configured = config
            .providers
            .get_by_name(spec.name)
            .is_some_and(|c| c.is_configured());
        let from_env = std::env::var(spec.env_key).is_ok_and(|v| !v.is_empty());
        let status = if configured {
            format!("{} (key set)", "✓".green())
        } else if from_env {
            format!("{} ({})", "✓".green(), spec.env_key)
        } else {
            format!("{}", "· not configured".dimmed())
        };
        println!("    {:<20} {}", spec.display_name, status);
    }

    // Skills
    println!();
    let skills = configured_skills(&config);
    println!("  {} {}", "Skills:".bold(), format!("({})", skills.len()).dimmed());
    if skills.is_empty() {
        for dir in &config.skills.dirs {
            println!("    {} {}", "· none found in".dimmed(), expand_tilde(dir).display());
        }
    }
    for skill in &skills {
        println!(
            "    {:<20} {}",
            skill.name(),
            truncate_string(skill.short_description(), 60).dimmed()
        );
    }

    println!();
    Ok(())
}

fn found(exists: bool) -> String {
    if exists {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}
