//! `mcpilot onboard` — initialize configuration and data directories.
//!
//! - Creates `~/.mcpilot/config.json` with defaults
//! - Creates the skill scan directories and the session log directory

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use mcpilot_core::config::{get_config_path, load_config, save_config, Config};

use crate::helpers::expand_tilde;

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "mcpilot setup".cyan().bold());
    println!();

    let config_path = get_config_path();
    let config = init_config(&config_path)?;
    init_dirs(&config)?;

    println!();
    println!("  Next steps:");
    println!(
        "    1. Add your API key to {} (or set DEEPSEEK_API_KEY)",
        config_path.display()
    );
    println!("    2. Put skills in a scanned directory as <name>/SKILL.md + <name>/server.py");
    println!("    3. Chat: {}", "mcpilot agent".cyan());
    println!();

    Ok(())
}

/// Write the default config unless one already exists; return the effective config.
fn init_config(path: &Path) -> Result<Config> {
    if path.exists() {
        println!("  {} config already exists at {}", "✓".green(), path.display());
        return Ok(load_config(Some(path)));
    }
    let config = Config::default();
    save_config(&config, Some(path))
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("  {} created config at {}", "✓".green(), path.display());
    Ok(config)
}

fn init_dirs(config: &Config) -> Result<()> {
    for dir in &config.skills.dirs {
        let dir = expand_tilde(dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        println!("  {} skills dir at {}", "✓".green(), dir.display());
    }
    let logs = expand_tilde(&config.logging.dir);
    std::fs::create_dir_all(&logs).with_context(|| format!("failed to create {}", logs.display()))?;
    println!("  {} session logs at {}", "✓".green(), logs.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_config_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = init_config(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.agents.defaults.model, "deepseek-reasoner");

        std::fs::write(
            &path,
            r#"{"agents":{"defaults":{"model":"kimi-k2.5"}}}"#,
        )
        .unwrap();
        let kept = init_config(&path).unwrap();
        assert_eq!(kept.agents.defaults.model, "kimi-k2.5");
    }

    #[test]
    fn init_dirs_creates_skill_and_log_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.skills.dirs = vec![dir.path().join("skills").to_string_lossy().into_owned()];
        config.logging.dir = dir.path().join("logs").to_string_lossy().into_owned();

        init_dirs(&config).unwrap();
        assert!(dir.path().join("skills").is_dir());
        assert!(dir.path().join("logs").is_dir());
    }
}
