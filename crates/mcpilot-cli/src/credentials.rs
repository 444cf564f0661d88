//! API key bootstrap for the configured model's provider.
//!
//! Lookup order once config and `MCPILOT_PROVIDERS__*` overrides come up
//! empty: the provider's own env var (e.g. `DEEPSEEK_API_KEY`, possibly from a
//! `.env` file), the key saved in `~/.mcpilot/api_key.txt`, then an
//! interactive prompt whose answer is saved to that file.

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use rustyline::DefaultEditor;
use tracing::{debug, info, warn};

use mcpilot_core::config::Config;
use mcpilot_core::utils::get_api_key_path;
use mcpilot_providers::registry::{find_by_model, match_provider};

/// Load a `.env` file from the working directory (or a parent) into the
/// process environment. Variables that are already set win.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => debug!("loaded environment from {}", path.display()),
        Err(e) => report_dotenv_error(&e),
    }
}

fn load_env_file(path: &Path) {
    match dotenv::from_path(path) {
        Ok(()) => debug!("loaded environment from {}", path.display()),
        Err(e) => report_dotenv_error(&e),
    }
}

fn report_dotenv_error(e: &dotenv::Error) {
    if !e.not_found() {
        warn!("Ignoring unreadable .env file: {e}");
    }
}

/// Make sure the configured model has a provider with an API key.
pub fn ensure_api_key(config: &mut Config) -> Result<()> {
    let model = config.agents.defaults.model.clone();
    if match_provider(&model, &config.providers.to_map()).is_some() {
        return Ok(());
    }
    let Some(spec) = find_by_model(&model) else {
        // Nothing to bootstrap; provider creation reports the problem.
        return Ok(());
    };

    let key_path = get_api_key_path();
    let key = match resolve_key(std::env::var(spec.env_key).ok(), read_saved_key(&key_path)) {
        Some(key) => key,
        None => {
            if !std::io::stdin().is_terminal() {
                bail!(
                    "no API key for {}: set {} or providers.{}.apiKey in the config",
                    spec.display_name,
                    spec.env_key,
                    spec.name
                );
            }
            let key = prompt_key(spec.display_name)?;
            save_key(&key_path, &key)
                .with_context(|| format!("failed to save API key to {}", key_path.display()))?;
            println!("{} saved to {}", "API key".green(), key_path.display());
            key
        }
    };

    if let Some(provider) = config.providers.get_by_name_mut(spec.name) {
        info!(provider = spec.name, "Using bootstrapped API key");
        provider.api_key = key;
    }
    Ok(())
}

/// First non-empty key from the environment or the saved file.
fn resolve_key(from_env: Option<String>, saved: Option<String>) -> Option<String> {
    from_env
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .or(saved)
}

fn read_saved_key(path: &Path) -> Option<String> {
    let key = std::fs::read_to_string(path).ok()?;
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        debug!("read API key from {}", path.display());
        Some(key.to_string())
    }
}

fn save_key(path: &Path, key: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, key)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn prompt_key(provider: &str) -> Result<String> {
    let mut editor = DefaultEditor::new()?;
    let key = editor.readline(&format!("Enter your {provider} API key: "))?;
    let key = key.trim().to_string();
    if key.is_empty() {
        bail!("an API key is required");
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_key_wins_over_saved_key() {
        assert_eq!(
            resolve_key(Some("sk-env".into()), Some("sk-file".into())),
            Some("sk-env".into())
        );
        assert_eq!(
            resolve_key(Some("  ".into()), Some("sk-file".into())),
            Some("sk-file".into())
        );
        assert_eq!(resolve_key(None, None), None);
    }

    #[test]
    fn saved_key_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("api_key.txt");
        assert_eq!(read_saved_key(&path), None);

        save_key(&path, "sk-test").unwrap();
        assert_eq!(read_saved_key(&path), Some("sk-test".into()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn blank_saved_key_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_key.txt");
        std::fs::write(&path, "\n  \n").unwrap();
        assert_eq!(read_saved_key(&path), None);
    }

    #[test]
    fn dotenv_file_supplies_provider_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "DEEPSEEK_API_KEY=sk-from-dotenv\n").unwrap();
        load_env_file(&path);

        // An already exported key takes precedence over the file.
        let expected = std::env::var("DEEPSEEK_API_KEY").unwrap();
        let mut config = Config::default();
        ensure_api_key(&mut config).unwrap();
        assert_eq!(config.providers.deepseek.api_key, expected);
    }

    #[test]
    fn missing_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        load_env_file(&dir.path().join(".env"));
    }

    #[test]
    fn configured_provider_needs_no_bootstrap() {
        let mut config = Config::default();
        config.providers.deepseek.api_key = "sk-config".into();
        ensure_api_key(&mut config).unwrap();
        assert_eq!(config.providers.deepseek.api_key, "sk-config");
    }
}
