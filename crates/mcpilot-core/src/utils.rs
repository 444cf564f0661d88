//! Utility helpers — path resolution, timestamps, string truncation.

use std::path::PathBuf;

/// Get the mcpilot data directory (e.g. `~/.mcpilot/`).
pub fn get_data_path() -> PathBuf {
    let home = dirs_next().unwrap_or_else(|| PathBuf::from("."));
    home.join(".mcpilot")
}

/// REPL history file (e.g. `~/.mcpilot/history/cli_history`).
pub fn get_history_path() -> PathBuf {
    get_data_path().join("history").join("cli_history")
}

/// Saved API key for first-run bootstrap (e.g. `~/.mcpilot/api_key.txt`).
pub fn get_api_key_path() -> PathBuf {
    get_data_path().join("api_key.txt")
}

/// Get current ISO 8601 timestamp.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Local time as `YYYYMMDD_HHMMSS`, used to name session files.
pub fn session_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Helper to get home directory.
fn dirs_next() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        let result = truncate_string("hello world, this is a long string", 15);
        assert_eq!(result, "hello world,...");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_string("こんにちは世界です", 5), "こん...");
    }

    #[test]
    fn test_session_stamp_format() {
        let stamp = session_stamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.chars().nth(8), Some('_'));
    }

    #[test]
    fn test_timestamp_is_valid() {
        chrono::DateTime::parse_from_rfc3339(&timestamp()).unwrap();
    }

    #[test]
    fn test_paths_live_under_data_dir() {
        assert!(get_data_path().ends_with(".mcpilot"));
        assert!(get_history_path().ends_with("history/cli_history"));
        assert!(get_api_key_path().ends_with("api_key.txt"));
    }
}
