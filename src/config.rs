use std::path::{Path, PathBuf};

use crate::adaptive::config::parse_flag;

const DEFAULT_LOG_DIR: &str = "./logs";

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Daily rolling log files go here when `ENABLE_FILE_LOGS` is on.
    pub log_dir: Option<PathBuf>,
    /// When set, profiles are kept as JSON files here; otherwise in memory.
    pub profile_dir: Option<PathBuf>,
    /// Optional JSON catalog replacing the built-in word list.
    pub catalog_path: Option<PathBuf>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty_path(key: &str) -> Option<PathBuf> {
    non_empty(std::env::var(key).ok()).map(PathBuf::from)
}

fn file_log_dir(enabled: Option<&str>, dir: Option<String>) -> Option<PathBuf> {
    if !enabled.and_then(parse_flag).unwrap_or(false) {
        return None;
    }
    let dir = non_empty(dir).unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
    Some(Path::new(&dir).to_path_buf())
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let file_logs = std::env::var("ENABLE_FILE_LOGS").ok();

        Self {
            log_level,
            log_dir: file_log_dir(file_logs.as_deref(), std::env::var("LOG_DIR").ok()),
            profile_dir: non_empty_path("PROFILE_DIR"),
            catalog_path: non_empty_path("CATALOG_PATH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logs_need_an_enabled_flag() {
        assert_eq!(file_log_dir(None, Some("/var/log/x".into())), None);
        assert_eq!(file_log_dir(Some("0"), None), None);
        assert_eq!(file_log_dir(Some("nope"), None), None);
        assert_eq!(file_log_dir(Some("1"), None), Some(PathBuf::from("./logs")));
        assert_eq!(
            file_log_dir(Some("true"), Some(" /tmp/literacy ".into())),
            Some(PathBuf::from("/tmp/literacy"))
        );
    }
}
