//! Shared logging utilities for Covenant tools.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "covenant_scanner=info,covenant_audit=info,covenant_runtime=info";

/// Logging configuration shared by Covenant entry points.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a stderr layer and an append-only file layer
/// under the Covenant home directory.
///
/// Safe to call once per process; a second call returns an error from the
/// global subscriber registration.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let log_path = log_dir.join(format!("{}.log", sanitize_name(config.app_name)));
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(())
}

/// Get the Covenant home directory: ~/.covenant
///
/// `COVENANT_HOME` overrides the default, which tests rely on to keep the
/// real home directory untouched.
pub fn covenant_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("COVENANT_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".covenant")
}

/// Get the logs directory: ~/.covenant/logs
pub fn logs_dir() -> PathBuf {
    covenant_home().join("logs")
}

/// Get the scanner cache directory: ~/.covenant/cache/scanner
pub fn scanner_cache_dir() -> PathBuf {
    covenant_home().join("cache").join("scanner")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_everything_unsafe() {
        assert_eq!(sanitize_name("my app/1.0"), "my_app_1_0");
        assert_eq!(sanitize_name("plain-name_2"), "plain-name_2");
    }

    #[test]
    fn cache_dir_lives_under_home() {
        let dir = scanner_cache_dir();
        assert!(dir.ends_with("cache/scanner"));
    }
}
