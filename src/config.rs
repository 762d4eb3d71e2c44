// Runtime configuration, read from the environment.

use std::io::stderr;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

pub const DEFAULT_DB_PATH: &str = "agent_ledger.db";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3004;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Host to bind the HTTP server to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum log level
    pub log_level: LevelFilter,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: LevelFilter::INFO,
        }
    }
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup; unset or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("AGENT_LEDGER_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let host = lookup("AGENT_LEDGER_HOST").unwrap_or(defaults.host);

        let port = lookup("AGENT_LEDGER_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let log_level = lookup("AGENT_LEDGER_LOG")
            .and_then(|s| parse_log_level(&s))
            .unwrap_or(defaults.log_level);

        Self {
            db_path,
            host,
            port,
            log_level,
        }
    }

    /// Get bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn parse_log_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        _ => None,
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// command output.
pub fn setup_logging(level: LevelFilter) {
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::registry().with(terminal_log).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(|_| None);

        assert_eq!(config.db_path, PathBuf::from("agent_ledger.db"));
        assert_eq!(config.port, 3004);
        assert_eq!(config.bind_addr(), "0.0.0.0:3004");
        assert_eq!(config.log_level, LevelFilter::INFO);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("AGENT_LEDGER_DB", "/tmp/ledger.db"),
            ("AGENT_LEDGER_HOST", "127.0.0.1"),
            ("AGENT_LEDGER_PORT", "8080"),
            ("AGENT_LEDGER_LOG", "Debug"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.log_level, LevelFilter::DEBUG);
    }

    #[test]
    fn test_bad_port_and_level_fall_back() {
        let config = AppConfig::from_lookup(|k| match k {
            "AGENT_LEDGER_PORT" => Some("not-a-port".to_string()),
            "AGENT_LEDGER_LOG" => Some("loud".to_string()),
            _ => None,
        });

        assert_eq!(config.port, 3004);
        assert_eq!(config.log_level, LevelFilter::INFO);
    }
}
