//! Server configuration.
//!
//! Everything a meshdoc node needs at startup: where to listen, where
//! the document store lives, which peers receive pushes, and the bearer
//! tokens for both directions. Values merge from an optional TOML file,
//! `MESHDOC__*` environment variables, and CLI overrides.

use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address to listen on for HTTP.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Data directory holding the document store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Peer base URLs receiving synchronous pushes (e.g.
    /// "http://node-b:7070"). Empty for a standalone node.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Bearer tokens accepted on inbound requests. At least one.
    pub auth_tokens: Vec<String>,
    /// Bearer token presented to peers on outbound pushes. Required
    /// whenever `peers` is non-empty; kept distinct from `auth_tokens`
    /// so the outbound identity is never ambiguous.
    #[serde(default)]
    pub outbound_token: Option<String>,
    /// Per-peer HTTP timeout for replication pushes, in milliseconds.
    #[serde(default = "default_replication_timeout_ms")]
    pub replication_timeout_ms: u64,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format selection.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (development).
    Text,
    /// JSON structured logging (production).
    Json,
    /// JSON for non-TTY stdout, text otherwise.
    #[default]
    Auto,
}

impl LogFormat {
    /// Resolves the format to a concrete choice: should log output be
    /// JSON? `Auto` answers by checking whether stdout is a terminal.
    pub fn is_json(self) -> bool {
        match self {
            LogFormat::Json => true,
            LogFormat::Text => false,
            LogFormat::Auto => !std::io::stdout().is_terminal(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    // Safety: literal address always parses.
    #[allow(clippy::unwrap_used)]
    "0.0.0.0:7070".parse().unwrap()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./meshdoc-data")
}

fn default_replication_timeout_ms() -> u64 {
    3000
}

impl Config {
    /// Loads configuration from a file.
    ///
    /// Supports TOML format. Environment variables override config
    /// values using the `MESHDOC` prefix with `__` separators (e.g.
    /// `MESHDOC__LISTEN_ADDR`, `MESHDOC__AUTH_TOKENS=a,b`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();

        // Add config file if provided
        let builder = if let Some(path) = path {
            builder.add_source(config::File::with_name(path))
        } else {
            // Try default locations
            builder
                .add_source(config::File::with_name("meshdoc").required(false))
                .add_source(config::File::with_name("/etc/meshdoc/config").required(false))
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("MESHDOC")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("peers")
                .with_list_parse_key("auth_tokens"),
        );

        let config = builder.build().map_err(|e| ConfigError::Load(e.to_string()))?;

        config.try_deserialize().map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_tokens.is_empty() || self.auth_tokens.iter().any(String::is_empty) {
            return Err(ConfigError::Validation(
                "at least one non-empty auth token is required".to_string(),
            ));
        }
        if !self.peers.is_empty() && self.outbound_token.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::Validation(
                "outbound_token is required when peers are configured".to_string(),
            ));
        }
        for peer in &self.peers {
            if !peer.starts_with("http://") && !peer.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "peer must be an http(s) base URL: {peer}"
                )));
            }
        }
        if self.replication_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "replication_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-peer replication timeout as a [`Duration`].
    pub fn replication_timeout(&self) -> Duration {
        Duration::from_millis(self.replication_timeout_ms)
    }

    /// Creates a configuration for testing.
    ///
    /// Listens on an ephemeral localhost port and accepts the given
    /// peers; inbound and outbound use the shared test token.
    #[allow(clippy::unwrap_used)]
    pub fn for_test(data_dir: PathBuf, peers: Vec<String>, token: &str) -> Self {
        Self {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            data_dir,
            peers,
            auth_tokens: vec![token.to_string()],
            outbound_token: Some(token.to_string()),
            replication_timeout_ms: 1000,
            log_format: LogFormat::Auto,
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load configuration.
    Load(String),
    /// Failed to parse configuration.
    Parse(String),
    /// Configuration validation failed.
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "failed to load config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::Validation(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_for_test() {
        let config = Config::for_test(PathBuf::from("/tmp/meshdoc-test"), vec![], "t");
        assert_eq!(config.listen_addr.port(), 0);
        assert_eq!(config.replication_timeout_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_tokens() {
        let mut config = Config::for_test(PathBuf::from("/tmp/x"), vec![], "t");
        config.auth_tokens.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.auth_tokens = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_outbound_token_with_peers() {
        let mut config =
            Config::for_test(PathBuf::from("/tmp/x"), vec!["http://peer:7070".to_string()], "t");
        assert!(config.validate().is_ok());

        config.outbound_token = None;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_peers() {
        let config =
            Config::for_test(PathBuf::from("/tmp/x"), vec!["node-b:7070".to_string()], "t");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::for_test(PathBuf::from("/tmp/x"), vec![], "t");
        config.replication_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_log_formats_resolve() {
        assert!(LogFormat::Json.is_json());
        assert!(!LogFormat::Text.is_json());
    }
}
