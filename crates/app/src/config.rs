//! Client configuration
//!
//! Optional TOML file, read from `--config <path>` or from
//! `<config dir>/config.toml` when present. Every key has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use grnvs_net::{SessionConfig, DEFAULT_PORT};
use serde::Deserialize;

/// Settings the client reads before sending
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Control channel port of the server
    pub port: u16,
    pub control_timeout_ms: u64,
    pub data_timeout_ms: u64,
    /// How long to wait for the server to open the data channel
    pub accept_timeout_ms: u64,
    pub bind_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            port: DEFAULT_PORT,
            control_timeout_ms: session.control_timeout.as_millis() as u64,
            data_timeout_ms: session.data_timeout.as_millis() as u64,
            accept_timeout_ms: session.accept_timeout.as_millis() as u64,
            bind_attempts: session.bind_attempts,
        }
    }
}

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("bind_attempts must be at least 1")]
    NoBindAttempts,
}

impl AppConfig {
    /// Load from `explicit` if given (it must exist), otherwise from the
    /// default location if a file is there, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if config.bind_attempts == 0 {
            return Err(ConfigError::NoBindAttempts);
        }
        Ok(config)
    }

    /// `config.toml` in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("net", "grnvs", "asciiclient")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            control_timeout: Duration::from_millis(self.control_timeout_ms),
            data_timeout: Duration::from_millis(self.data_timeout_ms),
            accept_timeout: Duration::from_millis(self.accept_timeout_ms),
            bind_attempts: self.bind_attempts,
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_protocol() {
        let config = AppConfig::default();
        assert_eq!(config.port, 1337);
        assert_eq!(config.control_timeout_ms, 3000);
        assert_eq!(config.data_timeout_ms, 5000);
        assert_eq!(config.bind_attempts, 5);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = AppConfig::from_toml("port = 4242\ndata_timeout_ms = 1500\n").unwrap();
        assert_eq!(config.port, 4242);
        assert_eq!(config.data_timeout_ms, 1500);
        assert_eq!(config.control_timeout_ms, 3000);

        let session = config.session_config();
        assert_eq!(session.data_timeout, Duration::from_millis(1500));
        assert_eq!(session.control_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = AppConfig::from_toml("prot = 4242\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_zero_bind_attempts_rejected() {
        let result = AppConfig::from_toml("bind_attempts = 0\n");
        assert!(matches!(result, Err(ConfigError::NoBindAttempts)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let result = AppConfig::load(Some(&missing));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
