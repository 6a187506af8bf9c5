//! Configuration management for tallysync
//!
//! All settings are supplied through environment variables with built-in
//! defaults, so the binary can run against a local Tally instance with no
//! setup at all. Every field has a default function and `Config::validate`
//! rejects values the rest of the system cannot work with.

pub mod error;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub use error::ConfigError;

/// The built-in API key. Deployments must override this via `API_SECRET_KEY`.
pub const DEFAULT_API_KEY: &str = "TallyDash2024SecureKey789XYZ";

// ==================== Configuration Types ====================

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// API listen port
    pub port: u16,
    /// Shared secret checked against the `X-API-Key` request header
    pub api_key: String,
    /// CORS origin allow-list; a literal `*` entry allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_key: DEFAULT_API_KEY.to_string(),
            allowed_origins: default_origins(),
        }
    }
}

fn default_port() -> u16 {
    5000
}

fn default_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Upstream Tally server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// XML-over-HTTP endpoint of the Tally server
    pub url: String,
    /// Seconds between extraction cycles
    pub interval_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_upstream_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_interval_secs() -> u64 {
    3600
}

/// Storage paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Directory for timestamped database backups
    pub backup_dir: PathBuf,
    /// Directory for cleaned-XML diagnostic dumps
    pub dump_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("tally_data.db"),
            backup_dir: PathBuf::from("backups"),
            dump_dir: PathBuf::from("."),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server settings
    pub server: ServerConfig,
    /// Upstream Tally settings
    pub upstream: UpstreamConfig,
    /// Storage paths
    pub storage: StorageConfig,
}

impl Config {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            server: ServerConfig {
                port: env_parse("PORT", default_port()),
                api_key: env_or("API_SECRET_KEY", DEFAULT_API_KEY),
                allowed_origins: env_list("ALLOWED_ORIGINS", default_origins()),
            },
            upstream: UpstreamConfig {
                url: env_or("TALLY_URL", &default_upstream_url()),
                interval_secs: env_parse("EXTRACT_INTERVAL_SECS", default_interval_secs()),
            },
            storage: StorageConfig {
                db_path: PathBuf::from(env_or("TALLY_DB_PATH", "tally_data.db")),
                backup_dir: PathBuf::from(env_or("TALLY_BACKUP_DIR", "backups")),
                dump_dir: PathBuf::from(env_or("TALLY_DUMP_DIR", ".")),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if self.upstream.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "upstream.interval_secs".to_string(),
                reason: "Extraction interval must be at least 1 second".to_string(),
            });
        }

        if self.upstream.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.url".to_string(),
                reason: "Upstream URL must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Whether the deployment is still running on the built-in API key
    pub fn uses_default_api_key(&self) -> bool {
        self.server.api_key == DEFAULT_API_KEY
    }
}

// ==================== Environment Helpers ====================

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return default;
    }
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("invalid value for {}: {:?}, using default", key, raw);
            default
        }
    }
}

fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    let values: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if values.is_empty() {
        default
    } else {
        values
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.upstream.url, "http://localhost:9000");
        assert_eq!(config.upstream.interval_secs, 3600);
        assert_eq!(config.server.allowed_origins, vec!["*".to_string()]);
        assert!(config.uses_default_api_key());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.upstream.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_url() {
        let mut config = Config::default();
        config.upstream.url = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
