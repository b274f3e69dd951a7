//! Configuration module for depot.

use serde::Deserialize;
use std::path::Path;

use crate::{DepotError, Result};

/// Storage layout configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for artifact storage.
    #[serde(default = "default_uploads_root")]
    pub uploads_root: String,
    /// Public base URL mapped onto `uploads_root`.
    ///
    /// Stored artifact URLs are `<base_url>/<relative_path>` and must be
    /// reversible back to filesystem paths.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_uploads_root() -> String {
    "uploads".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000/uploads".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_root: default_uploads_root(),
            base_url: default_base_url(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/depot.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Ceilings for one plan tier.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TierLimitsConfig {
    /// Maximum number of artifacts an owner may hold.
    pub max_artifacts: u32,
    /// Maximum artifact size in whole megabytes.
    pub max_size_mb: u64,
}

/// Plan tier ceilings.
///
/// Single source of truth for quota enforcement; the enforcer treats this
/// as an immutable lookup table.
#[derive(Debug, Clone, Deserialize)]
pub struct PlansConfig {
    /// Ceilings for the Hobbyist tier.
    #[serde(default = "default_hobbyist_limits")]
    pub hobbyist: TierLimitsConfig,
    /// Ceilings for the Standard tier.
    #[serde(default = "default_standard_limits")]
    pub standard: TierLimitsConfig,
}

fn default_hobbyist_limits() -> TierLimitsConfig {
    TierLimitsConfig {
        max_artifacts: 3,
        max_size_mb: 100,
    }
}

fn default_standard_limits() -> TierLimitsConfig {
    TierLimitsConfig {
        max_artifacts: 10,
        max_size_mb: 200,
    }
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            hobbyist: default_hobbyist_limits(),
            standard: default_standard_limits(),
        }
    }
}

/// Upload session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    /// Seconds before an idle upload session may be reaped.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Maximum concurrent open sessions per account.
    #[serde(default = "default_max_sessions")]
    pub max_per_account: usize,
    /// Maximum total staging bytes per account across open sessions.
    #[serde(default = "default_max_staging_bytes")]
    pub max_staging_bytes_per_account: u64,
}

fn default_session_ttl() -> u64 {
    86400 // 24 hours
}

fn default_max_sessions() -> usize {
    4
}

fn default_max_staging_bytes() -> u64 {
    512 * 1024 * 1024 // 512MB
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            max_per_account: default_max_sessions(),
            max_staging_bytes_per_account: default_max_staging_bytes(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter for log output: either a bare level (`debug`) or full
    /// per-target directives (`depot=debug,sqlx=warn`).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; output goes to the console only when absent.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Storage layout settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Plan tier ceilings.
    #[serde(default)]
    pub plans: PlansConfig,
    /// Upload session settings.
    #[serde(default)]
    pub sessions: SessionsConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DepotError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DepotError::Config(format!("config parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.uploads_root, "uploads");
        assert_eq!(config.database.path, "data/depot.db");
        assert_eq!(config.plans.hobbyist.max_artifacts, 3);
        assert_eq!(config.plans.hobbyist.max_size_mb, 100);
        assert_eq!(config.plans.standard.max_artifacts, 10);
        assert_eq!(config.plans.standard.max_size_mb, 200);
        assert_eq!(config.sessions.ttl_secs, 86400);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.storage.base_url, "http://localhost:3000/uploads");
    }

    #[test]
    fn test_parse_partial() {
        let toml = r#"
[storage]
uploads_root = "/var/depot/uploads"
base_url = "https://depot.example.com/uploads"

[plans.hobbyist]
max_artifacts = 5
max_size_mb = 300
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.storage.uploads_root, "/var/depot/uploads");
        assert_eq!(config.plans.hobbyist.max_artifacts, 5);
        assert_eq!(config.plans.hobbyist.max_size_mb, 300);
        // Untouched sections fall back to defaults
        assert_eq!(config.plans.standard.max_artifacts, 10);
        assert_eq!(config.sessions.max_per_account, 4);
    }

    #[test]
    fn test_parse_invalid() {
        let result = Config::parse("storage = 42");
        assert!(matches!(result, Err(DepotError::Config(_))));
    }

    #[test]
    fn test_parse_logging() {
        let toml = r#"
[logging]
level = "depot=debug,sqlx=warn"
file = "logs/depot.log"
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.logging.level, "depot=debug,sqlx=warn");
        assert_eq!(config.logging.file.as_deref(), Some("logs/depot.log"));
    }

    #[test]
    fn test_parse_sessions() {
        let toml = r#"
[sessions]
ttl_secs = 600
max_per_account = 2
max_staging_bytes_per_account = 1048576
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.sessions.ttl_secs, 600);
        assert_eq!(config.sessions.max_per_account, 2);
        assert_eq!(config.sessions.max_staging_bytes_per_account, 1048576);
    }
}
