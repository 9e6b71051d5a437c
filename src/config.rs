//! Configuration module for filevault.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{Result, VaultError};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins (empty means any origin, without credentials).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
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
    "data/filevault.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding every blob.
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Maximum upload request size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Upper bound for a single blob read or write.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

fn default_storage_root() -> String {
    "/tmp/files_manager".to_string()
}

fn default_max_upload_size() -> u64 {
    16
}

fn default_io_timeout() -> u64 {
    30
}

impl StorageConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize) * 1024 * 1024
    }

    /// Blob I/O timeout as a Duration.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_upload_size_mb: default_max_upload_size(),
            io_timeout_secs: default_io_timeout(),
        }
    }
}

/// Session store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// In-process map with expiry timestamps.
    #[default]
    Memory,
    /// Redis server (requires the `redis` feature).
    Redis,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Which store holds session tokens.
    #[serde(default)]
    pub backend: SessionBackend,
    /// Redis connection URL (used when backend = "redis").
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Session lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Prefix for session keys in the store.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// How often the memory backend drops expired sessions, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_session_ttl() -> u64 {
    86400 // 24 hours
}

fn default_key_prefix() -> String {
    "auth_".to_string()
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            redis_url: default_redis_url(),
            ttl_secs: default_session_ttl(),
            key_prefix: default_key_prefix(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl SessionConfig {
    /// Session lifetime as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Job queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Total attempts per job, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// Upper bound for the retry delay, in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
    /// Number of jobs processed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Upper bound for a single job attempt, in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    /// Number of dead-lettered jobs kept for inspection.
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    2
}

fn default_job_timeout() -> u64 {
    120
}

fn default_dead_letter_capacity() -> usize {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
            concurrency: default_concurrency(),
            job_timeout_secs: default_job_timeout(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

impl QueueConfig {
    /// Per-attempt time bound as a Duration.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filevault.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Job queue configuration.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(VaultError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEVAULT_PORT`: HTTP port
    /// - `FILEVAULT_FOLDER_PATH`: blob storage root
    /// - `FILEVAULT_DB_PATH`: SQLite database path
    /// - `FILEVAULT_REDIS_URL`: Redis URL for the session store
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = env_value("FILEVAULT_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(root) = env_value("FILEVAULT_FOLDER_PATH") {
            self.storage.root = root;
        }
        if let Some(path) = env_value("FILEVAULT_DB_PATH") {
            self.database.path = path;
        }
        if let Some(url) = env_value("FILEVAULT_REDIS_URL") {
            self.session.redis_url = url;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.session.ttl_secs == 0 {
            return Err(VaultError::Config(
                "session.ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(VaultError::Config(
                "session.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.queue.max_attempts == 0 {
            return Err(VaultError::Config(
                "queue.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.queue.concurrency == 0 {
            return Err(VaultError::Config(
                "queue.concurrency must be at least 1".to_string(),
            ));
        }
        if self.session.backend == SessionBackend::Redis && !cfg!(feature = "redis") {
            return Err(VaultError::Config(
                "session.backend = \"redis\" requires the `redis` feature".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert!(config.server.cors_origins.is_empty());

        assert_eq!(config.database.path, "data/filevault.db");

        assert_eq!(config.storage.root, "/tmp/files_manager");
        assert_eq!(config.storage.max_upload_size_mb, 16);
        assert_eq!(config.storage.io_timeout_secs, 30);

        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert_eq!(config.session.ttl_secs, 86400);
        assert_eq!(config.session.key_prefix, "auth_");
        assert_eq!(config.session.sweep_interval_secs, 300);

        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.queue.dead_letter_capacity, 1000);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/filevault.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 8080
cors_origins = ["http://localhost:3000"]

[database]
path = "custom/db.sqlite"

[storage]
root = "custom/blobs"
max_upload_size_mb = 4
io_timeout_secs = 5

[session]
backend = "redis"
redis_url = "redis://cache:6379"
ttl_secs = 3600
key_prefix = "sess_"

[queue]
max_attempts = 3
backoff_base_ms = 100
backoff_max_ms = 1000
concurrency = 8
job_timeout_secs = 10

[logging]
level = "debug"
file = "custom/logs/app.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.database.path, "custom/db.sqlite");
        assert_eq!(config.storage.root, "custom/blobs");
        assert_eq!(config.storage.max_upload_bytes(), 4 * 1024 * 1024);
        assert_eq!(config.storage.io_timeout(), Duration::from_secs(5));
        assert_eq!(config.session.backend, SessionBackend::Redis);
        assert_eq!(config.session.redis_url, "redis://cache:6379");
        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(config.session.key_prefix, "sess_");
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.backoff_base_ms, 100);
        assert_eq!(config.queue.backoff_max_ms, 1000);
        assert_eq!(config.queue.concurrency, 8);
        assert_eq!(config.queue.job_timeout_secs, 10);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[server]
port = 3000
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.session.ttl_secs, 86400);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        if let Err(VaultError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(VaultError::Io(_))));
    }

    #[test]
    fn test_apply_env_overrides() {
        let original = std::env::var("FILEVAULT_FOLDER_PATH").ok();

        std::env::set_var("FILEVAULT_FOLDER_PATH", "/srv/blobs");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.root, "/srv/blobs");

        std::env::set_var("FILEVAULT_FOLDER_PATH", "");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.root, "/tmp/files_manager");

        if let Some(val) = original {
            std::env::set_var("FILEVAULT_FOLDER_PATH", val);
        } else {
            std::env::remove_var("FILEVAULT_FOLDER_PATH");
        }
    }

    #[test]
    fn test_validate_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = Config::default();
        config.session.ttl_secs = 0;

        let result = config.validate();
        if let Err(VaultError::Config(msg)) = result {
            assert!(msg.contains("ttl_secs"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_validate_rejects_zero_sweep_interval() {
        let mut config = Config::default();
        config.session.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.queue.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
