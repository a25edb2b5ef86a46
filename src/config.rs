//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub file: FileConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub prewarm: PrewarmConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The backing data file
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_file_path")]
    pub path: PathBuf,
}

fn default_file_path() -> PathBuf {
    PathBuf::from("data/sample.dat")
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: default_file_path(),
        }
    }
}

/// Offset index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Records per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Build lock expiry, only matters when a builder dies
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Wait between lock attempts while another builder is active
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
}

fn default_chunk_size() -> u64 {
    1000
}

fn default_lock_ttl() -> u64 {
    60
}

fn default_backoff() -> u64 {
    1000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            lock_ttl_secs: default_lock_ttl(),
            backoff_ms: default_backoff(),
        }
    }
}

impl IndexConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Which cache store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// In-process only, nothing shared between processes
    Memory,
    /// SQLite file shared by all processes on the host
    #[default]
    Sqlite,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "sqlite" => Ok(StoreKind::Sqlite),
            other => Err(format!("unknown store kind: {}", other)),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("lineseek").join("store.db"))
        .unwrap_or_else(|| PathBuf::from("./lineseek_store.db"))
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_store_path(),
        }
    }
}

/// Content cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Records kept in the per-process LRU
    #[serde(default = "default_local_capacity")]
    pub local_capacity: usize,

    /// Lifetime of memoized records in the shared store
    #[serde(default = "default_content_ttl")]
    pub content_ttl_secs: u64,
}

fn default_local_capacity() -> usize {
    10_000
}

fn default_content_ttl() -> u64 {
    7 * 24 * 60 * 60 // 1 week
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_capacity: default_local_capacity(),
            content_ttl_secs: default_content_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_secs)
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Background pre-warm configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PrewarmConfig {
    #[serde(default = "default_prewarm_enabled")]
    pub enabled: bool,

    /// Delay before the scan starts after boot
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_prewarm_enabled() -> bool {
    true
}

impl Default for PrewarmConfig {
    fn default() -> Self {
        Self {
            enabled: default_prewarm_enabled(),
            delay_ms: 0,
        }
    }
}

impl PrewarmConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("lineseek").join("config.toml")),
            Some(PathBuf::from("/etc/lineseek/config.toml")),
            Some(PathBuf::from("./lineseek.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Explicit file if given, default locations otherwise; validated either way
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_with_env(path)?,
            None => Self::load_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the service unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "index.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.file.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("file.path must be set".to_string()));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // File overrides (FILE_PATH kept for existing deployments)
        if let Some(path) = env_any(&["LINESEEK_FILE_PATH", "FILE_PATH"]) {
            self.file.path = PathBuf::from(path);
        }

        // Index overrides
        if let Some(size) = env_any(&["LINESEEK_CHUNK_SIZE", "FILE_READER_CHUNK_SIZE"]) {
            if let Ok(n) = size.parse() {
                self.index.chunk_size = n;
            }
        }
        if let Ok(ttl) = std::env::var("LINESEEK_LOCK_TTL_SECS") {
            if let Ok(n) = ttl.parse() {
                self.index.lock_ttl_secs = n;
            }
        }
        if let Ok(backoff) = std::env::var("LINESEEK_BACKOFF_MS") {
            if let Ok(n) = backoff.parse() {
                self.index.backoff_ms = n;
            }
        }

        // Store overrides
        if let Ok(kind) = std::env::var("LINESEEK_STORE_KIND") {
            match kind.parse() {
                Ok(kind) => self.store.kind = kind,
                Err(e) => tracing::warn!("Ignoring LINESEEK_STORE_KIND: {}", e),
            }
        }
        if let Ok(path) = std::env::var("LINESEEK_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }

        // API overrides
        if let Ok(host) = std::env::var("LINESEEK_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("LINESEEK_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Prewarm overrides
        if let Ok(enabled) = std::env::var("LINESEEK_PREWARM") {
            self.prewarm.enabled = enabled.to_lowercase() != "false" && enabled != "0";
        }

        // Logging overrides
        if let Ok(level) = std::env::var("LINESEEK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LINESEEK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// First set variable among `names`
fn env_any(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| std::env::var(name).ok())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Lineseek Configuration
#
# Environment variables override these settings:
# - LINESEEK_FILE_PATH (or FILE_PATH)
# - LINESEEK_CHUNK_SIZE (or FILE_READER_CHUNK_SIZE)
# - LINESEEK_LOCK_TTL_SECS, LINESEEK_BACKOFF_MS
# - LINESEEK_STORE_KIND, LINESEEK_STORE_PATH
# - LINESEEK_API_HOST, LINESEEK_API_PORT
# - LINESEEK_PREWARM
# - LINESEEK_LOG_LEVEL, LINESEEK_LOG_FORMAT

[file]
# Newline-delimited text file to serve. Must not change while served.
path = "data/sample.dat"

[index]
# Records per offset chunk
chunk_size = 1000

# Build lock expiry (seconds). Recovers from a builder that died mid-scan.
lock_ttl_secs = 60

# Wait between lock attempts while another process is building (ms)
backoff_ms = 1000

[store]
# Shared cache store: "sqlite" (shared by all local processes) or "memory"
kind = "sqlite"
path = {store_path}

[cache]
# Records memoized per process
local_capacity = 10000

# Lifetime of memoized records in the shared store (seconds)
content_ttl_secs = 604800

[api]
host = "0.0.0.0"
port = 8080

# Upper bound on how long a request may wait for an index build
request_timeout_secs = 30

[prewarm]
# Scan the whole file once at startup
enabled = true
delay_ms = 0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .replace(
        "{store_path}",
        &format!("{:?}", default_store_path().to_string_lossy()),
    )
}
