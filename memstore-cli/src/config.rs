//! # Environment-Based Configuration
//!
//! Everything is read once at startup. A `.env` file in the working
//! directory is loaded first, if present; real environment variables win.
//!
//! ## Environment Variables
//!
//! ### Store
//! - `BACKEND` - `redis`, `postgresql` or `mongodb` (default: redis)
//! - `USER_ID` - Tenant that owns every record (default: default)
//! - `ALLOWED_FILES` - Comma-separated key allow-list; empty allows all keys
//! - `READ_ONLY_FILES` - Comma-separated `namespace/key` paths that cannot be written
//! - `FILES_DIR` - Directory of file descriptor documents (default: files)
//! - `TTL_MINUTES` - Expire records this long after their last write, at most
//!   one year (default: never)
//!
//! ### Transport
//! - `TRANSPORT` - `stdio` or `streamable-http` (default: stdio)
//! - `HOST` - Bind address for streamable-http (default: 0.0.0.0)
//! - `PORT` - Listen port for streamable-http (default: 8000)
//!
//! ### Redis
//! - `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`, `REDIS_KEY_PREFIX`
//!
//! ### PostgreSQL
//! - `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_USER`, `POSTGRES_PASSWORD`,
//!   `POSTGRES_DB`, `POSTGRES_POOL_SIZE`
//!
//! ### MongoDB
//! - `MONGODB_URI`, `MONGODB_DATABASE`, `MONGODB_COLLECTION`
//!
//! ### Logging
//! - `LOG_LEVEL` - Filter used when `RUST_LOG` is unset (default: info)
//! - `LOG_FORMAT` - `pretty` or `json` (default: pretty)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use memstore_backends::BackendSettings;
use memstore_core::policy::split_list;
use memstore_core::{AccessPolicy, TenantId, TtlConfig};
use serde::Serialize;

/// Longest accepted record TTL: one year
pub const MAX_TTL_MINUTES: u64 = 365 * 24 * 60;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// How MCP clients reach the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    #[default]
    Stdio,
    StreamableHttp,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "streamable-http" => Ok(Self::StreamableHttp),
            other => Err(format!(
                "invalid transport mode '{other}', must be 'stdio' or 'streamable-http'"
            )),
        }
    }
}

/// Listen address for the streamable HTTP transport
#[derive(Debug, Clone, Serialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("invalid log format '{other}', expected pretty or json")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Resolved server configuration
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub backend: String,
    pub user_id: String,
    pub allowed_files: Vec<String>,
    pub read_only_files: Vec<String>,
    pub files_dir: PathBuf,
    pub ttl_minutes: Option<u64>,
    pub transport: Transport,
    pub http: HttpConfig,
    pub backends: BackendSettings,
    pub logging: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            user_id: "default".to_string(),
            allowed_files: Vec::new(),
            read_only_files: Vec::new(),
            files_dir: PathBuf::from("files"),
            ttl_minutes: None,
            transport: Transport::default(),
            http: HttpConfig::default(),
            backends: BackendSettings::default(),
            logging: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable holds a malformed value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(backend) = get_env_string("BACKEND") {
            config.backend = backend;
        }
        if let Some(user_id) = get_env_string("USER_ID") {
            config.user_id = user_id;
        }
        if let Some(allowed) = get_env_string("ALLOWED_FILES") {
            config.allowed_files = split_list(&allowed);
        }
        if let Some(read_only) = get_env_string("READ_ONLY_FILES") {
            config.read_only_files = split_list(&read_only);
        }
        if let Some(dir) = get_env_string("FILES_DIR") {
            config.files_dir = PathBuf::from(dir);
        }
        config.ttl_minutes = get_env_parsed::<u64>("TTL_MINUTES")?;

        // Transport
        if let Some(transport) = get_env_parsed("TRANSPORT")? {
            config.transport = transport;
        }
        if let Some(host) = get_env_string("HOST") {
            config.http.host = host;
        }
        if let Some(port) = get_env_parsed("PORT")? {
            config.http.port = port;
        }

        // Redis
        let redis = &mut config.backends.redis;
        if let Some(host) = get_env_string("REDIS_HOST") {
            redis.host = host;
        }
        if let Some(port) = get_env_parsed("REDIS_PORT")? {
            redis.port = port;
        }
        if let Some(password) = get_env_string("REDIS_PASSWORD") {
            *redis = redis.clone().with_password(password);
        }
        if let Some(db) = get_env_parsed("REDIS_DB")? {
            redis.database = db;
        }
        if let Some(prefix) = get_env_string("REDIS_KEY_PREFIX") {
            *redis = redis.clone().with_key_prefix(prefix);
        }

        // PostgreSQL
        let postgres = &mut config.backends.postgres;
        if let Some(host) = get_env_string("POSTGRES_HOST") {
            postgres.host = host;
        }
        if let Some(port) = get_env_parsed("POSTGRES_PORT")? {
            postgres.port = port;
        }
        if let Some(user) = get_env_string("POSTGRES_USER") {
            postgres.user = user;
        }
        if let Some(password) = get_env_string("POSTGRES_PASSWORD") {
            *postgres = postgres.clone().with_password(password);
        }
        if let Some(database) = get_env_string("POSTGRES_DB") {
            postgres.database = database;
        }
        if let Some(pool_size) = get_env_parsed("POSTGRES_POOL_SIZE")? {
            postgres.pool_size = pool_size;
        }

        // MongoDB
        let mongodb = &mut config.backends.mongodb;
        if let Some(uri) = get_env_string("MONGODB_URI") {
            mongodb.uri = uri;
        }
        if let Some(database) = get_env_string("MONGODB_DATABASE") {
            mongodb.database = database;
        }
        if let Some(collection) = get_env_string("MONGODB_COLLECTION") {
            mongodb.collection = collection;
        }

        // Logging
        if let Some(level) = get_env_string("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = get_env_parsed("LOG_FORMAT")? {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Access policy built from the allow-list and read-only list
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::from_lists(&self.allowed_files, &self.read_only_files)
    }

    /// The validated tenant id
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `USER_ID` is not a valid identifier.
    pub fn tenant(&self) -> Result<TenantId, ConfigError> {
        TenantId::parse(&self.user_id).map_err(|e| ConfigError::InvalidEnvVar {
            key: "USER_ID".to_string(),
            message: e.to_string(),
        })
    }

    /// Record TTL; zero or unset disables expiry
    pub fn ttl(&self) -> Option<TtlConfig> {
        self.ttl_minutes
            .filter(|minutes| *minutes > 0)
            .map(TtlConfig::from_minutes)
    }

    /// Check cross-field constraints that single variables cannot express
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tenant()?;
        if let Some(minutes) = self.ttl_minutes.filter(|m| *m > MAX_TTL_MINUTES) {
            return Err(ConfigError::InvalidEnvVar {
                key: "TTL_MINUTES".to_string(),
                message: format!("{minutes} exceeds the maximum of {MAX_TTL_MINUTES} minutes"),
            });
        }
        for path in &self.read_only_files {
            let valid = path
                .split_once('/')
                .is_some_and(|(ns, key)| !ns.is_empty() && !key.is_empty() && !key.contains('/'));
            if !valid {
                return Err(ConfigError::InvalidEnvVar {
                    key: "READ_ONLY_FILES".to_string(),
                    message: format!("entry '{path}' must have the form namespace/key"),
                });
            }
        }
        if self.transport == Transport::StreamableHttp && self.http.host.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar {
                key: "HOST".to_string(),
                message: "cannot be empty with the streamable-http transport".to_string(),
            });
        }
        if self.files_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "files_dir cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `.env` from the working directory, if present
pub fn load_dotenv() -> bool {
    dotenv::dotenv().is_ok()
}

fn get_env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn get_env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) if val.trim().is_empty() => Ok(None),
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid value '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}
