//! Configuration management for the catalog loader
//!
//! Settings are layered: built-in defaults, then a TOML config file, then the
//! collection store environment variables (a `.env` file is honoured by the
//! binary), then command-line flags applied by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::ClientConfig;
use crate::constants::{config as paths, env, limits, store};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Collection store settings
    pub store: StoreConfig,
    /// Catalog walk settings
    pub catalog: CatalogConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Total timeout in seconds for manifest and store requests
    pub request_timeout_secs: u64,
    /// Total timeout in seconds for a resource stream, body included
    pub stream_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retry attempts on 429/503/connection errors
    pub max_retries: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        let runtime = ClientConfig::default();
        Self {
            tcp_keepalive_secs: runtime.tcp_keepalive.map(|d| d.as_secs()),
            tcp_nodelay: runtime.tcp_nodelay,
            pool_idle_timeout_secs: runtime.pool_idle_timeout.map(|d| d.as_secs()),
            pool_max_per_host: runtime.pool_max_per_host,
            request_timeout_secs: runtime.request_timeout.as_secs(),
            stream_timeout_secs: runtime.stream_timeout.as_secs(),
            connect_timeout_secs: runtime.connect_timeout.as_secs(),
            rate_limit_rps: runtime.rate_limit_rps,
            max_retries: runtime.max_retries,
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            stream_timeout: Duration::from_secs(self.stream_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
        }
    }
}

/// Collection store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the collection store
    pub host: Option<String>,
    /// API key sent as `Authorization: ApiKey <key>`
    pub api_key: Option<String>,
    /// Entities per bulk write
    pub bulk_chunk_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            bulk_chunk_size: store::DEFAULT_BULK_CHUNK_SIZE,
        }
    }
}

impl StoreConfig {
    /// API key with all but the last four characters hidden
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(|key| {
            let len = key.chars().count();
            if len <= 4 {
                return "****".to_string();
            }
            let tail: String = key.chars().skip(len - 4).collect();
            format!("****{tail}")
        })
    }
}

/// Catalog walk defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog manifest URL used when none is given on the command line
    pub url: Option<String>,
    /// Frequency applied to datasets that do not declare one
    pub default_frequency: Option<String>,
    /// Dataset names never reconciled
    pub exclude: Vec<String>,
    /// When non-empty, the only dataset names reconciled
    pub include: Vec<String>,
    /// Upper bound on the whole run, e.g. "30m"
    #[serde(with = "humantime_serde")]
    pub deadline: Option<Duration>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            colored_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, project-local file or user config dir)
    /// 3. Environment variables
    ///
    /// Command-line overrides are applied by the caller.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an explicitly given file does not exist or
    /// any config file cannot be read or parsed
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) if path.exists() => Some(path),
            Some(path) => return Err(ConfigError::NotFound { path }),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay the collection store environment variables
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(env::HOST).filter(|v| !v.is_empty()) {
            debug!("Using collection store host from {}", env::HOST);
            self.store.host = Some(host);
        }
        if let Some(key) = lookup(env::API_KEY).filter(|v| !v.is_empty()) {
            debug!("Using collection store API key from {}", env::API_KEY);
            self.store.api_key = Some(key);
        }
    }

    /// Check values that would otherwise fail later at runtime
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first offending field
    pub fn validate(&self) -> ConfigResult<()> {
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be non-zero".to_string(),
            });
        }
        if self.store.bulk_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.bulk_chunk_size".to_string(),
                value: "0".to_string(),
                reason: "Chunk size must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Write a commented default configuration file
    ///
    /// Writes to `path`, or to the user config directory when `path` is
    /// `None`. An existing file is only replaced when `force` is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists (without `force`) or cannot be
    /// written
    pub async fn write_default(path: Option<PathBuf>, force: bool) -> ConfigResult<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "path".to_string(),
                value: config_path.display().to_string(),
                reason: "File already exists; pass --force to overwrite".to_string(),
            });
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Io {
                path: config_path.clone(),
                source,
            })?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Render the effective configuration as TOML with the API key masked
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Serialize` if serialization fails
    pub fn to_display_toml(&self) -> ConfigResult<String> {
        let mut shown = self.clone();
        shown.store.api_key = self.store.masked_api_key();
        Ok(toml::to_string_pretty(&shown)?)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(format!("./{}", paths::LOCAL_FILE_NAME))];
        if let Ok(user_path) = Self::default_config_path() {
            search_paths.push(user_path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Default config file path for the current user
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if the platform has no config dir
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::MissingField {
            field: "user config directory".to_string(),
        })?;
        Ok(config_dir.join(paths::APP_DIR_NAME).join(paths::FILE_NAME))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# Catalog Loader Configuration
# Environment variables {host} and {key} override the [store] table.

[client]
tcp_keepalive_secs = 30
tcp_nodelay = true
pool_idle_timeout_secs = 90
pool_max_per_host = 8
request_timeout_secs = 60  # manifest and store calls
stream_timeout_secs = 3600  # covers draining a whole resource body
connect_timeout_secs = 30
rate_limit_rps = {rps}
max_retries = {retries}

[store]
# host = "https://store.example.org/"
# api_key = "..."
bulk_chunk_size = {chunk}

[catalog]
# url = "https://data.example.org/catalog.json"
# default_frequency = "daily"
exclude = []
include = []
# deadline = "30m"

[logging]
level = "info"  # error, warn, info, debug, trace
colored_output = true
"#,
            host = env::HOST,
            key = env::API_KEY,
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
            retries = limits::MAX_RETRIES,
            chunk = store::DEFAULT_BULK_CHUNK_SIZE,
        )
    }
}
