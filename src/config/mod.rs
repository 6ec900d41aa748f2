//! Configuration management.
//!
//! Settings come from an optional TOML file, then environment overrides
//! (`ITEMDB_*`), then command-line flags applied by the binary.

use crate::storage::StoreBackendType;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "items";

/// Default HTTP bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default Prometheus exporter port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Main configuration for itemdb.
#[derive(Debug, Clone, Default)]
pub struct ItemdbConfig {
    /// Storage backend settings.
    pub storage: StorageSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// Storage backend settings.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Backend kind.
    pub backend: StoreBackendType,
    /// Document or database path for file-based backends.
    ///
    /// `None` selects the platform default for the backend.
    pub path: Option<PathBuf>,
    /// Connection URL for network backends.
    pub connection_url: Option<String>,
    /// Collection (table / key) name.
    pub collection: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackendType::default(),
            path: None,
            connection_url: None,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerSettings {
    /// Returns the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format (`pretty` or `json`).
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `info` or `itemdb=debug`.
    pub filter: Option<String>,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

/// Metrics settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Whether the Prometheus exporter is installed.
    pub enabled: bool,
    /// Exporter listen port.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_METRICS_PORT,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Storage section.
    pub storage: Option<ConfigFileStorage>,
    /// Server section.
    pub server: Option<ConfigFileServer>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Storage section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileStorage {
    /// Backend name.
    pub backend: Option<String>,
    /// Document or database path.
    pub path: Option<String>,
    /// Connection URL.
    pub connection_url: Option<String>,
    /// Collection name.
    pub collection: Option<String>,
}

/// Server section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileServer {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileMetrics {
    /// Whether metrics are enabled.
    pub enabled: Option<bool>,
    /// Exporter port.
    pub port: Option<u16>,
}

impl ItemdbConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the effective configuration.
    ///
    /// Reads `path` when given, otherwise the default location, then applies
    /// environment overrides. The second value is the error from a default
    /// location file that was skipped; logging is not up yet at this point,
    /// so the caller reports it.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file cannot be read or parsed, or an
    /// environment override has an invalid value.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<Error>)> {
        let (mut config, skipped) = match path {
            Some(path) => (Self::load_from_file(path)?, None),
            None => Self::load_default(),
        };
        config.apply_env_overrides()?;
        Ok((config, skipped))
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or a value is invalid.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Reads `itemdb/config.toml` under the platform config dir.
    pub fn load_default() -> (Self, Option<Error>) {
        match Self::default_path() {
            Some(path) => Self::load_optional(&path),
            None => (Self::default(), None),
        }
    }

    /// Loads `path` if it exists.
    ///
    /// A missing file yields the defaults. A file that cannot be read or
    /// parsed also yields the defaults, together with the load error.
    pub fn load_optional(path: &Path) -> (Self, Option<Error>) {
        if !path.exists() {
            return (Self::default(), None);
        }

        match Self::load_from_file(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Returns the default config file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.config_dir().join("itemdb").join("config.toml"))
    }

    /// Converts a `ConfigFile` to `ItemdbConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(storage) = file.storage {
            if let Some(backend) = storage.backend {
                config.storage.backend = backend.parse()?;
            }
            config.storage.path = storage.path.map(PathBuf::from);
            config.storage.connection_url = storage.connection_url;
            if let Some(collection) = storage.collection {
                config.storage.collection = collection;
            }
        }
        if let Some(server) = file.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
        }
        if let Some(logging) = file.logging {
            config.logging.format = logging.format;
            config.logging.filter = logging.filter;
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(metrics) = file.metrics {
            if let Some(enabled) = metrics.enabled {
                config.metrics.enabled = enabled;
            }
            if let Some(port) = metrics.port {
                config.metrics.port = port;
            }
        }

        Ok(config)
    }

    /// Applies `ITEMDB_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable has an invalid value.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable has an invalid value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(backend) = var("ITEMDB_STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = var("ITEMDB_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }
        if let Some(url) = var("ITEMDB_DATABASE_URL") {
            self.storage.connection_url = Some(url);
        }
        if let Some(collection) = var("ITEMDB_COLLECTION") {
            self.storage.collection = collection;
        }
        if let Some(host) = var("ITEMDB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("ITEMDB_PORT") {
            self.server.port = parse_port("ITEMDB_PORT", &port)?;
        }
        if let Some(format) = var("ITEMDB_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
        if let Some(filter) = var("ITEMDB_LOG") {
            self.logging.filter = Some(filter);
        }
        if let Some(enabled) = var("ITEMDB_METRICS_ENABLED") {
            self.metrics.enabled = parse_bool("ITEMDB_METRICS_ENABLED", &enabled)?;
        }
        if let Some(port) = var("ITEMDB_METRICS_PORT") {
            self.metrics.port = parse_port("ITEMDB_METRICS_PORT", &port)?;
        }

        Ok(())
    }

    /// Sets the storage backend.
    #[must_use]
    pub fn with_backend(mut self, backend: StoreBackendType) -> Self {
        self.storage.backend = backend;
        self
    }

    /// Sets the storage path.
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.path = Some(path.into());
        self
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .map_err(|e| Error::InvalidInput(format!("{key}={value}: {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{key}={value}: expected a boolean"
        ))),
    }
}
