//! Configuration module for Outlay.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Outlay.
///
/// Sections missing from the file take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub connectivity: ConnectivityConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding expenses and sync state.
    pub database: PathBuf,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic sync attempts.
    pub interval_secs: u64,
    /// Seconds a gateway submission may take before it counts as failed.
    pub gateway_timeout_secs: u64,
    /// First retry delay after a failed sync (doubles per failure).
    pub backoff_base_secs: u64,
    /// Upper bound for the retry delay.
    pub backoff_max_secs: u64,
    /// Whether regaining connectivity triggers an immediate sync.
    pub sync_on_reconnect: bool,
}

/// Network reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Host the TCP probe connects to.
    pub probe_host: String,
    /// Port the TCP probe connects to.
    pub probe_port: u16,
    /// Seconds between background probes.
    pub probe_interval_secs: u64,
    /// Milliseconds before a probe connection attempt is abandoned.
    pub probe_timeout_ms: u64,
}

/// Remote sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Directory that receives one JSON document per synced record.
    pub drop_dir: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/outlay/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("outlay")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("outlay")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: data_dir().join("outlay.db"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            gateway_timeout_secs: 30,
            backoff_base_secs: 2,
            backoff_max_secs: 300,
            sync_on_reconnect: true,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_host: "1.1.1.1".to_string(),
            probe_port: 443,
            probe_interval_secs: 10,
            probe_timeout_ms: 2000,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            drop_dir: data_dir().join("remote"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- storage ---
        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".into(),
                message: "must not be empty".into(),
            });
        }

        // --- sync ---
        positive(&mut errors, "sync.interval_secs", self.sync.interval_secs);
        positive(
            &mut errors,
            "sync.gateway_timeout_secs",
            self.sync.gateway_timeout_secs,
        );
        positive(
            &mut errors,
            "sync.backoff_base_secs",
            self.sync.backoff_base_secs,
        );
        if self.sync.backoff_max_secs < self.sync.backoff_base_secs {
            errors.push(ValidationError {
                field: "sync.backoff_max_secs".into(),
                message: format!(
                    "backoff_max_secs ({}) must not be below backoff_base_secs ({})",
                    self.sync.backoff_max_secs, self.sync.backoff_base_secs
                ),
            });
        }

        // --- connectivity ---
        if self.connectivity.probe_host.trim().is_empty() {
            errors.push(ValidationError {
                field: "connectivity.probe_host".into(),
                message: "must not be empty".into(),
            });
        }
        if self.connectivity.probe_port == 0 {
            errors.push(ValidationError {
                field: "connectivity.probe_port".into(),
                message: "must be in range 1..=65535".into(),
            });
        }
        positive(
            &mut errors,
            "connectivity.probe_interval_secs",
            self.connectivity.probe_interval_secs,
        );
        positive(
            &mut errors,
            "connectivity.probe_timeout_ms",
            self.connectivity.probe_timeout_ms,
        );

        // --- remote ---
        if self.remote.drop_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "remote.drop_dir".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use outlay_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .storage_database(PathBuf::from("/tmp/outlay.db"))
///     .sync_interval_secs(120)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- storage ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    // --- sync ---

    pub fn sync_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.interval_secs = seconds;
        self
    }

    pub fn sync_gateway_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.gateway_timeout_secs = seconds;
        self
    }

    pub fn sync_backoff_base_secs(mut self, seconds: u64) -> Self {
        self.config.sync.backoff_base_secs = seconds;
        self
    }

    pub fn sync_backoff_max_secs(mut self, seconds: u64) -> Self {
        self.config.sync.backoff_max_secs = seconds;
        self
    }

    pub fn sync_on_reconnect(mut self, enabled: bool) -> Self {
        self.config.sync.sync_on_reconnect = enabled;
        self
    }

    // --- connectivity ---

    pub fn connectivity_probe_host(mut self, host: impl Into<String>) -> Self {
        self.config.connectivity.probe_host = host.into();
        self
    }

    pub fn connectivity_probe_port(mut self, port: u16) -> Self {
        self.config.connectivity.probe_port = port;
        self
    }

    pub fn connectivity_probe_interval_secs(mut self, seconds: u64) -> Self {
        self.config.connectivity.probe_interval_secs = seconds;
        self
    }

    pub fn connectivity_probe_timeout_ms(mut self, millis: u64) -> Self {
        self.config.connectivity.probe_timeout_ms = millis;
        self
    }

    // --- remote ---

    pub fn remote_drop_dir(mut self, dir: PathBuf) -> Self {
        self.config.remote.drop_dir = dir;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
