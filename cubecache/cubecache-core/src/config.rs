//! Engine configuration.
//!
//! Configuration is read from a TOML document and can be overridden with
//! environment variables:
//!
//! ```toml
//! [cache]
//! max_capacity = 50000000
//! default_time_window = 20
//!
//! [cache.expirations]
//! file_list_ms = 900000
//! metadata_ms = 3600000
//!
//! [[databases]]
//! id = "StatFin"
//! revalidation_interval_ms = 60000
//! ```

use crate::error::{CubeError, Result};
use crate::id::DatabaseId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

// Environment variable names
pub const ENV_MAX_CAPACITY: &str = "CUBECACHE_MAX_CAPACITY";
pub const ENV_TIME_WINDOW: &str = "CUBECACHE_TIME_WINDOW";
pub const ENV_REVALIDATION_MS: &str = "CUBECACHE_REVALIDATION_MS";

/// Number of latest time values selected when a query leaves the time axis unfiltered
pub const DEFAULT_TIME_WINDOW: usize = 20;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

/// Bounded store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Weighted capacity of the shared store (data entries weigh their cell count)
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Time values kept when the time axis has no explicit filter
    #[serde(default = "default_time_window")]
    pub default_time_window: usize,
    #[serde(default)]
    pub expirations: ExpirationConfig,
}

/// Per-category time-to-live in milliseconds; unset means entries never expire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpirationConfig {
    pub file_list_ms: Option<u64>,
    pub last_modified_ms: Option<u64>,
    pub metadata_ms: Option<u64>,
    pub data_ms: Option<u64>,
}

/// Settings for one database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub id: String,
    /// How long cached entries are trusted before the source's modification
    /// time is re-checked; unset or zero disables revalidation
    #[serde(default)]
    pub revalidation_interval_ms: Option<u64>,
}

fn default_max_capacity() -> u64 {
    100_000_000
}

fn default_time_window() -> usize {
    DEFAULT_TIME_WINDOW
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            default_time_window: default_time_window(),
            expirations: ExpirationConfig::default(),
        }
    }
}

impl ExpirationConfig {
    pub fn file_list(&self) -> Option<Duration> {
        self.file_list_ms.map(Duration::from_millis)
    }

    pub fn last_modified(&self) -> Option<Duration> {
        self.last_modified_ms.map(Duration::from_millis)
    }

    pub fn metadata(&self) -> Option<Duration> {
        self.metadata_ms.map(Duration::from_millis)
    }

    pub fn data(&self) -> Option<Duration> {
        self.data_ms.map(Duration::from_millis)
    }
}

impl DatabaseConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revalidation_interval_ms: None,
        }
    }

    pub fn with_revalidation(mut self, interval: Duration) -> Self {
        self.revalidation_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn database_id(&self) -> DatabaseId {
        DatabaseId::new(self.id.clone())
    }

    /// Revalidation interval, `None` when revalidation is disabled
    pub fn revalidation_interval(&self) -> Option<Duration> {
        match self.revalidation_interval_ms {
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails validation
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CubeError::config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&content)?;
        config.merge_env_vars()?;
        config.validate()?;

        info!("Configuration loaded successfully from {}", path.display());
        Ok(config)
    }

    /// Parse a TOML document without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid configuration TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CubeError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is not a valid number
    pub fn merge_env_vars(&mut self) -> Result<()> {
        if let Some(capacity) = env_number::<u64>(ENV_MAX_CAPACITY)? {
            debug!("Overriding max_capacity from environment: {}", capacity);
            self.cache.max_capacity = capacity;
        }

        if let Some(window) = env_number::<usize>(ENV_TIME_WINDOW)? {
            debug!("Overriding default_time_window from environment: {}", window);
            self.cache.default_time_window = window;
        }

        if let Some(interval) = env_number::<u64>(ENV_REVALIDATION_MS)? {
            for database in &mut self.databases {
                if database.revalidation_interval_ms.is_none() {
                    database.revalidation_interval_ms = Some(interval);
                }
            }
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_capacity == 0 {
            return Err(CubeError::config("max_capacity must be greater than 0"));
        }

        if self.cache.default_time_window == 0 {
            return Err(CubeError::config(
                "default_time_window must be greater than 0",
            ));
        }

        let mut ids = HashSet::new();
        for database in &self.databases {
            if database.id.trim().is_empty() {
                return Err(CubeError::config("database id cannot be empty"));
            }
            if !ids.insert(database.id.as_str()) {
                return Err(CubeError::config(format!(
                    "database '{}' is configured more than once",
                    database.id
                )));
            }
        }

        if self.databases.is_empty() {
            warn!("No databases configured");
        }

        Ok(())
    }

    pub fn database(&self, id: &DatabaseId) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|d| d.id == id.as_str())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CubeError::config(format!("{} must be a number, got '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
