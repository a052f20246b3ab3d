/*!
 * Configuration types for campus-media
 */

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use campus_core_placement::{
    CapacityPolicy, DEFAULT_CAPACITY_LIMIT_BYTES, DEFAULT_OVERHEAD_MARGIN,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};
use crate::probe::{ProbeOptions, DEFAULT_FALLBACK_COLLECTION};
use crate::store::{serialize_redacted, StoreConfig, StoreEntry};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CAMPUS_MEDIA_CONFIG";

/// Config file name looked up in the working and user config directories
pub const CONFIG_FILE_NAME: &str = "campus-media.toml";

/// Where the list of media databases comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogConfig {
    /// The `[[stores]]` array of this file
    Static,

    /// A collection in the site's main database
    Mongo {
        /// Connection string of the main database
        #[serde(serialize_with = "serialize_redacted")]
        uri: SecretString,
        /// Database holding the collection (default: the URI's database)
        #[serde(default)]
        database: Option<String>,
        #[serde(default = "default_catalog_collection")]
        collection: String,
    },
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig::Static
    }
}

/// Main configuration for the media router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Quota of each media database in bytes
    #[serde(default = "default_capacity_limit")]
    pub capacity_limit_bytes: u64,

    /// Usable share of free space, in (0, 1]
    #[serde(default = "default_overhead_margin")]
    pub overhead_margin: f64,

    /// Timeout for each statistics call in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout for connecting to a media database in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Collection probed when database statistics are unavailable
    #[serde(default = "default_fallback_collection")]
    pub fallback_collection: String,

    /// Source of the media database list
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Media databases (used by the static catalog)
    #[serde(default)]
    pub stores: Vec<StoreEntry>,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// JSON log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            capacity_limit_bytes: default_capacity_limit(),
            overhead_margin: default_overhead_margin(),
            probe_timeout_secs: default_probe_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            fallback_collection: default_fallback_collection(),
            catalog: CatalogConfig::default(),
            stores: Vec::new(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_capacity_limit() -> u64 {
    DEFAULT_CAPACITY_LIMIT_BYTES
}

fn default_overhead_margin() -> f64 {
    DEFAULT_OVERHEAD_MARGIN
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_fallback_collection() -> String {
    DEFAULT_FALLBACK_COLLECTION.to_string()
}

fn default_catalog_collection() -> String {
    "mediadbs".to_string()
}

impl RouterConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| RouterError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Config file to use when none is given on the command line.
    ///
    /// Order: `$CAMPUS_MEDIA_CONFIG`, `./campus-media.toml`, then
    /// `<user config dir>/campus-media/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|dir| dir.join("campus-media").join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.policy().validate().map_err(RouterError::Config)?;

        if self.probe_timeout_secs == 0 {
            return Err(RouterError::Config(
                "probe_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(RouterError::Config(
                "connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.fallback_collection.trim().is_empty() {
            return Err(RouterError::Config(
                "fallback_collection must not be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for store in &self.stores {
            if store.name.trim().is_empty() {
                return Err(RouterError::Config(
                    "store names must not be empty".to_string(),
                ));
            }
            if store.uri.expose_secret().trim().is_empty() {
                return Err(RouterError::Config(format!(
                    "store '{}' has an empty uri",
                    store.name
                )));
            }
            if !names.insert(store.name.as_str()) {
                return Err(RouterError::Config(format!(
                    "store name '{}' is used more than once",
                    store.name
                )));
            }
        }

        if let CatalogConfig::Mongo { uri, collection, .. } = &self.catalog {
            if uri.expose_secret().trim().is_empty() {
                return Err(RouterError::Config(
                    "catalog.uri is required for the mongo catalog".to_string(),
                ));
            }
            if collection.trim().is_empty() {
                return Err(RouterError::Config(
                    "catalog.collection must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Capacity policy described by this config
    pub fn policy(&self) -> CapacityPolicy {
        CapacityPolicy::new(self.capacity_limit_bytes, self.overhead_margin)
    }

    /// Probe options described by this config
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            fallback_collection: self.fallback_collection.clone(),
            timeout: Duration::from_secs(self.probe_timeout_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Store entries of the static catalog
    pub fn store_configs(&self) -> Vec<StoreConfig> {
        self.stores.iter().cloned().map(StoreConfig::from).collect()
    }
}
