//! Configuration management for rabbitmq-collector
//!
//! Handles loading the YAML configuration file and validating the merged
//! configuration into immutable [`Settings`].
//!
//! ```yaml
//! management:
//!   hostname: localhost
//!   port: 15672
//!   username: guest
//!   password: guest
//!   timeout: 30
//! filters:
//!   queues: '["orders"]'
//!   vhosts_regexes: '["^prod-"]'
//! collection:
//!   queues_max_limit: 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::entity::{EntityFilter, FilterSpec};
use crate::error::FilterError;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Invalid filter list or pattern
    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Management API connection
    #[serde(default)]
    pub management: ManagementConfig,

    /// Local node inventory
    #[serde(default)]
    pub node: NodeConfig,

    /// Entity allow-lists
    #[serde(default)]
    pub filters: FilterConfig,

    /// What to collect
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Payload output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Management API connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default, skip_serializing)]
    pub password: String,

    /// Prefix prepended to every API path, e.g. `/rabbitmq`
    #[serde(default)]
    pub management_path_prefix: String,

    #[serde(default)]
    pub use_ssl: bool,

    pub ca_bundle_file: Option<PathBuf>,

    pub ca_bundle_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Local node inventory configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Skip `rabbitmqctl` and use this node name
    pub node_name_override: Option<String>,

    /// rabbitmq.conf location; detected from the node's config files if unset
    pub config_path: Option<PathBuf>,
}

/// Filter configuration, each value a JSON array encoded as a string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    pub queues: Option<String>,
    pub queues_regexes: Option<String>,
    pub exchanges: Option<String>,
    pub exchanges_regexes: Option<String>,
    pub vhosts: Option<String>,
    pub vhosts_regexes: Option<String>,
}

/// Collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Do not report inventory entries for queues and exchanges
    #[serde(default)]
    pub disable_entities: bool,

    /// Abandon queue collection above this many included queues (0 = unlimited)
    #[serde(default = "default_queues_max_limit")]
    pub queues_max_limit: usize,

    #[serde(default)]
    pub metrics: bool,

    #[serde(default)]
    pub inventory: bool,

    #[serde(default)]
    pub events: bool,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub pretty: bool,
}

// Default value functions
fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    15672
}

fn default_timeout() -> u64 {
    30
}

fn default_queues_max_limit() -> usize {
    2000
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            management_path_prefix: String::new(),
            use_ssl: false,
            ca_bundle_file: None,
            ca_bundle_dir: None,
            timeout: default_timeout(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            disable_entities: false,
            queues_max_limit: default_queues_max_limit(),
            metrics: false,
            inventory: false,
            events: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    ///
    /// # Note
    /// - If the file doesn't exist, returns `ConfigError::ReadError`
    /// - Use `Config::load_optional()` to treat a missing file as "no file"
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML file, `None` if the file does not exist
    ///
    /// Nothing is logged here: the file is read before logging is set up so
    /// that `output.verbose` can raise the log level.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Validate the configuration and compile the filters
    ///
    /// # Errors
    /// Returns [`ConfigError`] for invalid values, filter lists or patterns
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        self.validate()?;

        let f = &self.filters;
        let filter = EntityFilter::new(
            FilterSpec::from_json("queues", f.queues.as_deref(), f.queues_regexes.as_deref())?,
            FilterSpec::from_json(
                "exchanges",
                f.exchanges.as_deref(),
                f.exchanges_regexes.as_deref(),
            )?,
            FilterSpec::from_json("vhosts", f.vhosts.as_deref(), f.vhosts_regexes.as_deref())?,
        );

        let scope = CollectionScope {
            metrics: self.collection.metrics,
            inventory: self.collection.inventory,
            events: self.collection.events,
        };

        Ok(Settings {
            management: self.management,
            node: self.node,
            filter,
            scope,
            disable_entities: self.collection.disable_entities,
            queues_max_limit: self.collection.queues_max_limit,
            output: self.output,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.management.hostname.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Hostname must not be empty".to_string(),
            ));
        }

        if self.management.port == 0 {
            return Err(ConfigError::ValidationError(
                "Port must be greater than 0".to_string(),
            ));
        }

        if self.management.timeout == 0 {
            return Err(ConfigError::ValidationError(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        let prefix = &self.management.management_path_prefix;
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "Management path prefix must start with '/'".to_string(),
            ));
        }

        if self.collection.metrics && !self.collection.inventory {
            return Err(ConfigError::ValidationError(
                "When collecting metrics, you must also collect inventory".to_string(),
            ));
        }

        Ok(())
    }
}

/// Which parts of the payload to collect
///
/// When no part is selected explicitly, everything is collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionScope {
    pub metrics: bool,
    pub inventory: bool,
    pub events: bool,
}

impl CollectionScope {
    pub fn all(&self) -> bool {
        !self.metrics && !self.inventory && !self.events
    }

    pub fn has_metrics(&self) -> bool {
        self.all() || self.metrics
    }

    pub fn has_inventory(&self) -> bool {
        self.all() || self.inventory
    }

    pub fn has_events(&self) -> bool {
        self.all() || self.events
    }
}

/// Validated, immutable runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub management: ManagementConfig,
    pub node: NodeConfig,
    pub filter: EntityFilter,
    pub scope: CollectionScope,
    pub disable_entities: bool,
    pub queues_max_limit: usize,
    pub output: OutputConfig,
}

impl Settings {
    /// `http[s]://{hostname}:{port}{prefix}`
    pub fn base_url(&self) -> String {
        let scheme = if self.management.use_ssl { "https" } else { "http" };
        format!(
            "{}://{}:{}{}",
            scheme,
            self.management.hostname,
            self.management.port,
            self.management.management_path_prefix
        )
    }

    /// `{hostname}:{port}`, reported on every entity
    pub fn reporting_endpoint(&self) -> String {
        format!("{}:{}", self.management.hostname, self.management.port)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.management.timeout.saturating_mul(1000)
    }

    /// Queue cap, `None` when unlimited
    pub fn queue_limit(&self) -> Option<usize> {
        (self.queues_max_limit > 0).then_some(self.queues_max_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.management.hostname, "localhost");
        assert_eq!(config.management.port, 15672);
        assert_eq!(config.management.timeout, 30);
        assert_eq!(config.collection.queues_max_limit, 2000);
        assert!(!config.collection.disable_entities);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.management.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.management.management_path_prefix = "rabbitmq".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_without_inventory_rejected() {
        let mut config = Config::default();
        config.collection.metrics = true;
        assert!(matches!(
            config.clone().into_settings(),
            Err(ConfigError::ValidationError(_))
        ));

        config.collection.inventory = true;
        assert!(config.into_settings().is_ok());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let mut config = Config::default();
        config.filters.queues_regexes = Some(r#"["[unclosed"]"#.into());
        assert!(matches!(config.into_settings(), Err(ConfigError::Filter(_))));

        let mut config = Config::default();
        config.filters.vhosts = Some("prod".into());
        assert!(matches!(config.into_settings(), Err(ConfigError::Filter(_))));
    }

    #[test]
    fn test_collection_scope() {
        let scope = CollectionScope::default();
        assert!(scope.all());
        assert!(scope.has_metrics() && scope.has_inventory() && scope.has_events());

        let scope = CollectionScope {
            events: true,
            ..Default::default()
        };
        assert!(!scope.has_metrics());
        assert!(!scope.has_inventory());
        assert!(scope.has_events());
    }

    #[test]
    fn test_settings_urls() {
        let mut config = Config::default();
        config.management.hostname = "broker".into();
        config.management.use_ssl = true;
        config.management.port = 15671;
        config.management.management_path_prefix = "/rabbitmq".into();
        let settings = config.into_settings().unwrap();

        assert_eq!(settings.base_url(), "https://broker:15671/rabbitmq");
        assert_eq!(settings.reporting_endpoint(), "broker:15671");
        assert_eq!(settings.timeout_ms(), 30_000);
    }

    #[test]
    fn test_queue_limit() {
        let mut config = Config::default();
        config.collection.queues_max_limit = 0;
        assert_eq!(config.into_settings().unwrap().queue_limit(), None);
        assert_eq!(
            Config::default().into_settings().unwrap().queue_limit(),
            Some(2000)
        );
    }

    #[test]
    fn test_load_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "management:\n  hostname: rabbit1\n  port: 15673\nfilters:\n  queues: '[\"orders\"]'\ncollection:\n  queues_max_limit: 10"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.management.hostname, "rabbit1");
        assert_eq!(config.management.port, 15673);
        assert_eq!(config.management.timeout, 30);
        assert_eq!(config.collection.queues_max_limit, 10);

        let settings = config.into_settings().unwrap();
        assert!(settings.filter.queues.includes("orders"));
        assert!(!settings.filter.queues.includes("logs"));
    }

    #[test]
    fn test_load_optional_missing_file() {
        let config = Config::load_optional("/nonexistent/rabbitmq-config.yaml").unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_load_optional_reads_output_verbose() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "output:\n  verbose: true").unwrap();

        let config = Config::load_optional(file.path()).unwrap().unwrap();
        assert!(config.output.verbose);
        assert!(config.into_settings().unwrap().output.verbose);
    }
}
