//! CLI argument parsing for rabbitmq-collector
//!
//! Every configuration file field has a flag and an environment variable.
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: rabbitmq-config.yaml, env: RABBITMQ_CONFIG)
//! - `--hostname`, `--port`, `--username`, `--password`: Management API endpoint and credentials
//! - `--management-path-prefix`: Prefix for every API path (e.g. `/rabbitmq`)
//! - `--use-ssl`, `--ca-bundle-file`, `--ca-bundle-dir`: TLS and extra CA certificates
//! - `--timeout`: HTTP timeout in seconds
//! - `--node-name-override`, `--config-path`: Local node inventory
//! - `--queues`, `--queues-regexes`, `--exchanges`, `--exchanges-regexes`,
//!   `--vhosts`, `--vhosts-regexes`: JSON array allow-lists
//! - `--disable-entities`, `--queues-max-limit`: Collection limits
//! - `--metrics`, `--inventory`, `--events`: Collect only these parts
//! - `--verbose`, `--pretty`: Debug logging, indented payload
//! - `--show-version`: Print build information and exit
//! - `--validate`: Validate configuration without polling
//! - `--log-level` / `-l`, `--log-format`: Logging to stderr
//!
//! # Precedence
//!
//! Configuration values are resolved in the following order (highest to lowest priority):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

/// rabbitmq-collector - RabbitMQ management API collector
///
/// Polls the RabbitMQ management API once and prints entities, metrics,
/// inventory and events as a single JSON payload on stdout.
#[derive(Parser, Debug)]
#[command(name = "rabbitmq-collector")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "rabbitmq-config.yaml",
        env = "RABBITMQ_CONFIG"
    )]
    pub config: PathBuf,

    /// Management API hostname
    #[arg(long, value_name = "HOST", env = "RABBITMQ_HOSTNAME")]
    pub hostname: Option<String>,

    /// Management API port
    #[arg(long, value_name = "PORT", env = "RABBITMQ_PORT")]
    pub port: Option<u16>,

    /// Management API username
    #[arg(long, value_name = "USERNAME", env = "RABBITMQ_USERNAME")]
    pub username: Option<String>,

    /// Management API password
    #[arg(long, value_name = "PASSWORD", env = "RABBITMQ_PASSWORD")]
    pub password: Option<String>,

    /// Prefix prepended to every management API path
    #[arg(long, value_name = "PATH", env = "RABBITMQ_MANAGEMENT_PATH_PREFIX")]
    pub management_path_prefix: Option<String>,

    /// Connect over HTTPS (`--use-ssl` alone means true)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        env = "RABBITMQ_USE_SSL"
    )]
    pub use_ssl: Option<bool>,

    /// PEM file with additional CA certificates
    #[arg(long, value_name = "FILE", env = "RABBITMQ_CA_BUNDLE_FILE")]
    pub ca_bundle_file: Option<PathBuf>,

    /// Directory of PEM files with additional CA certificates
    #[arg(long, value_name = "DIR", env = "RABBITMQ_CA_BUNDLE_DIR")]
    pub ca_bundle_dir: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECONDS", env = "RABBITMQ_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Name of the local node, instead of asking rabbitmqctl
    #[arg(long, value_name = "NODE", env = "RABBITMQ_NODE_NAME_OVERRIDE")]
    pub node_name_override: Option<String>,

    /// Path of the local node's rabbitmq.conf
    #[arg(long, value_name = "FILE", env = "RABBITMQ_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// JSON array of queue names to collect
    #[arg(long, value_name = "JSON", env = "RABBITMQ_QUEUES")]
    pub queues: Option<String>,

    /// JSON array of queue name regexes to collect
    #[arg(long, value_name = "JSON", env = "RABBITMQ_QUEUES_REGEXES")]
    pub queues_regexes: Option<String>,

    /// JSON array of exchange names to collect
    #[arg(long, value_name = "JSON", env = "RABBITMQ_EXCHANGES")]
    pub exchanges: Option<String>,

    /// JSON array of exchange name regexes to collect
    #[arg(long, value_name = "JSON", env = "RABBITMQ_EXCHANGES_REGEXES")]
    pub exchanges_regexes: Option<String>,

    /// JSON array of vhost names to collect
    #[arg(long, value_name = "JSON", env = "RABBITMQ_VHOSTS")]
    pub vhosts: Option<String>,

    /// JSON array of vhost name regexes to collect
    #[arg(long, value_name = "JSON", env = "RABBITMQ_VHOSTS_REGEXES")]
    pub vhosts_regexes: Option<String>,

    /// Skip queue and exchange inventory (`--disable-entities` alone means true)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        env = "RABBITMQ_DISABLE_ENTITIES"
    )]
    pub disable_entities: Option<bool>,

    /// Skip all queues when more than this many are included (0 = unlimited)
    #[arg(long, value_name = "N", env = "RABBITMQ_QUEUES_MAX_LIMIT")]
    pub queues_max_limit: Option<usize>,

    /// Collect metrics
    #[arg(long, env = "RABBITMQ_METRICS")]
    pub metrics: bool,

    /// Collect inventory
    #[arg(long, env = "RABBITMQ_INVENTORY")]
    pub inventory: bool,

    /// Collect events
    #[arg(long, env = "RABBITMQ_EVENTS")]
    pub events: bool,

    /// Debug logging
    #[arg(short, long, env = "RABBITMQ_VERBOSE")]
    pub verbose: bool,

    /// Indent the JSON payload
    #[arg(long, env = "RABBITMQ_PRETTY")]
    pub pretty: bool,

    /// Print build information and exit
    #[arg(long)]
    pub show_version: bool,

    /// Validate configuration without polling
    #[arg(long)]
    pub validate: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "RABBITMQ_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log line format
    #[arg(long, value_enum, default_value = "text", env = "RABBITMQ_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Output format for --validate
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// Overlay the given flags onto a loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        let m = &mut config.management;
        override_with(&mut m.hostname, &self.hostname);
        override_with(&mut m.port, &self.port);
        override_with(&mut m.username, &self.username);
        override_with(&mut m.password, &self.password);
        override_with(&mut m.management_path_prefix, &self.management_path_prefix);
        override_with(&mut m.use_ssl, &self.use_ssl);
        override_option(&mut m.ca_bundle_file, &self.ca_bundle_file);
        override_option(&mut m.ca_bundle_dir, &self.ca_bundle_dir);
        override_with(&mut m.timeout, &self.timeout);

        override_option(&mut config.node.node_name_override, &self.node_name_override);
        override_option(&mut config.node.config_path, &self.config_path);

        let f = &mut config.filters;
        override_option(&mut f.queues, &self.queues);
        override_option(&mut f.queues_regexes, &self.queues_regexes);
        override_option(&mut f.exchanges, &self.exchanges);
        override_option(&mut f.exchanges_regexes, &self.exchanges_regexes);
        override_option(&mut f.vhosts, &self.vhosts);
        override_option(&mut f.vhosts_regexes, &self.vhosts_regexes);

        let c = &mut config.collection;
        override_with(&mut c.disable_entities, &self.disable_entities);
        override_with(&mut c.queues_max_limit, &self.queues_max_limit);
        c.metrics |= self.metrics;
        c.inventory |= self.inventory;
        c.events |= self.events;

        config.output.verbose |= self.verbose;
        config.output.pretty |= self.pretty;
    }
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

fn override_option<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

/// Build information printed by `--show-version`
pub fn version_info() -> String {
    format!(
        "New Relic Rabbitmq integration Version: {}, Platform: {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log line format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Output format options for validate mode
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["rabbitmq-collector"]);
        assert_eq!(cli.config, PathBuf::from("rabbitmq-config.yaml"));
        assert_eq!(cli.hostname, None);
        assert_eq!(cli.port, None);
        assert_eq!(cli.use_ssl, None);
        assert_eq!(cli.queues_max_limit, None);
        assert!(!cli.metrics);
        assert!(!cli.inventory);
        assert!(!cli.events);
        assert!(!cli.show_version);
        assert!(!cli.validate);
        assert_eq!(cli.log_level, LogLevel::Info);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.output_format, OutputFormat::Text);
    }

    #[test]
    fn test_cli_with_options() {
        let cli = Cli::parse_from([
            "rabbitmq-collector",
            "-c",
            "custom.yaml",
            "--hostname",
            "rabbit.local",
            "--port",
            "15671",
            "--use-ssl",
            "true",
            "--queues",
            r#"["orders"]"#,
            "--metrics",
            "--inventory",
            "-l",
            "debug",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.yaml"));
        assert_eq!(cli.hostname.as_deref(), Some("rabbit.local"));
        assert_eq!(cli.port, Some(15671));
        assert_eq!(cli.use_ssl, Some(true));
        assert_eq!(cli.queues.as_deref(), Some(r#"["orders"]"#));
        assert!(cli.metrics);
        assert!(cli.inventory);
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_bool_options_work_as_plain_flags() {
        let cli = Cli::parse_from(["rabbitmq-collector", "--use-ssl", "--disable-entities", "--metrics"]);
        assert_eq!(cli.use_ssl, Some(true));
        assert_eq!(cli.disable_entities, Some(true));
        assert!(cli.metrics);

        let cli = Cli::parse_from([
            "rabbitmq-collector",
            "--disable-entities",
            "false",
            "--use-ssl=false",
        ]);
        assert_eq!(cli.use_ssl, Some(false));
        assert_eq!(cli.disable_entities, Some(false));
    }

    #[test]
    fn test_apply_to_overrides_file_values() {
        let mut config = Config::default();
        config.management.hostname = "from-file".into();
        config.management.username = "file-user".into();
        config.collection.queues_max_limit = 10;

        let cli = Cli::parse_from([
            "rabbitmq-collector",
            "--hostname",
            "from-cli",
            "--queues-max-limit",
            "0",
            "--disable-entities",
            "true",
            "--events",
            "--pretty",
        ]);
        cli.apply_to(&mut config);

        assert_eq!(config.management.hostname, "from-cli");
        assert_eq!(config.management.username, "file-user");
        assert_eq!(config.collection.queues_max_limit, 0);
        assert!(config.collection.disable_entities);
        assert!(config.collection.events);
        assert!(!config.collection.metrics);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_apply_to_keeps_file_flags() {
        let mut config = Config::default();
        config.collection.metrics = true;
        config.collection.inventory = true;

        Cli::parse_from(["rabbitmq-collector"]).apply_to(&mut config);
        assert!(config.collection.metrics);
        assert!(config.collection.inventory);
    }

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.starts_with("New Relic Rabbitmq integration Version: "));
        assert!(info.contains(env!("CARGO_PKG_VERSION")));
        assert!(info.contains(std::env::consts::OS));
    }
}
