//! rabbitmq-collector library
//!
//! This crate polls the RabbitMQ management API once and turns the result
//! into an entity/metric/inventory/event payload.
//!
//! One cycle is [`run`]: fetch an [`ApiSnapshot`], read the local node's
//! configuration when inventory is collected, then [`assemble`] the payload.

pub mod cli;
pub mod collector;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod inventory;
pub mod transformer;

use std::io::Write;

use anyhow::Result;
use tracing::{info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{LogFormat, LogLevel};
use crate::collector::{load_ca_certificates, ApiSnapshot, ManagementClient};
use crate::config::Settings;
use crate::error::AppResult;
use crate::inventory::collect_local_config;
use crate::transformer::{assemble, Integration, PayloadFormatter};

/// Initialize the logging subsystem
///
/// Logs go to stderr; stdout carries the payload. `RUST_LOG` overrides the
/// given level and `verbose` raises it to at least `debug`.
///
/// # Errors
/// Returns an error if the logging system fails to initialize
pub fn init_logging(level: LogLevel, format: LogFormat, verbose: bool) -> Result<()> {
    let level = effective_log_level(level, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// `verbose` (from the CLI or `output.verbose`) raises anything above `debug` to `debug`
pub fn effective_log_level(level: LogLevel, verbose: bool) -> LogLevel {
    match level {
        LogLevel::Trace => LogLevel::Trace,
        _ if verbose => LogLevel::Debug,
        other => other,
    }
}

/// Run one collection cycle
///
/// # Errors
/// Returns an error if the client cannot be built or a required resource
/// (nodes, overview) cannot be fetched.
#[instrument(skip(settings), fields(endpoint = %settings.reporting_endpoint()))]
pub async fn run(settings: &Settings) -> AppResult<Integration> {
    let management = &settings.management;
    let certificates = if management.use_ssl {
        load_ca_certificates(
            management.ca_bundle_file.as_deref(),
            management.ca_bundle_dir.as_deref(),
        )?
    } else {
        Vec::new()
    };

    let client = ManagementClient::new(&settings.base_url(), settings.timeout_ms(), certificates)?
        .with_auth(&management.username, &management.password);

    info!(scope = ?settings.scope, "Starting collection cycle");
    let snapshot = ApiSnapshot::gather(&client, &settings.scope).await?;

    let local_config = if settings.scope.has_inventory() {
        collect_local_config(&settings.node, &snapshot.nodes).await
    } else {
        None
    };

    let integration = assemble(settings, &snapshot, local_config.as_ref());
    info!(
        entities = integration.entities().len(),
        "Collection cycle finished"
    );
    Ok(integration)
}

/// Write the payload unless it has no entities
///
/// Returns whether anything was written.
///
/// # Errors
/// Returns an error if serialization or the write fails
pub fn publish<W: Write>(settings: &Settings, integration: &Integration, writer: W) -> AppResult<bool> {
    if integration.is_empty() {
        info!("No entities collected, nothing to publish");
        return Ok(false);
    }

    PayloadFormatter::new()
        .with_pretty(settings.output.pretty)
        .write_to(integration, writer)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_effective_log_level() {
        assert_eq!(effective_log_level(LogLevel::Info, false), LogLevel::Info);
        assert_eq!(effective_log_level(LogLevel::Info, true), LogLevel::Debug);
        assert_eq!(effective_log_level(LogLevel::Error, true), LogLevel::Debug);
        assert_eq!(effective_log_level(LogLevel::Trace, true), LogLevel::Trace);
    }

    #[test]
    fn test_publish_skips_empty_payload() {
        let settings = Config::default().into_settings().unwrap();
        let mut buf = Vec::new();

        let written = publish(&settings, &Integration::default(), &mut buf).unwrap();
        assert!(!written);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_publish_pretty() {
        let mut config = Config::default();
        config.output.pretty = true;
        let settings = config.into_settings().unwrap();

        let mut integration = Integration::default();
        integration
            .entity("rabbit@host1", "node", "localhost:15672", vec![])
            .unwrap();

        let mut buf = Vec::new();
        assert!(publish(&settings, &integration, &mut buf).unwrap());
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\n  \"data\": ["));
    }
}
