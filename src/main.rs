//! rabbitmq-collector - RabbitMQ management API collector
//!
//! Runs a single collection cycle and prints the payload on stdout.
//! Exit codes: 0 success, 1 collection or publish failure, 2 configuration error.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, warn};

use rabbitmq_collector::cli::{version_info, Cli, OutputFormat};
use rabbitmq_collector::config::{Config, ConfigError, Settings};
use rabbitmq_collector::error::AppError;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let cli = Cli::parse();

    if cli.show_version {
        println!("{}", version_info());
        return Ok(ExitCode::SUCCESS);
    }

    // Read the config file first so `output.verbose` can raise the log level
    let loaded = Config::load_optional(&cli.config);
    let verbose = cli.verbose || matches!(&loaded, Ok(Some(config)) if config.output.verbose);

    // Initialize logging
    rabbitmq_collector::init_logging(cli.log_level, cli.log_format, verbose)?;

    // Merge and validate configuration
    let settings = match load_settings(&cli, loaded) {
        Ok(settings) => settings,
        Err(e) => return Ok(fail(&e)),
    };

    if cli.validate {
        print_validation(&settings, cli.output_format)?;
        return Ok(ExitCode::SUCCESS);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting rabbitmq-collector"
    );

    let integration = match rabbitmq_collector::run(&settings).await {
        Ok(integration) => integration,
        Err(e) => return Ok(fail(&e)),
    };

    if let Err(e) = rabbitmq_collector::publish(&settings, &integration, std::io::stdout().lock()) {
        return Ok(fail(&e));
    }

    Ok(ExitCode::SUCCESS)
}

fn load_settings(
    cli: &Cli,
    loaded: Result<Option<Config>, ConfigError>,
) -> Result<Settings, AppError> {
    let mut config = loaded?.unwrap_or_else(|| {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
        Config::default()
    });
    cli.apply_to(&mut config);

    let settings = config.into_settings()?;
    debug!(
        endpoint = %settings.base_url(),
        scope = ?settings.scope,
        verbose = settings.output.verbose,
        "Configuration loaded"
    );
    Ok(settings)
}

fn fail(e: &AppError) -> ExitCode {
    error!(error = %e, "rabbitmq-collector failed");
    match u8::try_from(e.exit_code()) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

fn print_validation(settings: &Settings, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Configuration is valid");
            println!("  Endpoint: {}", settings.base_url());
            println!("  Scope: {:?}", settings.scope);
            match settings.queue_limit() {
                Some(limit) => println!("  Queue limit: {limit}"),
                None => println!("  Queue limit: unlimited"),
            }
        }
        OutputFormat::Json => {
            let summary = validation_summary(settings);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Yaml => {
            let summary = validation_summary(settings);
            print!("{}", serde_yaml::to_string(&summary)?);
        }
    }
    Ok(())
}

fn validation_summary(settings: &Settings) -> serde_json::Value {
    serde_json::json!({
        "valid": true,
        "endpoint": settings.base_url(),
        "reporting_endpoint": settings.reporting_endpoint(),
        "metrics": settings.scope.has_metrics(),
        "inventory": settings.scope.has_inventory(),
        "events": settings.scope.has_events(),
        "disable_entities": settings.disable_entities,
        "queues_max_limit": settings.queues_max_limit,
    })
}
