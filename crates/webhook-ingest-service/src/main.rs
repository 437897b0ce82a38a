//! # Webhook Ingest Service
//!
//! Binary entry point for both pipeline stages:
//!
//! - `webhook-ingest receiver` accepts webhooks and publishes them to Pub/Sub
//! - `webhook-ingest processor` receives Pub/Sub push deliveries and streams
//!   one row per message into BigQuery
//!
//! Exit codes: `3` for configuration errors, `1` when the listen address
//! cannot be bound, `2` for any other startup or server failure.

mod backends;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webhook_ingest_api::{
    processor_router, receiver_router, serve, ConfigError, ConfigSources, LoggingConfig,
    ProcessorSettings, ProcessorState, ReceiverSettings, ReceiverState, ServiceConfig,
    ServiceError, ServiceMetrics,
};
use webhook_ingest_core::RecordProjector;

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

#[derive(Debug, Parser)]
#[command(name = "webhook-ingest", version, about = "Two-stage webhook ingestion pipeline")]
struct Cli {
    /// Configuration file layered over `config/ingest.*`
    #[arg(long, short, env = "INGEST_CONFIG_FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Accept webhooks on `/` and publish them to the topic
    Receiver,

    /// Accept push deliveries on `/` and insert them into the table
    Processor,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ServiceConfig::load(ConfigSources {
        file: cli.config.clone(),
        environment: None,
    }) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = %e, "Failed to load configuration; aborting");
            std::process::exit(3);
        }
    };

    init_tracing(&config.logging);

    let result = match cli.command {
        Command::Receiver => run_receiver(config).await,
        Command::Processor => run_processor(config).await,
    };

    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "Service terminated with an error");
        std::process::exit(exit_code(&e));
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_receiver(config: ServiceConfig) -> anyhow::Result<()> {
    let settings = ReceiverSettings::from_config(&config)?;
    let sink = backends::build_sink(&config.gcp, &settings)
        .context("failed to initialize message sink")?;
    let metrics = ServiceMetrics::new().map_err(ServiceError::from)?;

    info!(
        project = %settings.project,
        topic = %settings.topic,
        port = config.server.port,
        "Starting webhook receiver"
    );

    let state = ReceiverState::new(sink, settings.topic, config.server.max_body_size, metrics);
    serve(receiver_router(state, &config.server), &config.server).await?;
    Ok(())
}

async fn run_processor(config: ServiceConfig) -> anyhow::Result<()> {
    let settings = ProcessorSettings::from_config(&config)?;
    let store = backends::build_store(&config.gcp, &settings)
        .context("failed to initialize row store")?;
    let metrics = ServiceMetrics::new().map_err(ServiceError::from)?;

    info!(
        table = %settings.table,
        port = config.server.port,
        "Starting webhook processor"
    );

    let projector = RecordProjector::new(store, settings.table);
    let state = ProcessorState::new(projector, config.server.max_body_size, metrics);
    serve(processor_router(state, &config.server), &config.server).await?;
    Ok(())
}

fn exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some() {
        return 3;
    }

    match error.downcast_ref::<ServiceError>() {
        Some(ServiceError::Configuration(_)) => 3,
        Some(ServiceError::BindFailed { .. }) => 1,
        _ => 2,
    }
}
