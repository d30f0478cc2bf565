//! collectord binary entry point.
//!
//! Loads a YAML pipeline configuration, builds it from the built-in
//! factories and runs until interrupted or a component fails fatally.

use std::time::Duration;

use clap::Parser;
use collectord::{
    AppConfig, ComponentError, ConfigError, FactoriesBuilder, Service,
    components::build_factories,
    config::parse_duration,
    service::DEFAULT_SHUTDOWN_TIMEOUT,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// collectord - pluggable telemetry collection pipeline
#[derive(Parser, Debug)]
#[command(name = "collectord", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "COLLECTORD_CONFIG"
    )]
    config: String,

    /// Maximum time to wait for components to stop (e.g. `5s`, `500ms`)
    #[arg(long, env = "COLLECTORD_SHUTDOWN_TIMEOUT", value_parser = parse_duration)]
    shutdown_timeout: Option<Duration>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

/// Why the service stopped.
enum Stop {
    Signal(&'static str),
    Fatal(ComponentError),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,collectord=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!(config = %cli.config, "Loading configuration");
    let config = AppConfig::load(&cli.config)?;

    let factories = build_factories(FactoriesBuilder::new()).map_err(ConfigError::Validation)?;
    let service = match Service::build(&factories, &config) {
        Ok(service) => service,
        Err(errors) => {
            for e in &errors {
                tracing::error!(error = %e, "Invalid configuration");
            }
            return Err(ConfigError::Validation(errors).into());
        }
    };

    if cli.check {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    service.start().await?;
    tracing::info!("Press Ctrl+C to shutdown");

    let stop = tokio::select! {
        signal = shutdown_signal() => Stop::Signal(signal),
        Some(e) = service.wait_fatal() => Stop::Fatal(e),
    };

    let timeout = cli.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
    if let Err(e) = service.shutdown_with_timeout(timeout).await {
        tracing::error!(error = %e, "Failed to shut down cleanly");
    }

    match service.encode_metrics() {
        Ok(text) => tracing::debug!(metrics = %text, "Final receiver counters"),
        Err(e) => tracing::warn!(error = %e, "Failed to encode receiver counters"),
    }

    match stop {
        Stop::Signal(signal) => {
            tracing::info!(signal, "Shutdown complete");
            Ok(())
        }
        Stop::Fatal(e) => Err(e.into()),
    }
}

/// Wait for Ctrl+C or SIGTERM and return which one arrived.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
