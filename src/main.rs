//! myscope Binary Entry Point
//!
//! Runs the configured MySQL collectors on their schedules and stores
//! their records. Core functionality is provided by the `myscope` library crate.

use std::sync::Arc;

use clap::Parser;
use myscope::{
    AppConfig, Collector, CollectorRegistry, MetricSink, MysqlCollector, MysqlConfig,
    StorageBuilder, StorageHandles, collector::run_collection, config::parse_option,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// myscope - MySQL status collector
#[derive(Parser, Debug)]
#[command(name = "myscope", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "MYSCOPE_CONFIG")]
    config: Option<String>,

    /// Database URL (overrides config file)
    #[arg(long, env = "MYSCOPE_DB_URL")]
    db_url: Option<String>,

    /// Collector option as KEY=VALUE (Host, User, Password, Database, ...).
    /// Adds a collector built from these options.
    #[arg(short = 'o', long = "option", value_parser = parse_option)]
    options: Vec<(String, String)>,

    /// Run one collection cycle per collector and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,myscope=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("myscope - MySQL status collector");

    // Parse CLI arguments
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    tracing::info!(
        "Database: {}, collectors: {}",
        config.database.url,
        config.collectors.mysql.len()
    );

    // Build storage layer
    let handles = StorageBuilder::new(&config.database.url)
        .channel_capacity(config.database.channel_capacity)
        .build()
        .await?;
    let sink: Arc<dyn MetricSink> = Arc::new(handles.writer.clone());

    let mut collectors = Vec::new();
    for mysql in &config.collectors.mysql {
        if !mysql.enabled {
            tracing::debug!("Skipping disabled collector: {}", mysql.name);
            continue;
        }
        collectors.push(MysqlCollector::new(mysql, Arc::clone(&sink))?);
    }

    if cli.once {
        run_once(&collectors).await;
        handles.writer.flush().await?;
        handles.shutdown().await?;
        return Ok(());
    }

    // Initialize collector registry
    tracing::info!("Starting collector registry...");
    let registry = CollectorRegistry::new().await?;
    for collector in collectors {
        let name = collector.name().to_string();
        match registry.spawn(collector).await {
            Ok(_) => tracing::info!("Spawned collector: {}", name),
            Err(e) => tracing::error!("Failed to spawn collector '{}': {}", name, e),
        }
    }
    registry.start().await?;

    tracing::info!("Press Ctrl+C to shutdown");
    shutdown_signal().await;
    shutdown(registry, handles).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Load the config file (if any) and apply CLI/env overrides.
///
/// Precedence: CLI > ENV > config file > defaults.
fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            AppConfig::load_with_collector_path(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(url) = &cli.db_url {
        config.database.url = url.clone();
    }

    if !cli.options.is_empty() {
        let mut mysql = MysqlConfig::default();
        for (key, value) in &cli.options {
            mysql.set_option(key, value)?;
        }
        config.collectors.mysql.push(mysql);
    }

    if config.collectors.mysql.is_empty() {
        tracing::info!("No collectors configured, polling localhost");
        config.collectors.mysql.push(MysqlConfig::default());
    }

    config.validate()?;
    Ok(config)
}

/// Run every collector's startup probe and one cycle, in order.
async fn run_once(collectors: &[MysqlCollector]) {
    for collector in collectors {
        if let Err(e) = collector.init().await {
            tracing::warn!(collector = collector.name(), error = %e, "Collector init failed");
            continue;
        }
        run_collection(collector, collector.name()).await;
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}

/// Stop the scheduler first so no cycle submits into a closed writer.
async fn shutdown(registry: CollectorRegistry, handles: StorageHandles) {
    tracing::info!("Shutting down collectors...");
    if let Err(e) = registry.shutdown().await {
        tracing::error!("Failed to shutdown collectors: {}", e);
    }

    tracing::info!("Shutting down storage...");
    if let Err(e) = handles.shutdown().await {
        tracing::error!("Failed to shutdown storage: {}", e);
    }
}
