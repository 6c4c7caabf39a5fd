//! modemwatch Binary Entry Point
//!
//! Runs the internet-side collectors (public IP, latency, bandwidth) until
//! interrupted. Router collectors need a protocol client and are only
//! available when the library is embedded.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use modemwatch::{
    AppConfig, ConfigOverrides, MetricsRegistry, Scheduler, SchedulerStatus, config::parse_interval,
    register_collectors,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// modemwatch - Home Router and Internet Link Telemetry
#[derive(Parser, Debug)]
#[command(name = "modemwatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, env = "MODEMWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Router address (overrides config file)
    #[arg(long, env = "ROUTER_HOST")]
    router_host: Option<String>,

    /// Router login user (overrides config file)
    #[arg(long, env = "ROUTER_USERNAME")]
    router_username: Option<String>,

    /// Router login password (overrides config file)
    #[arg(long, env = "ROUTER_PASSWORD", hide_env_values = true)]
    router_password: Option<String>,

    /// Collection interval in seconds or as a duration like `5m`
    #[arg(long, env = "COLLECTION_INTERVAL", value_parser = parse_interval)]
    collection_interval: Option<Duration>,

    /// Speedtest interval in seconds or as a duration like `1h`
    #[arg(long, env = "SPEEDTEST_INTERVAL", value_parser = parse_interval)]
    speedtest_interval: Option<Duration>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            router_host: self.router_host.clone(),
            router_username: self.router_username.clone(),
            router_password: self.router_password.clone(),
            collection_interval: self.collection_interval,
            speedtest_interval: self.speedtest_interval,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,modemwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("modemwatch - Home Router and Internet Link Telemetry");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)?
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            AppConfig::default()
        }
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    config.apply_overrides(cli.overrides());
    config.validate()?;

    tracing::info!(
        collection_interval = %humantime::format_duration(config.collection_interval),
        speedtest_interval = %humantime::format_duration(config.speedtest_interval),
        poll_timeout = %humantime::format_duration(config.poll_timeout),
        router = config.device.as_ref().map(|d| d.host.as_str()).unwrap_or("none"),
        "Configuration loaded"
    );

    let registry = MetricsRegistry::new();
    let mut scheduler = Scheduler::new(registry.clone());
    // No router protocol client ships with the binary.
    let count = register_collectors(&mut scheduler, &config, |_| None).await?;
    tracing::info!("Registered {} collectors", count);

    let status = scheduler.status();
    tracing::info!("Press Ctrl+C to shutdown");
    scheduler.run(shutdown_signal()).await;

    log_final_state(&registry, &status).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Summarize what was collected before exiting.
async fn log_final_state(registry: &MetricsRegistry, status: &SchedulerStatus) {
    for state in status.collectors().await {
        tracing::info!(
            collector = %state.name,
            polls = state.polls,
            consecutive_failures = state.consecutive_failures,
            last_success = ?state.last_success,
            last_error = state.last_error.as_deref().unwrap_or("-"),
            "Collector summary"
        );
    }
    let snapshot = registry.snapshot().await;
    tracing::info!(
        families = snapshot.families().count(),
        series = snapshot.series_count(),
        "Registry summary"
    );
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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

    tracing::info!("Shutting down collectors...");
}
