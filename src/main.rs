//! Caching forward HTTP proxy entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caching_proxy::config::{load_config, validate_config, ProxyConfig};
use caching_proxy::lifecycle::{signals, Shutdown};
use caching_proxy::proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "caching-proxy")]
#[command(about = "A caching forward HTTP proxy", long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(default_value_t = 8992)]
    port: u16,

    /// Response caching, enabled iff this is the literal "true".
    #[arg(default_value = "true")]
    cached: String,

    /// Debug logging, enabled iff this is the literal "true".
    #[arg(default_value = "true")]
    verbose: String,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose == "true";

    // Initialize tracing subscriber
    let default_filter = if verbose {
        "caching_proxy=debug"
    } else {
        "caching_proxy=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("caching-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    // Load configuration, then apply the CLI overrides
    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => ProxyConfig::default(),
    };
    config.listener.bind_address = format!("0.0.0.0:{}", cli.port);
    config.cache.enabled = cli.cached == "true";

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!("{error}");
        }
        return ExitCode::FAILURE;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        cache_enabled = config.cache.enabled,
        max_item_size = config.cache.max_item_size,
        max_total_size = config.cache.max_total_size,
        workers = config.pool.workers,
        "Configuration loaded"
    );

    // Initialize metrics server
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            caching_proxy::observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Bind, wire Ctrl-C to graceful shutdown, and serve
    let server = match ProxyServer::bind(&config).await {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "failed to start proxy");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_ctrl_c_trigger(Arc::clone(&shutdown));

    match server.run(shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "proxy terminated abnormally");
            ExitCode::FAILURE
        }
    }
}
