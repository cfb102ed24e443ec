use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use portal::config::{load_config, validation::validate_config, ConfigError};
use portal::http::HttpServer;
use portal::lifecycle::{wait_for_signal, Shutdown};
use portal::observability::{logging, metrics};

/// Token-gated web portal: browser terminal, file browser and a streaming
/// reverse proxy in front of one backend.
#[derive(Parser)]
#[command(name = "portal", version)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding config and `PORTAL_PORT`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "portal starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.origin,
        files_root = %config.files.root.display(),
        base_dir = %config.backend.base_dir.display(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
