mod api;
mod config;
mod discovery;
mod matrix;
mod probe;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::config::{Catalog, Config};
use crate::discovery::command::SystemCommandRunner;
use crate::discovery::resolver;
use crate::probe::Prober;

const DEFAULT_CONFIG_PATH: &str = "homelab-statusd.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("homelab_statusd=info"))
        )
        .init();

    tracing::info!("Starting homelab-statusd");

    // An explicit path must exist; the default one is optional
    let (config_path, explicit) = match std::env::args().nth(1) {
        Some(path) => (path, true),
        None => (DEFAULT_CONFIG_PATH.to_string(), false),
    };

    let config = Config::load_or_default(&config_path, explicit)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    config::validate(&config)
        .with_context(|| format!("Invalid config in {}", config_path))?;

    let port = config.server.listen_port();
    let catalog = Catalog::load(&config.catalog, port);

    let runner = Arc::new(SystemCommandRunner::new(config.discovery.command_timeout()));
    let app_state = api::routes::AppState {
        catalog: Arc::new(catalog),
        resolver: resolver::platform_resolver(runner),
        prober: Prober::new(&config.probe),
    };
    let app = api::routes::router(app_state, &config.server.static_dir);

    let listen = SocketAddr::new(config.server.bind, port);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;

    tracing::info!("homelab-statusd running on http://localhost:{}", port);

    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");
    cancel.cancel();

    if let Err(e) = server_handle.await {
        tracing::error!("Server task failed: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
