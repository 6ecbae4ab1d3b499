//! Histoseek Server - REST API for color-histogram image similarity search
//!
//! Exposes histoseek-core over HTTP:
//! - POST /search - Rank the images of a dataset directory against a query image
//! - GET /health - Health check

use histoseek_server::{create_router_with_config, Config};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "histoseek_server=info,histoseek_core=info,tower_http=info,warn";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let config = Config::from_env();
    let addr = config.socket_addr();

    tracing::info!(
        dataset_root = %config.dataset_root.display(),
        default_workers = config.default_workers,
        max_workers = config.max_workers,
        timeout_secs = config.timeout_secs,
        "Starting histoseek-server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let app = create_router_with_config(&config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
