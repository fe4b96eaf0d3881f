//! # QB Node
//!
//! Entry point of a replica or client process.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (defaults, `QB_CONFIG`, env overrides) and validate it
//! 3. Build the key service and authenticator for this node
//! 4. Spawn the workers and bind the HTTP server
//! 5. Run until Ctrl+C, then shut the workers down

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use node_runtime::{HttpTransport, NodeConfig, NodeContainer, NodeRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = NodeConfig::load().context("Failed to load configuration")?;
    let listen_addr = config.listen_addr;
    let transport = HttpTransport::from_config(&config).context("Failed to build transport")?;
    let container = NodeContainer::new(config).context("Invalid configuration")?;

    info!("===========================================");
    info!("  QB Node Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("  Node: {}", container.node_name());
    info!("===========================================");

    let runtime = NodeRuntime::start(&container, Arc::new(transport));
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!(addr = %listen_addr, "HTTP server listening");

    axum::serve(listener, runtime.router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server failed")?;

    runtime.shutdown().await;
    Ok(())
}
