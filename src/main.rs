//! API gateway dispatch core.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ routing (context path) ──▶ proxy dispatcher
//!                                                                  │
//!                                                    load_balancer pool (select once)
//!                                                                  │
//!                                                  redirect follower + upstream connector
//!                                                                  │
//!     Client Response ◀── streamed body relay ◀────────────── Endpoint
//!
//!     Cross-cutting: config (TOML + hot reload), observability (tracing,
//!     Prometheus, exchange records), lifecycle (signals, graceful shutdown)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gateway_dispatch::config::{load_config, watcher::ConfigWatcher};
use gateway_dispatch::http::HttpServer;
use gateway_dispatch::lifecycle::{wait_for_signal, Shutdown};
use gateway_dispatch::observability::{logging::init_logging, metrics::init_metrics};

#[derive(Parser, Debug)]
#[command(name = "gateway-dispatch", version, about = "API gateway request dispatcher")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        api_count = config.apis.len(),
        "gateway-dispatch starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let (watcher, config_updates) = ConfigWatcher::new(&args.config);
    // Dropping the watcher stops it, so keep it bound for the whole run.
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    let server = HttpServer::new(config);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
