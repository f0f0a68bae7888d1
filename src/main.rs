//! Browser-compatible RPC bridge (v1)
//!
//! Lets HTTP/1.1 browser clients call RPC methods that only speak native
//! length-prefixed framing with trailing status.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │                          BRIDGE                          │
//!                  │                                                          │
//!   Client Request │  ┌─────────┐   ┌──────────┐   ┌─────────┐   ┌─────────┐  │
//!   ───────────────┼─▶│  http   │──▶│   text   │──▶│  frame  │──▶│  call   │  │
//!                  │  │ server  │   │ (base64) │   │ decoder │   │ adapter │  │
//!                  │  └─────────┘   └──────────┘   └─────────┘   └────┬────┘  │
//!                  │                                                  │       │
//!                  │                                                  ▼       │
//!                  │                                           ┌──────────┐   │
//!                  │                                           │ service  │   │
//!                  │                                           │dispatcher│   │
//!                  │                                           └────┬─────┘   │
//!                  │                                                │         │
//!   Client Resp.   │  ┌─────────┐   ┌──────────┐   ┌─────────┐   ┌───▼─────┐  │
//!   ◀──────────────┼──│  http   │◀──│   text   │◀──│  frame  │◀──│ status  │  │
//!                  │  │response │   │ (base64) │   │ encoder │   │ mapper  │  │
//!                  │  └─────────┘   └──────────┘   └─────────┘   └─────────┘  │
//!                  │                                                          │
//!                  │  Cross-cutting: config · observability · lifecycle       │
//!                  └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use grpc_web_bridge::config::{load_config, BridgeConfig};
use grpc_web_bridge::lifecycle;
use grpc_web_bridge::observability::{logging, metrics};
use grpc_web_bridge::service::echo;
use grpc_web_bridge::{HttpServer, MethodRegistry, Shutdown};

#[derive(Parser)]
#[command(name = "grpc-web-bridge")]
#[command(about = "Serve RPC methods to browser clients over HTTP/1.1 and HTTP/2", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("grpc-web-bridge v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_receive_message_size = ?config.grpc.max_receive_message_size,
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

    let mut registry = MethodRegistry::new();
    echo::register(&mut registry);
    tracing::info!(methods = registry.len(), "Services registered");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    lifecycle::spawn_ctrl_c_handler(shutdown.clone());

    let server = HttpServer::new(config, Arc::new(registry));
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
