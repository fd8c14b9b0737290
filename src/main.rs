//! Chat Bus Server - Entry Point
//!
//! Starts the dispatcher and the WebSocket listener, accepting connections.

use std::env;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_bus::{handle_connection, Broker, BusConfig};

/// Default server address
const DEFAULT_ADDR: &str = "0.0.0.0:1234";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_bus=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_bus=info")),
        )
        .init();

    // Get bind address from command line or use default
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    // Queue capacities and overflow policy from CHAT_BUS_* variables
    let config = BusConfig::from_env()?;
    info!(
        "Bus config: intake {} / mailbox {} / {:?} on overflow",
        config.intake_capacity, config.mailbox_capacity, config.overflow
    );

    let listener = TcpListener::bind(&addr).await?;
    info!("Chat bus listening on {}", addr);

    let broker = Broker::start(&config);

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("New connection from {}", peer);
                let broker = broker.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, broker).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
