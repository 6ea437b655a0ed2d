//! WebSocket Tic-tac-toe Server - Entry Point
//!
//! Starts the TCP listener and the expiry reaper, accepting connections.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tictactoe_server::{
    handle_connection, ExpiryReaper, GameServer, InMemoryAuthenticator, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=tictactoe_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tictactoe_server=info")),
        )
        .init();

    let mut config = ServerConfig::from_env();
    // Bind address from command line wins over the environment
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("WebSocket Tic-tac-toe Server listening on {}", config.bind_addr);

    let server = Arc::new(GameServer::new(&config, Arc::new(InMemoryAuthenticator::new())));

    let shutdown = CancellationToken::new();
    let reaper = ExpiryReaper::new(Arc::clone(&server), &config);
    tokio::spawn(reaper.run(shutdown.clone()));

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let server = Arc::clone(&server);

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, server).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                shutdown.cancel();
                break;
            }
        }
    }

    Ok(())
}
