//! WebSocket Tic-tac-toe Server Library
//!
//! A real-time two-player tic-tac-toe server built with tokio-tungstenite,
//! with a minimax AI opponent for solo play.
//!
//! # Features
//! - Rooms addressed by 6-digit codes, X and O slots assigned on join
//! - Server-authoritative turns: the acting symbol comes from the session
//! - Reconnects reclaim the slot held by the same identity
//! - AI opponent with alpha-beta search and a shared score cache
//! - Optional accounts through a pluggable `Authenticator`
//! - Background eviction of abandoned rooms
//!
//! # Architecture
//! - `GameServer` owns the client map, the `RoomStore` and the `SessionRegistry`
//! - Each connection has a `handler` task that calls into the shared server
//! - Every room sits behind its own async mutex; rooms never contend
//! - `ExpiryReaper` runs on its own task and locks a room before evicting it
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tictactoe_server::{handle_connection, GameServer, InMemoryAuthenticator, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let server = Arc::new(GameServer::new(&config, Arc::new(InMemoryAuthenticator::new())));
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, Arc::clone(&server)));
//!     }
//! }
//! ```

pub mod ai;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod game;
pub mod handler;
pub mod message;
pub mod reaper;
pub mod room;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use ai::AiEngine;
pub use auth::{Authenticator, InMemoryAuthenticator, UserIdentity};
pub use cache::ScoreCache;
pub use client::Client;
pub use config::ServerConfig;
pub use error::{AppError, ErrorKind, SendError};
pub use game::{Board, Outcome};
pub use handler::handle_connection;
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use reaper::ExpiryReaper;
pub use room::{GameState, Room, RoomStatus};
pub use server::{GameServer, ServerCommand};
pub use session::{Session, SessionRegistry};
pub use store::{RoomHandle, RoomStore};
pub use types::{ConnectionId, Identity, RoomCode, Symbol};
