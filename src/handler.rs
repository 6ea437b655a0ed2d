//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! message parsing, and bidirectional communication with the GameServer.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::{GameServer, ServerCommand};
use crate::types::ConnectionId;

/// Outbound buffer per connection
const OUTBOUND_BUFFER_SIZE: usize = 32;

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, sets up bidirectional communication,
/// and manages the connection lifecycle.
pub async fn handle_connection(
    stream: TcpStream,
    server: Arc<GameServer>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = ConnectionId::new();
    info!("Client {} connected from {}", connection_id, peer_addr);

    // Channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER_SIZE);

    server
        .handle_command(ServerCommand::Connect {
            connection_id,
            sender: msg_tx.clone(),
        })
        .await;

    let connected_msg = ServerMessage::Connected {
        connection_id: connection_id.to_string(),
    };
    let json = serde_json::to_string(&connected_msg)?;
    ws_sender.send(Message::Text(json.into())).await?;

    // Read task (WebSocket -> GameServer), one command at a time
    let read_server = Arc::clone(&server);
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        let cmd = client_message_to_command(connection_id, client_msg);
                        read_server.handle_command(cmd).await;
                    }
                    Err(e) => {
                        warn!("Invalid JSON from {}: {}", connection_id, e);
                        if msg_tx.send(AppError::Json(e).into()).await.is_err() {
                            break;
                        }
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", connection_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", connection_id);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", connection_id);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", connection_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", connection_id);
    });

    // Write task (ServerMessage -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for {}", connection_id);

        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", connection_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", connection_id);
        }
    }

    server
        .handle_command(ServerCommand::Disconnect { connection_id })
        .await;

    info!("Client {} disconnected", connection_id);

    Ok(())
}

/// Convert a ClientMessage to a ServerCommand
fn client_message_to_command(connection_id: ConnectionId, msg: ClientMessage) -> ServerCommand {
    match msg {
        ClientMessage::Register { username, password } => ServerCommand::Register {
            connection_id,
            username,
            password,
        },
        ClientMessage::Login { username, password } => ServerCommand::Login {
            connection_id,
            username,
            password,
        },
        ClientMessage::Logout => ServerCommand::Logout { connection_id },
        ClientMessage::CreateRoom { display_name } => ServerCommand::CreateRoom {
            connection_id,
            display_name,
        },
        ClientMessage::JoinRoom {
            room_code,
            display_name,
        } => ServerCommand::JoinRoom {
            connection_id,
            room_code,
            display_name,
        },
        ClientMessage::MakeMove {
            room_code,
            cell_index,
        } => ServerCommand::MakeMove {
            connection_id,
            room_code,
            cell_index,
        },
        ClientMessage::PlayVsAi { display_name } => ServerCommand::PlayVsAi {
            connection_id,
            display_name,
        },
        ClientMessage::MakeMoveVsAi {
            room_code,
            cell_index,
        } => ServerCommand::MakeMoveVsAi {
            connection_id,
            room_code,
            cell_index,
        },
        ClientMessage::ResetGame { room_code } => ServerCommand::ResetGame {
            connection_id,
            room_code,
        },
        ClientMessage::LeaveRoom { room_code } => ServerCommand::LeaveRoom {
            connection_id,
            room_code,
        },
        ClientMessage::LeaveAiGame { room_code } => ServerCommand::LeaveAiGame {
            connection_id,
            room_code,
        },
    }
}
