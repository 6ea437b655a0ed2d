//! Client struct definition
//!
//! Represents a connected client with its identity and outbound channel.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ConnectionId, Identity};

/// Name used when neither a login nor a requested display name is available
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

/// Connected client information
///
/// Holds the connection ID, the identity used for seating (anonymous until
/// login), and the Server → Client message channel. Cloning is cheap; clones
/// share the same channel.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Identity used to recognise reconnects
    pub identity: Identity,
    /// Account name (None until login)
    pub username: Option<String>,
    /// Server → Client message channel
    pub sender: mpsc::Sender<ServerMessage>,
}

impl Client {
    /// Create a new anonymous client with the given ID and sender channel
    pub fn new(id: ConnectionId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            identity: Identity::anonymous(),
            username: None,
            sender,
        }
    }

    /// Send a message to this client
    ///
    /// Returns an error if the channel is closed (client disconnected).
    pub async fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Send without waiting for buffer space
    ///
    /// Used for room broadcasts, where one slow client must not hold up the room.
    pub fn try_send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::ChannelFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Resolve the name shown to other players
    ///
    /// The account name wins; otherwise the requested name, otherwise "Guest".
    pub fn display_name(&self, requested: Option<&str>) -> String {
        if let Some(username) = &self.username {
            return username.clone();
        }
        requested
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
            .to_string()
    }

    pub fn is_logged_in(&self) -> bool {
        self.username.is_some()
    }

    /// Adopt an account identity
    pub fn log_in(&mut self, identity: Identity, username: String) {
        self.identity = identity;
        self.username = Some(username);
    }

    /// Back to a fresh anonymous identity
    pub fn log_out(&mut self) {
        self.identity = Identity::anonymous();
        self.username = None;
    }
}
