//! Basic type definitions for the game server
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based unique connection identifier
//! - `RoomCode`: 6-digit numeric code, or `ai-` prefixed code for AI rooms
//! - `Identity`: stable player identity (anonymous, registered user, or the AI)
//! - `Symbol`: a player's mark

use std::fmt;

use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

/// Prefix reserved for AI room codes.
///
/// Human room codes are purely numeric, so the two namespaces never collide.
pub const AI_ROOM_PREFIX: &str = "ai-";

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe connection identification.
/// Implements Hash and Eq for use as map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room code
///
/// Human rooms get a 6-digit numeric code that is easy to share;
/// AI rooms get `ai-` followed by 6 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Generate a new random 6-digit room code
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..6)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self(code)
    }

    /// Generate a new random AI room code
    pub fn generate_ai() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", AI_ROOM_PREFIX, &hex[..6]))
    }

    /// Create a RoomCode from user input (surrounding whitespace is dropped)
    pub fn from_string(code: String) -> Self {
        Self(code.trim().to_string())
    }

    /// Whether this code belongs to the AI room namespace
    pub fn is_ai(&self) -> bool {
        self.0.starts_with(AI_ROOM_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of a player across connections
///
/// Reconnect detection compares identities, never connection IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(pub String);

impl Identity {
    /// Fresh identity for a connection that has not logged in
    pub fn anonymous() -> Self {
        Self(format!("anonymous-{}", Uuid::new_v4()))
    }

    /// Identity of a registered account
    pub fn user(user_id: u64) -> Self {
        Self(format!("user-{}", user_id))
    }

    /// The synthetic AI opponent
    pub fn ai() -> Self {
        Self("ai".to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with("anonymous-")
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player's mark. X always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::X => "X",
            Symbol::O => "O",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
