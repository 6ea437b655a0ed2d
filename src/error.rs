//! Error types for the game server
//!
//! Defines application-level errors, their client-facing category,
//! and message send errors. Uses thiserror for ergonomic error definitions.

use serde::Serialize;
use thiserror::Error;

/// Client-facing error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Room or resource absent
    NotFound,
    /// Wrong turn, acting outside membership, bad credentials
    Forbidden,
    /// Cell taken, room full, game already finished
    Conflict,
    /// Out-of-range index, malformed payload
    InvalidInput,
    /// Unexpected failure
    Internal,
}

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Room not found with the given code
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Both slots are held by other players
    #[error("Room is full")]
    RoomFull,

    /// Game is waiting for players or already finished
    #[error("Game is not in progress")]
    NotPlaying,

    /// Reset requested before the game has started
    #[error("Game has not started")]
    GameNotStarted,

    #[error("Not your turn")]
    WrongTurn,

    #[error("Cell {0} is already taken")]
    CellTaken(usize),

    #[error("Cell index {0} is out of range")]
    OutOfRange(i64),

    /// AI move requested on a two-player room
    #[error("Room is not an AI game")]
    NotAiGame,

    /// Two-player move requested on an AI room
    #[error("Room is an AI game")]
    AiGame,

    /// Connection is not bound to the addressed room
    #[error("Not in room")]
    NotInRoom,

    /// Connection is already bound to another room
    #[error("Already in room")]
    AlreadyInRoom,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Missing username or password")]
    MissingCredentials,

    /// Could not find a free room code
    #[error("Room code space exhausted")]
    CodeSpaceExhausted,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Unexpected failure (e.g. a background task panicked)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::RoomNotFound(_) => ErrorKind::NotFound,
            AppError::WrongTurn | AppError::NotInRoom | AppError::InvalidCredentials => {
                ErrorKind::Forbidden
            }
            AppError::RoomFull
            | AppError::NotPlaying
            | AppError::GameNotStarted
            | AppError::CellTaken(_)
            | AppError::AlreadyInRoom
            | AppError::UsernameTaken => ErrorKind::Conflict,
            AppError::OutOfRange(_)
            | AppError::NotAiGame
            | AppError::AiGame
            | AppError::MissingCredentials
            | AppError::Json(_) => ErrorKind::InvalidInput,
            AppError::WebSocket(_)
            | AppError::CodeSpaceExhausted
            | AppError::PasswordHash(_)
            | AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound buffer is full (slow client)
    #[error("Channel full")]
    ChannelFull,
}
