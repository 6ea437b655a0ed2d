//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};
use crate::game::Outcome;
use crate::room::GameState;
use crate::types::{RoomCode, Symbol};

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
/// Unknown fields are ignored; in particular a client-supplied symbol on a
/// move is never read, the acting symbol always comes from the session.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create an account and log in
    Register { username: String, password: String },
    /// Log in to an existing account
    Login { username: String, password: String },
    /// Drop the account identity
    Logout,
    /// Create a two-player room and take the X slot
    CreateRoom {
        #[serde(default)]
        display_name: Option<String>,
    },
    /// Join (or rejoin) a room by code
    JoinRoom {
        room_code: String,
        #[serde(default)]
        display_name: Option<String>,
    },
    /// Place a mark in a two-player room
    MakeMove { room_code: String, cell_index: i64 },
    /// Start a game against the AI
    PlayVsAi {
        #[serde(default)]
        display_name: Option<String>,
    },
    /// Place a mark in an AI room; the AI answers
    MakeMoveVsAi { room_code: String, cell_index: i64 },
    /// Start over with an empty board
    ResetGame { room_code: String },
    /// Leave a room while staying connected
    LeaveRoom { room_code: String },
    /// Abandon an AI game
    LeaveAiGame { room_code: String },
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
/// Every room event carries the full `game_state`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection successful, connection ID issued
    Connected { connection_id: String },
    Registered { username: String },
    LoggedIn { username: String },
    LoggedOut,
    /// Room created, creator seated
    RoomCreated {
        room_code: RoomCode,
        player_symbol: Symbol,
        game_state: GameState,
    },
    /// Sent to the joiner (also on reconnect)
    RoomJoined {
        room_code: RoomCode,
        player_symbol: Symbol,
        game_state: GameState,
    },
    /// A new player took a slot
    PlayerJoined {
        player_symbol: Symbol,
        display_name: String,
        status_message: String,
        game_state: GameState,
    },
    /// Both slots filled
    GameStarted { game_state: GameState },
    MoveMade {
        cell_index: usize,
        player_symbol: Symbol,
        next_turn: Symbol,
        game_state: GameState,
    },
    AiGameStarted {
        room_code: RoomCode,
        player_symbol: Symbol,
        message: String,
        game_state: GameState,
    },
    AiMoveMade {
        cell_index: usize,
        next_turn: Symbol,
        game_state: GameState,
    },
    GameOver {
        result: Outcome,
        /// Display name of the winner; absent on a tie
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<String>,
        message: String,
        game_state: GameState,
    },
    GameReset { game_state: GameState },
    PlayerLeft {
        player_symbol: Symbol,
        display_name: String,
        message: String,
        game_state: GameState,
    },
    /// The room was removed by the server
    RoomClosed { room_code: RoomCode, reason: String },
    /// Error occurred
    Error {
        kind: ErrorKind,
        code: ErrorCode,
        message: String,
    },
}

/// Error codes for ServerMessage::Error
///
/// Represents different error scenarios that can be communicated to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Non-existent room code
    RoomNotFound,
    /// Room already has 2 players
    RoomFull,
    NotPlaying,
    GameNotStarted,
    WrongTurn,
    CellTaken,
    OutOfRange,
    NotAiGame,
    AiGame,
    /// Acting on a room without being bound to it
    NotInRoom,
    /// Already in a room
    AlreadyInRoom,
    UsernameTaken,
    InvalidCredentials,
    /// Invalid message format or missing fields
    InvalidMessage,
    InternalError,
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let kind = err.kind();
        let (code, message) = match &err {
            AppError::RoomNotFound(room_code) => {
                (ErrorCode::RoomNotFound, format!("Room '{}' not found", room_code))
            }
            AppError::RoomFull => (ErrorCode::RoomFull, "Room is full".to_string()),
            AppError::NotPlaying => (
                ErrorCode::NotPlaying,
                "Game not started or already ended".to_string(),
            ),
            AppError::GameNotStarted => (
                ErrorCode::GameNotStarted,
                "Game has not started yet".to_string(),
            ),
            AppError::WrongTurn => (ErrorCode::WrongTurn, "Not your turn".to_string()),
            AppError::CellTaken(index) => {
                (ErrorCode::CellTaken, format!("Cell {} is already taken", index))
            }
            AppError::OutOfRange(index) => (
                ErrorCode::OutOfRange,
                format!("Cell index {} is outside 0..=8", index),
            ),
            AppError::NotAiGame => (ErrorCode::NotAiGame, "Not an AI game".to_string()),
            AppError::AiGame => (
                ErrorCode::AiGame,
                "This is an AI game, use make_move_vs_ai".to_string(),
            ),
            AppError::NotInRoom => (ErrorCode::NotInRoom, "You are not in this room".to_string()),
            AppError::AlreadyInRoom => (
                ErrorCode::AlreadyInRoom,
                "You are already in another room".to_string(),
            ),
            AppError::UsernameTaken => {
                (ErrorCode::UsernameTaken, "Username already exists".to_string())
            }
            AppError::InvalidCredentials => (
                ErrorCode::InvalidCredentials,
                "Invalid username or password".to_string(),
            ),
            AppError::MissingCredentials => (
                ErrorCode::InvalidMessage,
                "Missing username or password".to_string(),
            ),
            AppError::Json(e) => {
                (ErrorCode::InvalidMessage, format!("Invalid message format: {}", e))
            }
            // Internal details stay in the server log
            _ => (ErrorCode::InternalError, "Internal error".to_string()),
        };
        ServerMessage::Error {
            kind,
            code,
            message,
        }
    }
}
