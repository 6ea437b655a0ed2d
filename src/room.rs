//! Room struct definition
//!
//! A room is one game between two symbols, or one human and the AI.
//! All transitions of the game state machine live here as plain methods;
//! callers serialize access through the room's lock.
//!
//! ```text
//! Waiting --(second slot filled)--> Playing --(win/tie)--> Finished
//!    ^                                 |  ^                    |
//!    +------(player vacates)-----------+  +------(reset)-------+
//! ```

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ai::{AI_DISPLAY_NAME, AI_SYMBOL};
use crate::error::AppError;
use crate::game::{detect_outcome, Board, Outcome, CELL_COUNT};
use crate::types::{Identity, RoomCode, Symbol};

/// A seated player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub identity: Identity,
    pub display_name: String,
}

impl Player {
    pub fn new(identity: Identity, display_name: impl Into<String>) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
        }
    }

    pub fn ai() -> Self {
        Self::new(Identity::ai(), AI_DISPLAY_NAME)
    }
}

/// The two player slots
#[derive(Debug, Clone, Default)]
pub struct Players {
    x: Option<Player>,
    o: Option<Player>,
}

impl Players {
    pub fn get(&self, symbol: Symbol) -> Option<&Player> {
        match symbol {
            Symbol::X => self.x.as_ref(),
            Symbol::O => self.o.as_ref(),
        }
    }

    fn slot_mut(&mut self, symbol: Symbol) -> &mut Option<Player> {
        match symbol {
            Symbol::X => &mut self.x,
            Symbol::O => &mut self.o,
        }
    }

    /// Slot held by this identity, if any
    pub fn symbol_of(&self, identity: &Identity) -> Option<Symbol> {
        [Symbol::X, Symbol::O]
            .into_iter()
            .find(|symbol| self.get(*symbol).is_some_and(|p| &p.identity == identity))
    }

    /// First open slot, X before O
    pub fn first_open(&self) -> Option<Symbol> {
        [Symbol::X, Symbol::O]
            .into_iter()
            .find(|symbol| self.get(*symbol).is_none())
    }

    pub fn is_full(&self) -> bool {
        self.x.is_some() && self.o.is_some()
    }
}

/// Lifecycle status of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished(Outcome),
}

impl RoomStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Playing => "playing",
            RoomStatus::Finished(_) => "finished",
        }
    }
}

/// Result of seating a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub symbol: Symbol,
    /// The identity already held this slot
    pub reconnected: bool,
    /// This seat moved the room from Waiting to Playing
    pub started: bool,
}

/// Result of an accepted move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Continue { next_turn: Symbol },
    Finished(Outcome),
}

/// One game room
#[derive(Debug)]
pub struct Room {
    /// Room code for identification
    pub code: RoomCode,
    pub board: Board,
    pub players: Players,
    pub current_turn: Symbol,
    pub status: RoomStatus,
    pub is_ai_game: bool,
    /// Room creation time
    pub created_at: Instant,
    /// Updated on every mutating event
    pub last_activity_at: Instant,
    closed: bool,
}

impl Room {
    /// Create a two-player room with the creator seated as X
    pub fn new(code: RoomCode, creator: Player) -> Self {
        let now = Instant::now();
        Self {
            code,
            board: Board::new(),
            players: Players {
                x: Some(creator),
                o: None,
            },
            current_turn: Symbol::X,
            status: RoomStatus::Waiting,
            is_ai_game: false,
            created_at: now,
            last_activity_at: now,
            closed: false,
        }
    }

    /// Create an AI room, already playing, with the AI seated as O
    pub fn new_ai(code: RoomCode, human: Player) -> Self {
        let mut room = Self::new(code, human);
        *room.players.slot_mut(AI_SYMBOL) = Some(Player::ai());
        room.status = RoomStatus::Playing;
        room.is_ai_game = true;
        room
    }

    fn touch(&mut self) {
        self.last_activity_at = Instant::now();
    }

    /// Time since the last mutating event, measured at `now`
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at)
    }

    /// Mark the room as removed from the store
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Seat `identity`, or recognise it as reconnecting to its old slot
    pub fn seat(&mut self, identity: Identity, display_name: String) -> Result<Seat, AppError> {
        if let Some(symbol) = self.players.symbol_of(&identity) {
            return Ok(Seat {
                symbol,
                reconnected: true,
                started: false,
            });
        }

        let Some(symbol) = self.players.first_open() else {
            return Err(AppError::RoomFull);
        };

        *self.players.slot_mut(symbol) = Some(Player::new(identity, display_name));

        let started = self.status == RoomStatus::Waiting && self.players.is_full();
        if started {
            self.status = RoomStatus::Playing;
        }
        self.touch();

        Ok(Seat {
            symbol,
            reconnected: false,
            started,
        })
    }

    /// Place `symbol` at `index`, then evaluate the board
    ///
    /// Rejected moves leave the room untouched.
    pub fn apply_move(&mut self, symbol: Symbol, index: usize) -> Result<MoveResult, AppError> {
        if self.status != RoomStatus::Playing {
            return Err(AppError::NotPlaying);
        }
        if self.current_turn != symbol {
            return Err(AppError::WrongTurn);
        }
        if index >= CELL_COUNT {
            return Err(AppError::OutOfRange(i64::try_from(index).unwrap_or(i64::MAX)));
        }
        if !self.board.is_empty_at(index) {
            return Err(AppError::CellTaken(index));
        }

        self.board.place(index, symbol);
        self.touch();

        match detect_outcome(&self.board) {
            Some(outcome) => {
                self.status = RoomStatus::Finished(outcome);
                Ok(MoveResult::Finished(outcome))
            }
            None => {
                self.current_turn = symbol.opponent();
                Ok(MoveResult::Continue {
                    next_turn: self.current_turn,
                })
            }
        }
    }

    /// Fresh board, X to move, Playing. Player bindings are untouched.
    pub fn reset(&mut self) -> Result<(), AppError> {
        if self.status == RoomStatus::Waiting {
            return Err(AppError::GameNotStarted);
        }
        self.clear_board();
        self.status = RoomStatus::Playing;
        self.touch();
        Ok(())
    }

    fn clear_board(&mut self) {
        self.board = Board::new();
        self.current_turn = Symbol::X;
    }

    /// Free a slot and fall back to Waiting
    ///
    /// A game in progress keeps its board for whoever fills the slot;
    /// a finished game is cleared.
    pub fn vacate(&mut self, symbol: Symbol) -> Option<Player> {
        let player = self.players.slot_mut(symbol).take();
        if matches!(self.status, RoomStatus::Finished(_)) {
            self.clear_board();
        }
        self.status = RoomStatus::Waiting;
        self.touch();
        player
    }

    pub fn display_name(&self, symbol: Symbol) -> Option<&str> {
        self.players.get(symbol).map(|p| p.display_name.as_str())
    }

    /// Full snapshot for clients
    pub fn state(&self) -> GameState {
        let view = |symbol| {
            self.players.get(symbol).map(|p| PlayerView {
                display_name: p.display_name.clone(),
            })
        };
        GameState {
            room_code: self.code.clone(),
            board: self.board,
            players: PlayersView {
                x: view(Symbol::X),
                o: view(Symbol::O),
            },
            current_turn: self.current_turn,
            status: self.status.as_str(),
            result: match self.status {
                RoomStatus::Finished(outcome) => Some(outcome),
                _ => None,
            },
            is_ai_game: self.is_ai_game,
        }
    }
}

/// Serializable room snapshot sent with every room event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameState {
    pub room_code: RoomCode,
    pub board: Board,
    pub players: PlayersView,
    pub current_turn: Symbol,
    pub status: &'static str,
    pub result: Option<Outcome>,
    pub is_ai_game: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayersView {
    #[serde(rename = "X")]
    pub x: Option<PlayerView>,
    #[serde(rename = "O")]
    pub o: Option<PlayerView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Player {
        Player::new(Identity::user(1), "Alice")
    }

    fn playing_room() -> Room {
        let mut room = Room::new(RoomCode::generate(), alice());
        room.seat(Identity::user(2), "Bob".to_string()).unwrap();
        room
    }

    #[test]
    fn test_room_creation() {
        let code = RoomCode::generate();
        let room = Room::new(code.clone(), alice());

        assert_eq!(room.code, code);
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.current_turn, Symbol::X);
        assert_eq!(room.display_name(Symbol::X), Some("Alice"));
        assert!(room.players.get(Symbol::O).is_none());
        assert!(!room.is_ai_game);
        assert_eq!(room.board, Board::new());
    }

    #[test]
    fn test_ai_room_creation() {
        let room = Room::new_ai(RoomCode::generate_ai(), alice());

        assert_eq!(room.status, RoomStatus::Playing);
        assert!(room.is_ai_game);
        assert_eq!(room.display_name(Symbol::O), Some(AI_DISPLAY_NAME));
        assert_eq!(room.players.symbol_of(&Identity::ai()), Some(Symbol::O));
    }

    #[test]
    fn test_second_player_starts_game() {
        let mut room = Room::new(RoomCode::generate(), alice());
        let seat = room.seat(Identity::user(2), "Bob".to_string()).unwrap();

        assert_eq!(seat.symbol, Symbol::O);
        assert!(seat.started);
        assert!(!seat.reconnected);
        assert_eq!(room.status, RoomStatus::Playing);
    }

    #[test]
    fn test_reconnect_keeps_slot() {
        let mut room = Room::new(RoomCode::generate(), alice());
        let seat = room.seat(Identity::user(1), "Alice".to_string()).unwrap();

        assert_eq!(seat.symbol, Symbol::X);
        assert!(seat.reconnected);
        assert_eq!(room.status, RoomStatus::Waiting);
        assert!(room.players.get(Symbol::O).is_none());
    }

    #[test]
    fn test_third_player_rejected() {
        let mut room = playing_room();
        let result = room.seat(Identity::user(3), "Carol".to_string());
        assert!(matches!(result, Err(AppError::RoomFull)));

        // Existing players may still reconnect
        let seat = room.seat(Identity::user(2), "Bob".to_string()).unwrap();
        assert_eq!(seat.symbol, Symbol::O);
    }

    #[test]
    fn test_turn_alternates() {
        let mut room = playing_room();

        let result = room.apply_move(Symbol::X, 4).unwrap();
        assert_eq!(result, MoveResult::Continue { next_turn: Symbol::O });
        assert_eq!(room.current_turn, Symbol::O);

        assert!(matches!(room.apply_move(Symbol::X, 0), Err(AppError::WrongTurn)));

        room.apply_move(Symbol::O, 0).unwrap();
        assert_eq!(room.current_turn, Symbol::X);
    }

    #[test]
    fn test_move_before_start_rejected() {
        let mut room = Room::new(RoomCode::generate(), alice());
        assert!(matches!(room.apply_move(Symbol::X, 0), Err(AppError::NotPlaying)));
    }

    #[test]
    fn test_cell_taken_leaves_board_unchanged() {
        let mut room = playing_room();
        room.apply_move(Symbol::X, 4).unwrap();
        let before = room.board;

        assert!(matches!(room.apply_move(Symbol::O, 4), Err(AppError::CellTaken(4))));
        assert_eq!(room.board, before);
        assert_eq!(room.current_turn, Symbol::O);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut room = playing_room();
        assert!(matches!(room.apply_move(Symbol::X, 9), Err(AppError::OutOfRange(9))));
        assert_eq!(room.board, Board::new());
    }

    #[test]
    fn test_top_row_win() {
        let mut room = playing_room();
        room.apply_move(Symbol::X, 0).unwrap();
        room.apply_move(Symbol::O, 3).unwrap();
        room.apply_move(Symbol::X, 1).unwrap();
        room.apply_move(Symbol::O, 4).unwrap();
        let result = room.apply_move(Symbol::X, 2).unwrap();

        assert_eq!(result, MoveResult::Finished(Outcome::Win(Symbol::X)));
        assert_eq!(room.status, RoomStatus::Finished(Outcome::Win(Symbol::X)));
        assert!(matches!(room.apply_move(Symbol::O, 5), Err(AppError::NotPlaying)));
    }

    #[test]
    fn test_full_board_tie() {
        let mut room = playing_room();
        // X O X / X O O / O X X
        for (symbol, cell) in [
            (Symbol::X, 0),
            (Symbol::O, 1),
            (Symbol::X, 2),
            (Symbol::O, 4),
            (Symbol::X, 3),
            (Symbol::O, 5),
            (Symbol::X, 7),
            (Symbol::O, 6),
        ] {
            assert!(matches!(
                room.apply_move(symbol, cell).unwrap(),
                MoveResult::Continue { .. }
            ));
        }
        let result = room.apply_move(Symbol::X, 8).unwrap();
        assert_eq!(result, MoveResult::Finished(Outcome::Tie));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut room = playing_room();
        room.apply_move(Symbol::X, 0).unwrap();

        room.reset().unwrap();
        room.reset().unwrap();

        assert_eq!(room.board, Board::new());
        assert_eq!(room.current_turn, Symbol::X);
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.display_name(Symbol::O), Some("Bob"));
    }

    #[test]
    fn test_reset_waiting_room_rejected() {
        let mut room = Room::new(RoomCode::generate(), alice());
        assert!(matches!(room.reset(), Err(AppError::GameNotStarted)));
    }

    #[test]
    fn test_vacate_mid_game_keeps_board() {
        let mut room = playing_room();
        room.apply_move(Symbol::X, 4).unwrap();
        let before = room.board;

        let left = room.vacate(Symbol::X).unwrap();

        assert_eq!(left.display_name, "Alice");
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.board, before);
        assert_eq!(room.display_name(Symbol::O), Some("Bob"));
        assert!(room.players.get(Symbol::X).is_none());
    }

    #[test]
    fn test_vacate_finished_game_clears_board() {
        let mut room = playing_room();
        for (symbol, cell) in [
            (Symbol::X, 0),
            (Symbol::O, 3),
            (Symbol::X, 1),
            (Symbol::O, 4),
            (Symbol::X, 2),
        ] {
            room.apply_move(symbol, cell).unwrap();
        }

        room.vacate(Symbol::O);

        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.board, Board::new());
        assert_eq!(room.current_turn, Symbol::X);
    }

    #[test]
    fn test_refill_after_vacate() {
        let mut room = playing_room();
        room.vacate(Symbol::X);

        let seat = room.seat(Identity::user(3), "Carol".to_string()).unwrap();
        assert_eq!(seat.symbol, Symbol::X);
        assert!(seat.started);
        assert_eq!(room.status, RoomStatus::Playing);
    }

    #[test]
    fn test_idle_for() {
        let room = Room::new(RoomCode::generate(), alice());
        let later = room.last_activity_at + Duration::from_secs(60);
        assert_eq!(room.idle_for(later), Duration::from_secs(60));
        assert_eq!(room.idle_for(room.created_at), Duration::ZERO);
    }

    #[test]
    fn test_state_snapshot() {
        let mut room = playing_room();
        room.apply_move(Symbol::X, 0).unwrap();
        let json = serde_json::to_value(room.state()).unwrap();

        assert_eq!(json["board"][0], "X");
        assert_eq!(json["players"]["X"]["display_name"], "Alice");
        assert_eq!(json["players"]["O"]["display_name"], "Bob");
        assert_eq!(json["current_turn"], "O");
        assert_eq!(json["status"], "playing");
        assert!(json["result"].is_null());
        assert_eq!(json["is_ai_game"], false);
    }
}
