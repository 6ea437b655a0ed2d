//! Tic-tac-toe rules
//!
//! Pure functions over a 9-cell board: outcome detection, available moves,
//! and the canonical board signature used as a cache key.

use serde::{Serialize, Serializer};

use crate::error::AppError;
use crate::types::Symbol;

/// Number of cells on the board
pub const CELL_COUNT: usize = 9;

/// Rows, columns, then diagonals
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Result of a finished game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win(Symbol),
    Tie,
}

impl Outcome {
    /// Wire form: `"X"`, `"O"` or `"tie"`
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win(symbol) => symbol.as_str(),
            Outcome::Tie => "tie",
        }
    }

    pub fn winner(self) -> Option<Symbol> {
        match self {
            Outcome::Win(symbol) => Some(symbol),
            Outcome::Tie => None,
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A 3x3 board, row-major. Serializes as `[null | "X" | "O"; 9]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Board([Option<Symbol>; CELL_COUNT]);

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from a 9-character pattern of `X`, `O` and any other char for empty
    pub fn from_pattern(pattern: &str) -> Self {
        let mut cells = [None; CELL_COUNT];
        for (cell, ch) in cells.iter_mut().zip(pattern.chars()) {
            *cell = match ch {
                'X' => Some(Symbol::X),
                'O' => Some(Symbol::O),
                _ => None,
            };
        }
        Self(cells)
    }

    pub fn cells(&self) -> &[Option<Symbol>; CELL_COUNT] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<Symbol> {
        self.0.get(index).copied().flatten()
    }

    pub fn is_empty_at(&self, index: usize) -> bool {
        index < CELL_COUNT && self.0[index].is_none()
    }

    /// Place a mark. Callers validate the index and emptiness first.
    pub fn place(&mut self, index: usize, symbol: Symbol) {
        self.0[index] = Some(symbol);
    }

    /// Copy of this board with `symbol` placed at `index`
    pub fn with_move(mut self, index: usize, symbol: Symbol) -> Self {
        self.place(index, symbol);
        self
    }

    pub fn empty_count(&self) -> usize {
        self.0.iter().filter(|cell| cell.is_none()).count()
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.0.iter().filter(|cell| **cell == Some(symbol)).count()
    }

    /// Base-3 encoding of the cells: Empty=0, X=1, O=2, cell 0 least significant
    pub fn signature(&self) -> u16 {
        self.0.iter().rev().fold(0u16, |acc, cell| {
            let digit = match cell {
                None => 0,
                Some(Symbol::X) => 1,
                Some(Symbol::O) => 2,
            };
            acc * 3 + digit
        })
    }
}

/// Check the 8 lines, then fullness.
///
/// Returns the symbol of the first matching line; `Tie` only when no line
/// matches and no cell is empty; `None` while the game is still open.
pub fn detect_outcome(board: &Board) -> Option<Outcome> {
    for [a, b, c] in LINES {
        if let Some(symbol) = board.get(a) {
            if board.get(b) == Some(symbol) && board.get(c) == Some(symbol) {
                return Some(Outcome::Win(symbol));
            }
        }
    }

    if board.is_full() {
        Some(Outcome::Tie)
    } else {
        None
    }
}

/// Validate a client-supplied cell index
pub fn parse_cell_index(raw: i64) -> Result<usize, AppError> {
    usize::try_from(raw)
        .ok()
        .filter(|index| *index < CELL_COUNT)
        .ok_or(AppError::OutOfRange(raw))
}

/// Empty cell indices in ascending order
pub fn available_moves(board: &Board) -> Vec<usize> {
    board
        .cells()
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.is_none())
        .map(|(index, _)| index)
        .collect()
}
