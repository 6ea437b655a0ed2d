//! AI opponent
//!
//! Move selection, in priority order:
//! 1. with probability `random_move_probability`, a uniformly random free cell
//!    (difficulty throttling; this branch can miss a forced win or block)
//! 2. an immediate win for O
//! 3. a block of an immediate win for X
//! 4. with more than 7 free cells, the center, then the corners
//! 5. alpha-beta minimax, depth 2 while more than 5 cells are free, else to the end

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::cache::{CacheKey, ScoreCache};
use crate::game::{available_moves, detect_outcome, Board, Outcome};
use crate::types::Symbol;

/// The AI always plays O
pub const AI_SYMBOL: Symbol = Symbol::O;

/// Display name of the AI player
pub const AI_DISPLAY_NAME: &str = "Merciless AI";

pub const DEFAULT_RANDOM_MOVE_PROBABILITY: f64 = 0.5;

/// Center first, then corners
const OPENING_PREFERENCE: [usize; 5] = [4, 0, 2, 6, 8];

const WIN_SCORE: i32 = 10;

/// The AI opponent
///
/// Cheap to clone; every clone shares the same score cache.
#[derive(Debug, Clone)]
pub struct AiEngine {
    cache: Arc<ScoreCache>,
    random_move_probability: f64,
}

impl AiEngine {
    pub fn new(cache: Arc<ScoreCache>, random_move_probability: f64) -> Self {
        let random_move_probability = if random_move_probability.is_nan() {
            0.0
        } else {
            random_move_probability.clamp(0.0, 1.0)
        };
        Self {
            cache,
            random_move_probability,
        }
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    /// Pick a cell for O. `None` only when the board is full.
    pub fn choose_move(&self, board: &Board) -> Option<usize> {
        self.choose_move_with(board, &mut rand::thread_rng())
    }

    pub fn choose_move_with<R: Rng + ?Sized>(
        &self,
        board: &Board,
        rng: &mut R,
    ) -> Option<usize> {
        let moves = available_moves(board);
        if moves.is_empty() {
            return None;
        }

        if rng.gen_bool(self.random_move_probability) {
            return moves.choose(rng).copied();
        }

        self.best_move(board)
    }

    /// The deterministic part: heuristics, then search
    pub fn best_move(&self, board: &Board) -> Option<usize> {
        let moves = available_moves(board);
        if moves.is_empty() {
            return None;
        }

        if let Some(index) = winning_move(board, AI_SYMBOL, &moves) {
            return Some(index);
        }

        if let Some(index) = winning_move(board, AI_SYMBOL.opponent(), &moves) {
            return Some(index);
        }

        if moves.len() > 7 {
            if let Some(index) = OPENING_PREFERENCE
                .iter()
                .copied()
                .find(|index| board.is_empty_at(*index))
            {
                return Some(index);
            }
        }

        self.search(board)
    }

    fn search(&self, board: &Board) -> Option<usize> {
        let limit = depth_limit(board.empty_count());

        let mut best_move = None;
        let mut best_score = i32::MIN;

        for index in available_moves(board) {
            let child = board.with_move(index, AI_SYMBOL);
            let score = self.minimax(child, 0, limit, false, best_score, i32::MAX);

            // Strict comparison keeps the lowest index among equal scores.
            if score > best_score {
                best_score = score;
                best_move = Some(index);
            }
        }

        best_move
    }

    fn minimax(
        &self,
        board: Board,
        depth: u8,
        limit: Option<u8>,
        maximizing: bool,
        mut alpha: i32,
        mut beta: i32,
    ) -> i32 {
        if let Some(outcome) = detect_outcome(&board) {
            return terminal_score(outcome, depth);
        }

        if limit.is_some_and(|limit| depth >= limit) {
            return 0;
        }

        let key = CacheKey {
            signature: board.signature(),
            depth,
            depth_limit: limit,
            maximizing,
            alpha,
            beta,
        };
        if let Some(score) = self.cache.get(&key) {
            return score;
        }

        let score = if maximizing {
            let mut best = i32::MIN;
            for index in available_moves(&board) {
                let child = board.with_move(index, AI_SYMBOL);
                best = best.max(self.minimax(child, depth + 1, limit, false, alpha, beta));
                alpha = alpha.max(best);
                if beta <= alpha {
                    break;
                }
            }
            best
        } else {
            let mut best = i32::MAX;
            for index in available_moves(&board) {
                let child = board.with_move(index, AI_SYMBOL.opponent());
                best = best.min(self.minimax(child, depth + 1, limit, true, alpha, beta));
                beta = beta.min(best);
                if beta <= alpha {
                    break;
                }
            }
            best
        };

        self.cache.insert(key, score);
        score
    }
}

impl Default for AiEngine {
    fn default() -> Self {
        Self::new(Arc::new(ScoreCache::default()), DEFAULT_RANDOM_MOVE_PROBABILITY)
    }
}

fn terminal_score(outcome: Outcome, depth: u8) -> i32 {
    let depth = i32::from(depth);
    match outcome {
        Outcome::Win(Symbol::O) => WIN_SCORE - depth,
        Outcome::Win(Symbol::X) => depth - WIN_SCORE,
        Outcome::Tie => 0,
    }
}

fn depth_limit(empty_cells: usize) -> Option<u8> {
    if empty_cells > 5 {
        Some(2)
    } else {
        None
    }
}

/// First cell (ascending) where `symbol` completes a line
fn winning_move(board: &Board, symbol: Symbol, moves: &[usize]) -> Option<usize> {
    moves.iter().copied().find(|index| {
        detect_outcome(&board.with_move(*index, symbol)) == Some(Outcome::Win(symbol))
    })
}
