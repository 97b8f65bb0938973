//! Expectimax move selection for Threes.
//!
//! The search alternates three node types:
//! - move nodes take the best of the four slides,
//! - tile-choice nodes weight each possible next rank by its draw
//!   probability under the current [`Deck`],
//! - tile-insert nodes average over the rows/columns the slide vacated.
//!
//! Branches whose cumulative probability drops below
//! [`ExpectimaxConfig::prob_cutoff`] and nodes at the depth limit are scored
//! with the table heuristic instead of being expanded.
//!
//! Each top-level move is evaluated with its own transposition table, which
//! is dropped when that evaluation returns.
//!
//! ```
//! use threes_ai::deck::{Deck, Tileset};
//! use threes_ai::engine::{self, Board};
//! use threes_ai::expectimax::Expectimax;
//!
//! let tables = engine::init();
//! let board = Board::from_rows([[1, 0, 0, 0], [0, 2, 0, 0], [0, 0, 3, 0], [0; 4]]);
//! let mut ex = Expectimax::new(tables);
//! let m = ex.best_move(board, Deck::INITIAL, Tileset::single(2));
//! assert!(m.is_some());
//! ```

use crate::deck::{Deck, Tileset};
use crate::engine::{Board, Move, Tables};

mod search;

pub use search::Expectimax;

/// Added to the score of every legal top-level move so that a legal move
/// always beats "no move".
pub const TOPLEVEL_EPSILON: f32 = 1e-6;

/// Search knobs. Defaults are the baseline configuration.
///
/// - `prob_cutoff`: stop expanding once cumulative probability falls below this value.
/// - `depth_limit`: number of move plies searched below the top-level move.
/// - `cache_depth_limit`: move nodes shallower than this use the transposition table.
/// - `cache_enabled`: enable/disable the transposition table.
#[derive(Debug, Clone)]
pub struct ExpectimaxConfig {
    pub prob_cutoff: f32,
    pub depth_limit: u32,
    pub cache_depth_limit: u32,
    pub cache_enabled: bool,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self { prob_cutoff: 1e-4, depth_limit: 4, cache_depth_limit: 6, cache_enabled: true }
    }
}

/// Expected score of one top-level direction.
///
/// `legal` is false when the move is a no-op for the current board, in which
/// case `ev` is 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f32,
    pub legal: bool,
}

/// Counters collected while searching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Move applications tried at move nodes.
    pub moves_evaled: u64,
    pub cache_hits: u64,
    /// Transposition table entries at the end of the evaluation(s).
    pub cache_size: u64,
    /// Deepest move ply that reached a leaf.
    pub max_depth: u32,
}

impl SearchStats {
    pub(crate) fn merge(&mut self, other: SearchStats) {
        self.moves_evaled += other.moves_evaled;
        self.cache_hits += other.cache_hits;
        self.cache_size += other.cache_size;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// Choose the best direction with the default search configuration.
///
/// `deck` is the deck before the upcoming tile was drawn, `tileset` the
/// faces the upcoming tile may show. Returns `None` when no move changes
/// the board.
pub fn find_best_move(tables: &Tables, board: Board, deck: Deck, tileset: Tileset) -> Option<Move> {
    Expectimax::new(tables).best_move(board, deck, tileset)
}
