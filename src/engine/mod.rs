//! Packed Threes board, lookup tables, move execution and scoring.
//!
//! All per-line work is precomputed into a [`Tables`] bundle. Build one with
//! [`Tables::new`] for custom heuristic weights, or use [`init`] for the
//! shared default bundle.
//!
//! ```
//! use threes_ai::engine::{self, Board, Move};
//!
//! let tables = engine::init();
//! let b = Board::from_rows([[3, 3, 0, 0], [0; 4], [0; 4], [0; 4]]);
//! let (moved, changed) = tables.execute_move(Move::Left, b);
//! assert_eq!(moved.cell(0, 0), 4);
//! assert_eq!(changed.count(), 1);
//! ```

use std::sync::OnceLock;

mod ops;
mod state;
mod tables;

pub use state::{rank_to_value, value_to_rank, Board, Changed, Move, MAX_RANK};
pub use tables::Tables;

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Build the default table bundle on first use. Safe to call multiple times.
pub fn init() -> &'static Tables {
    TABLES.get_or_init(Tables::default)
}
