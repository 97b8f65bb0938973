//! threes-ai: a Threes! engine + expectimax policy
//!
//! This crate provides:
//! - A packed `Board` (sixteen 4-bit ranks in a `u64`) and precomputed row
//!   tables for sliding and scoring (`engine` module)
//! - The low-tile `Deck` and next-tile `Tileset` model (`deck` module)
//! - An expectimax move selector (`expectimax` module)
//! - A seeded self-play driver (`game` module) and JSON game records (`trace` module)
//!
//! Quick start:
//! ```
//! use threes_ai::deck::{Deck, Tileset};
//! use threes_ai::engine::{self, Board, Move};
//! use threes_ai::expectimax;
//!
//! // Tables for the default heuristic weights, built once
//! let tables = engine::init();
//!
//! let board = Board::from_rows([[1, 2, 0, 0], [0, 3, 0, 0], [0; 4], [0; 4]]);
//! let (after, changed) = tables.execute_move(Move::Left, board);
//! assert_eq!(after.cell(0, 0), 3);
//! assert!(!changed.is_empty());
//!
//! let best = expectimax::find_best_move(tables, board, Deck::INITIAL, Tileset::single(1));
//! assert!(best.is_some());
//! ```
//!
//! Custom heuristic weights need their own tables: `Tables::new(&weights)`.
pub mod config;
pub mod deck;
pub mod engine;
pub mod expectimax;
pub mod game;
pub mod trace;
