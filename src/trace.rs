//! JSON game records written by the self-play driver.
//!
//! A record holds every board the game passed through and, for each turn,
//! the deck the player saw, the announced tileset and the move played.

use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::HeuristicWeights;
use crate::deck::{Deck, Tileset};
use crate::engine::{Board, Move};

/// Bumped whenever the record layout changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub version: u32,
    pub seed: u64,
    pub steps: u32,
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub score: f32,
    pub max_rank: u8,
    pub depth_limit: u32,
    pub weights: HeuristicWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub meta: Meta,
    /// length = steps + 1
    pub states: Vec<Board>,
    /// length = steps
    pub decks: Vec<Deck>,
    /// length = steps
    pub moves: Vec<Move>,
    /// length = steps
    pub tilesets: Vec<Tileset>,
}

impl GameRecord {
    /// Start a record at the opening board.
    pub fn new(meta: Meta, initial: Board) -> Self {
        GameRecord {
            meta,
            states: vec![initial],
            decks: Vec::new(),
            moves: Vec::new(),
            tilesets: Vec::new(),
        }
    }

    /// Append one turn and the board it produced.
    pub fn push(&mut self, deck: Deck, tileset: Tileset, dir: Move, next: Board) {
        self.decks.push(deck);
        self.tilesets.push(tileset);
        self.moves.push(dir);
        self.states.push(next);
        self.meta.steps = self.moves.len() as u32;
    }

    pub fn final_board(&self) -> Option<Board> {
        self.states.last().copied()
    }

    fn validate(&self) -> Result<(), TraceError> {
        let steps = self.meta.steps as usize;
        if self.meta.version != FORMAT_VERSION {
            return Err(TraceError::Version(self.meta.version));
        }
        if self.states.len() != steps + 1
            || self.decks.len() != steps
            || self.moves.len() != steps
            || self.tilesets.len() != steps
        {
            return Err(TraceError::Malformed);
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported record version {0}")]
    Version(u32),
    #[error("step counts do not match the recorded states")]
    Malformed,
}

pub fn write_record_to_path<P: AsRef<Path>>(
    path: P,
    record: &GameRecord,
) -> Result<(), TraceError> {
    record.validate()?;
    let mut w = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut w, record)?;
    w.flush()?;
    Ok(())
}

pub fn parse_record_str(s: &str) -> Result<GameRecord, TraceError> {
    let record: GameRecord = serde_json::from_str(s)?;
    record.validate()?;
    Ok(record)
}

pub fn parse_record_file<P: AsRef<Path>>(path: P) -> Result<GameRecord, TraceError> {
    let record: GameRecord = serde_json::from_reader(BufReader::new(fs::File::open(path)?))?;
    record.validate()?;
    Ok(record)
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
