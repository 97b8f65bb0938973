//! Self-play driver: deals tiles, applies moves and inserts the drawn tile.
//!
//! All randomness comes from a caller-supplied RNG, so a seeded RNG replays
//! the same game.
//!
//! ```
//! use rand::{rngs::StdRng, SeedableRng};
//! use threes_ai::engine::{self, Move};
//! use threes_ai::game;
//!
//! let tables = engine::init();
//! let mut rng = StdRng::seed_from_u64(7);
//! // Always play the first legal direction.
//! let summary = game::play(tables, &mut rng, |g, _turn| {
//!     Move::ALL.into_iter().find(|&m| !tables.execute_move(m, g.board()).1.is_empty())
//! });
//! assert!(summary.moves > 0);
//! assert!(tables.is_game_over(summary.board));
//! ```

use log::{info, warn};
use rand::Rng;

use crate::deck::{Deck, Tileset, HIGH_CARD_FREQ, HIGH_TILE_MIN_MAX_RANK};
use crate::engine::{Board, Move, Tables};

/// Tiles dealt onto the starting board.
pub const INITIAL_TILES: usize = 9;

/// Draw one low tile from the deck, refilling it first if it is empty.
pub fn draw_deck<R: Rng + ?Sized>(deck: &mut Deck, rng: &mut R) -> u8 {
    *deck = deck.refilled();
    let (a, b) = (deck.count(1) as u32, deck.count(2) as u32);
    let r = rng.gen_range(0..deck.total());
    let rank = if r < a {
        1
    } else if r - a < b {
        2
    } else {
        3
    };
    *deck = deck.draw(rank);
    rank
}

/// Deal nine tiles from `deck` and scatter them with a Fisher-Yates shuffle.
pub fn initial_board<R: Rng + ?Sized>(deck: &mut Deck, rng: &mut R) -> Board {
    let mut cells = [0u8; 16];
    for cell in cells.iter_mut().take(INITIAL_TILES) {
        *cell = draw_deck(deck, rng);
    }
    for i in (1..16).rev() {
        let j = rng.gen_range(0..=i);
        cells.swap(i, j);
    }
    let mut board = Board::EMPTY;
    for (idx, &rank) in cells.iter().enumerate() {
        board = board.with_cell(idx / 4, idx % 4, rank);
    }
    board
}

/// The faces the next tile may show.
///
/// Once the board holds rank 7, one draw in [`HIGH_CARD_FREQ`] is a high
/// tile: `{4}` at max rank 7, `{4, 5}` at 8, and otherwise three consecutive
/// ranks starting anywhere in `4..=max_rank - 5`. High draws leave the deck
/// untouched; every other draw takes a low tile from it.
pub fn next_tileset<R: Rng + ?Sized>(max_rank: u8, deck: &mut Deck, rng: &mut R) -> Tileset {
    if max_rank >= HIGH_TILE_MIN_MAX_RANK && rng.gen_range(0..HIGH_CARD_FREQ) == 0 {
        match max_rank {
            7 => Tileset::single(4),
            8 => Tileset::from_ranks([4, 5]),
            _ => {
                let start = rng.gen_range(0..max_rank - 8) + 4;
                Tileset::from_ranks([start, start + 1, start + 2])
            }
        }
    } else {
        Tileset::single(draw_deck(deck, rng))
    }
}

/// Pick one face of `tileset` uniformly; 0 for an empty set.
pub fn random_tile<R: Rng + ?Sized>(tileset: Tileset, rng: &mut R) -> u8 {
    if tileset.is_empty() {
        return 0;
    }
    let idx = rng.gen_range(0..tileset.len()) as usize;
    tileset.iter().nth(idx).unwrap_or(0)
}

/// What the player knows before choosing a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    /// The deck before the upcoming tile was drawn.
    pub deck: Deck,
    /// Faces the upcoming tile may show.
    pub tileset: Tileset,
    /// The face that will actually be inserted.
    pub tile: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameSummary {
    pub moves: u32,
    pub board: Board,
    pub score: f32,
    pub max_rank: u8,
}

/// A game in progress.
#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    deck: Deck,
    moves: u32,
}

impl Game {
    /// Start a game with a freshly dealt board.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Deck::INITIAL;
        let board = initial_board(&mut deck, rng);
        Game { board, deck, moves: 0 }
    }

    /// Resume from a known board and deck.
    pub fn from_parts(board: Board, deck: Deck) -> Self {
        Game { board, deck, moves: 0 }
    }

    #[inline]
    pub fn board(&self) -> Board {
        self.board
    }

    #[inline]
    pub fn deck(&self) -> Deck {
        self.deck
    }

    #[inline]
    pub fn moves(&self) -> u32 {
        self.moves
    }

    /// Draw the next tile.
    pub fn deal<R: Rng + ?Sized>(&mut self, tables: &Tables, rng: &mut R) -> Turn {
        self.deck = self.deck.refilled();
        let deck = self.deck;
        let tileset = next_tileset(tables.max_rank(self.board), &mut self.deck, rng);
        let tile = random_tile(tileset, rng);
        Turn { deck, tileset, tile }
    }

    /// Slide in `dir` and insert the dealt tile into one of the vacated cells.
    ///
    /// Returns false, leaving the board untouched, if the move is illegal.
    pub fn play_turn<R: Rng + ?Sized>(
        &mut self,
        tables: &Tables,
        turn: &Turn,
        dir: Move,
        rng: &mut R,
    ) -> bool {
        let (board, changed) = tables.execute_move(dir, self.board);
        if changed.is_empty() {
            return false;
        }
        let choice = rng.gen_range(0..changed.count()) as usize;
        let Some(pos) = changed.units().nth(choice) else { return false };
        self.board = board.insert_tile(dir, pos, turn.tile);
        self.moves += 1;
        true
    }

    pub fn summary(&self, tables: &Tables) -> GameSummary {
        GameSummary {
            moves: self.moves,
            board: self.board,
            score: tables.score_actual(self.board),
            max_rank: tables.max_rank(self.board),
        }
    }
}

/// Play a full game from a fresh deal, asking `policy` for a move every turn.
///
/// The game ends when the policy returns `None` or picks an illegal move.
pub fn play<R, F>(tables: &Tables, rng: &mut R, policy: F) -> GameSummary
where
    R: Rng + ?Sized,
    F: FnMut(&Game, &Turn) -> Option<Move>,
{
    let game = Game::new(rng);
    play_from(tables, rng, game, policy, |_, _, _| {})
}

/// Continue `game` until the policy stops, calling `on_turn` with the turn,
/// the move played and the resulting board after every completed turn.
pub fn play_from<R, F, O>(
    tables: &Tables,
    rng: &mut R,
    mut game: Game,
    mut policy: F,
    mut on_turn: O,
) -> GameSummary
where
    R: Rng + ?Sized,
    F: FnMut(&Game, &Turn) -> Option<Move>,
    O: FnMut(&Turn, Move, Board),
{
    loop {
        let turn = game.deal(tables, rng);
        let Some(dir) = policy(&game, &turn) else { break };
        if !game.play_turn(tables, &turn, dir, rng) {
            warn!("policy chose illegal move {:?} on {:?}", dir, game.board());
            break;
        }
        on_turn(&turn, dir, game.board());
    }
    let summary = game.summary(tables);
    info!(
        "game over after {} moves: score {:.0}, max rank {}",
        summary.moves, summary.score, summary.max_rank
    );
    summary
}
