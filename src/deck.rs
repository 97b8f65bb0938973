//! The draw deck for low tiles and the set of admissible next tiles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Copies of each low rank (1, 2, 3) in a freshly shuffled deck.
pub const LOW_RANK_COPIES: u8 = 4;

/// One draw in `HIGH_CARD_FREQ` is a high tile once high tiles are unlocked.
pub const HIGH_CARD_FREQ: u32 = 21;

/// Highest rank on the board at which high tiles start to appear.
pub const HIGH_TILE_MIN_MAX_RANK: u8 = 7;

/// Remaining low-tile draws plus the highest rank reached so far.
///
/// When the last low tile is drawn the deck refills to its initial
/// composition, keeping the recorded max rank.
///
/// The packed form used by external callers is
/// `ones | twos << 8 | threes << 16 | max_rank << 24`.
///
/// ```
/// use threes_ai::deck::Deck;
/// let d = Deck::INITIAL.draw(1).draw(3);
/// assert_eq!((d.count(1), d.count(2), d.count(3)), (3, 4, 3));
/// assert_eq!(Deck::from_packed(d.to_packed()), d);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Deck {
    counts: [u8; 3],
    max_rank: u8,
}

impl Deck {
    pub const INITIAL: Deck = Deck { counts: [LOW_RANK_COPIES; 3], max_rank: 0 };

    pub fn new(ones: u8, twos: u8, threes: u8) -> Self {
        Deck { counts: [ones, twos, threes], max_rank: 0 }
    }

    pub fn from_packed(packed: u32) -> Self {
        Deck {
            counts: [packed as u8, (packed >> 8) as u8, (packed >> 16) as u8],
            max_rank: (packed >> 24) as u8,
        }
    }

    pub fn to_packed(self) -> u32 {
        self.counts[0] as u32
            | (self.counts[1] as u32) << 8
            | (self.counts[2] as u32) << 16
            | (self.max_rank as u32) << 24
    }

    /// Remaining copies of low rank `rank` (1..=3); 0 for any other rank.
    #[inline]
    pub fn count(self, rank: u8) -> u8 {
        match rank {
            1..=3 => self.counts[rank as usize - 1],
            _ => 0,
        }
    }

    /// Remaining low tiles of all ranks.
    #[inline]
    pub fn total(self) -> u32 {
        self.counts.iter().map(|&c| c as u32).sum()
    }

    #[inline]
    pub fn is_exhausted(self) -> bool {
        self.counts == [0; 3]
    }

    #[inline]
    pub fn max_rank(self) -> u8 {
        self.max_rank
    }

    #[inline]
    pub fn with_max_rank(self, max_rank: u8) -> Self {
        Deck { max_rank, ..self }
    }

    /// The deck itself, or a fresh one (same max rank) if it is exhausted.
    #[inline]
    pub fn refilled(self) -> Self {
        if self.is_exhausted() {
            Deck::INITIAL.with_max_rank(self.max_rank)
        } else {
            self
        }
    }

    /// Remove one tile of `rank` from the deck.
    ///
    /// Ranks above 3 are high tiles and leave the deck untouched. A count
    /// never goes below zero, and drawing the last low tile refills the deck.
    #[inline]
    pub fn draw(self, rank: u8) -> Self {
        if !(1..=3).contains(&rank) {
            return self;
        }
        let mut counts = self.counts;
        let slot = &mut counts[rank as usize - 1];
        *slot = slot.saturating_sub(1);
        Deck { counts, ..self }.refilled()
    }

    /// Number of distinct high ranks that can currently be drawn (0 if locked).
    ///
    /// High tiles are ranks 4 and up, bounded by `max_rank - 3`.
    #[inline]
    pub fn high_tile_choices(self) -> u8 {
        if self.max_rank >= HIGH_TILE_MIN_MAX_RANK {
            self.max_rank - (HIGH_TILE_MIN_MAX_RANK - 1)
        } else {
            0
        }
    }
}

impl Default for Deck {
    fn default() -> Self {
        Deck::INITIAL
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deck({:#010x})", self.to_packed())
    }
}

/// Bitmask of tile ranks that may be the next tile; bit `i` set means rank `i`.
///
/// Bit 0 (the empty rank) is never set.
///
/// ```
/// use threes_ai::deck::Tileset;
/// let t = Tileset::from_ranks([6, 4, 5]);
/// assert_eq!(t.iter().collect::<Vec<_>>(), vec![4, 5, 6]);
/// assert_eq!(t.raw(), 0b111_0000);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tileset(u16);

impl Tileset {
    pub const EMPTY: Tileset = Tileset(0);

    #[inline]
    pub fn from_raw(raw: u16) -> Self {
        Tileset(raw & !1)
    }

    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn single(rank: u8) -> Self {
        Tileset::EMPTY.with(rank)
    }

    pub fn from_ranks<I: IntoIterator<Item = u8>>(ranks: I) -> Self {
        ranks.into_iter().fold(Tileset::EMPTY, Tileset::with)
    }

    /// Add `rank` (1..=15); other values are ignored.
    #[inline]
    pub fn with(self, rank: u8) -> Self {
        if (1..16).contains(&rank) {
            Tileset(self.0 | 1 << rank)
        } else {
            self
        }
    }

    #[inline]
    pub fn contains(self, rank: u8) -> bool {
        rank < 16 && self.0 & (1 << rank) != 0
    }

    #[inline]
    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Ranks in ascending order.
    #[inline]
    pub fn iter(self) -> TilesetIter {
        TilesetIter(self.0)
    }
}

impl fmt::Debug for Tileset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl IntoIterator for Tileset {
    type Item = u8;
    type IntoIter = TilesetIter;

    fn into_iter(self) -> TilesetIter {
        self.iter()
    }
}

pub struct TilesetIter(u16);

impl Iterator for TilesetIter {
    type Item = u8;

    #[inline]
    fn next(&mut self) -> Option<u8> {
        if self.0 == 0 {
            return None;
        }
        let rank = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Some(rank)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for TilesetIter {}
