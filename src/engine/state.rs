use std::fmt;

use serde::{Deserialize, Serialize};

// Internal type aliases for packed representation
pub(crate) type BoardRaw = u64;
pub(crate) type Row = u16;
pub(crate) type Rank = u8;

pub(crate) const ROW_MASK: BoardRaw = 0xFFFF;
pub(crate) const COL_MASK: BoardRaw = 0x000F_000F_000F_000F;

/// Highest representable rank (the 12288 tile). Merging two of these is a no-op.
pub const MAX_RANK: u8 = 15;

/// A direction to slide tiles.
///
/// The discriminants are the move indices used throughout the engine
/// (`0 = Up, 1 = Down, 2 = Left, 3 = Right`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Move {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Move {
    /// All moves in index order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Move::Up),
            1 => Some(Move::Down),
            2 => Some(Move::Left),
            3 => Some(Move::Right),
            _ => None,
        }
    }

    /// Parse a `U`/`D`/`L`/`R` key (case-insensitive).
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'U' => Some(Move::Up),
            'D' => Some(Move::Down),
            'L' => Some(Move::Left),
            'R' => Some(Move::Right),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        b"UDLR"[self.index()] as char
    }
}

/// Which rows (for Left/Right) or columns (for Up/Down) moved during one move.
///
/// Packed as `(num_changed << 8) | changed_bits`, where bit `i` of
/// `changed_bits` is set iff row/column `i` moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Changed(u32);

impl Changed {
    pub const NONE: Changed = Changed(0);

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Changed(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn mark(&mut self, unit: usize) {
        self.0 += 0x100 + (1 << unit);
    }

    /// Number of rows/columns that moved.
    #[inline]
    pub fn count(self) -> u32 {
        self.0 >> 8
    }

    /// Four-bit mask of the rows/columns that moved.
    #[inline]
    pub fn mask(self) -> u8 {
        (self.0 & 0xf) as u8
    }

    /// True when the move did nothing (it is illegal from this board).
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn contains(self, unit: usize) -> bool {
        unit < 4 && self.0 & (1 << unit) != 0
    }

    /// Indices of the moved rows/columns, ascending.
    pub fn units(self) -> impl Iterator<Item = usize> {
        (0..4).filter(move |&unit| self.contains(unit))
    }
}

/// Packed 4x4 Threes board as 16 4-bit ranks in a `u64`.
///
/// Cell `(row, col)` lives at bit offset `16 * row + 4 * col`. Rank 0 is an
/// empty cell, ranks 1 and 2 are the special low tiles, and ranks 3..=15
/// form the merge chain 3, 6, 12, ..., 12288.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board(pub(crate) BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self {
        Board(raw)
    }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw {
        self.0
    }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw {
        self.0
    }

    /// Build a board from ranks laid out as `rows[row][col]`.
    ///
    /// ```
    /// use threes_ai::engine::Board;
    /// let b = Board::from_rows([[1, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 3]]);
    /// assert_eq!(b.cell(0, 0), 1);
    /// assert_eq!(b.cell(3, 3), 3);
    /// ```
    pub fn from_rows(rows: [[u8; 4]; 4]) -> Self {
        let mut board = Board::EMPTY;
        for (r, row) in rows.iter().enumerate() {
            for (c, &rank) in row.iter().enumerate() {
                board = board.with_cell(r, c, rank);
            }
        }
        board
    }

    pub fn to_rows(self) -> [[u8; 4]; 4] {
        let mut rows = [[0u8; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = self.cell(r, c);
            }
        }
        rows
    }

    /// Rank stored at `(row, col)`.
    #[inline]
    pub fn cell(self, row: usize, col: usize) -> u8 {
        debug_assert!(row < 4 && col < 4);
        ((self.0 >> (16 * row + 4 * col)) & 0xf) as u8
    }

    /// Return a copy with `(row, col)` set to `rank` (clamped to [`MAX_RANK`]).
    #[inline]
    pub fn with_cell(self, row: usize, col: usize, rank: u8) -> Self {
        debug_assert!(row < 4 && col < 4);
        let shift = 16 * row + 4 * col;
        let cleared = self.0 & !(0xf << shift);
        Board(cleared | ((rank.min(MAX_RANK) as BoardRaw) << shift))
    }

    /// Iterate over ranks in row-major order.
    #[inline]
    pub fn tiles(self) -> impl Iterator<Item = u8> {
        (0..16).map(move |idx| ((self.0 >> (4 * idx)) & 0xf) as u8)
    }

    /// Swap rows and columns; its own inverse.
    #[inline]
    pub fn transpose(self) -> Self {
        Board(transpose(self.0))
    }

    /// Extract one 2x2 corner block into row form.
    ///
    /// Nibble 0 holds the corner, 1 the neighbour along the top/bottom edge,
    /// 2 the neighbour along the left/right edge and 3 the inner cell. The
    /// quadrants are, in order: top-left, top-right, bottom-left, bottom-right.
    #[inline]
    pub fn quadrant(self, quadrant: usize) -> u16 {
        get_quadrant(self.0, quadrant)
    }

    /// Place `tile` in the cell vacated by a move in `dir` along row/column `pos`.
    ///
    /// Assumes that cell is empty, which holds for every unit a move reports
    /// as changed.
    ///
    /// ```
    /// use threes_ai::engine::{Board, Move};
    /// let b = Board::EMPTY.insert_tile(Move::Left, 2, 1);
    /// assert_eq!(b.cell(2, 3), 1);
    /// ```
    #[inline]
    pub fn insert_tile(self, dir: Move, pos: usize, tile: u8) -> Self {
        debug_assert!(pos < 4);
        let tile = tile.min(MAX_RANK) as BoardRaw;
        let shift = match dir {
            Move::Up => pos * 4 + 48,
            Move::Down => pos * 4,
            Move::Left => 12 + pos * 16,
            Move::Right => pos * 16,
        };
        debug_assert_eq!((self.0 >> shift) & 0xf, 0, "insert_tile target must be empty");
        Board(self.0 | (tile << shift))
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 {
        let mut x = self.0;
        x |= x >> 2;
        x |= x >> 1;
        16 - (x & 0x1111_1111_1111_1111).count_ones()
    }

    /// Count distinct merge-chain ranks (3 and above) on the board.
    pub fn count_distinct_tiles(self) -> u32 {
        let mut bitset: u16 = 0;
        let mut board = self.0;
        while board != 0 {
            bitset |= 1 << (board & 0xf);
            board >>= 4;
        }
        // Don't count empty tiles or the 1/2 tiles.
        (bitset >> 3).count_ones()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.to_rows().iter().enumerate() {
            if r > 0 {
                writeln!(f, "-----------------------------")?;
            }
            let cells: Vec<String> = row.iter().map(|&rank| format_val(rank)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board {
    fn from(v: BoardRaw) -> Self {
        Board::from_raw(v)
    }
}

impl From<Board> for BoardRaw {
    fn from(b: Board) -> Self {
        b.into_raw()
    }
}

/// Face value of a rank: 0, 1, 2, 3, 6, 12, ..., 12288.
pub fn rank_to_value(rank: u8) -> u32 {
    match rank {
        0..=2 => rank as u32,
        r => 3 << (r.min(MAX_RANK) - 3),
    }
}

/// Rank of a face value, or `None` for values that are not Threes faces.
pub fn value_to_rank(value: u32) -> Option<u8> {
    match value {
        0..=2 => Some(value as u8),
        v if v % 3 == 0 && (v / 3).is_power_of_two() => {
            let rank = (v / 3).trailing_zeros() + 3;
            (rank <= MAX_RANK as u32).then_some(rank as u8)
        }
        _ => None,
    }
}

// Transpose rows/columns:
//   0123       0426       048c
//   4567  -->  1537  -->  159d
//   89ab       8cae       26ae
//   cdef       9dbf       37bf
#[inline]
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F0_0F0F_F0F0_0F0F;
    let a2 = x & 0x0000_F0F0_0000_F0F0;
    let a3 = x & 0x0F0F_0000_0F0F_0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00_FF00_00FF_00FF;
    let b2 = a & 0x00FF_00FF_0000_0000;
    let b3 = a & 0x0000_0000_FF00_FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

/// Compress a column (cells 16 bits apart, already shifted to column 0) into row form.
#[inline]
pub(crate) fn pack_col(col: BoardRaw) -> Row {
    ((col | (col >> 12) | (col >> 24) | (col >> 36)) & ROW_MASK) as Row
}

/// Inverse of [`pack_col`]: spread a row-form value back into column 0.
#[inline]
pub(crate) fn unpack_col(row: Row) -> BoardRaw {
    let tmp = row as BoardRaw;
    (tmp | (tmp << 12) | (tmp << 24) | (tmp << 36)) & COL_MASK
}

#[inline]
pub(crate) fn reverse_row(row: Row) -> Row {
    (row >> 12) | ((row >> 4) & 0x00F0) | ((row << 4) & 0x0F00) | (row << 12)
}

#[inline]
pub(crate) fn extract_row(board: BoardRaw, row_idx: usize) -> Row {
    ((board >> (16 * row_idx)) & ROW_MASK) as Row
}

#[inline]
pub(crate) fn row_to_cells(row: Row) -> [Rank; 4] {
    [
        (row & 0xf) as Rank,
        ((row >> 4) & 0xf) as Rank,
        ((row >> 8) & 0xf) as Rank,
        ((row >> 12) & 0xf) as Rank,
    ]
}

#[inline]
pub(crate) fn cells_to_row(cells: [Rank; 4]) -> Row {
    (cells[0] as Row) | (cells[1] as Row) << 4 | (cells[2] as Row) << 8 | (cells[3] as Row) << 12
}

const QUADRANTS: [[usize; 4]; 4] = [[0, 1, 4, 5], [3, 2, 7, 6], [12, 13, 8, 9], [15, 14, 11, 10]];

fn get_quadrant(board: BoardRaw, quadrant: usize) -> Row {
    QUADRANTS[quadrant & 3]
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &cell)| acc | ((((board >> (4 * cell)) & 0xf) as Row) << (i * 4)))
}

fn format_val(rank: u8) -> String {
    match rank {
        0 => format!("{:^6}", ""),
        r => format!("{:^6}", rank_to_value(r)),
    }
}
