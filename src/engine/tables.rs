use log::trace;

use super::state::{
    cells_to_row, reverse_row, row_to_cells, unpack_col, BoardRaw, Rank, Row, MAX_RANK,
};
use crate::config::{HeuristicWeights, LOST_PENALTY};

/// Precomputed lookup tables for all possible 4-cell rows (16-bit packed).
///
/// Sliding a row or column depends only on its four ranks, so every move
/// and every additive score is a table lookup per line:
/// - `row_left/row_right[row]`: `old_row ^ new_row` for a horizontal slide
///   (zero when the row cannot move).
/// - `col_up/col_down[packed_col]`: the same delta, spread back into
///   column 0 of a board so it can be xor'ed in after a shift.
/// - `score[row]`: actual game score of the row.
/// - `heur_score[row]`: heuristic value of the row under the weights the
///   bundle was built with.
/// - `row_max[row]`: highest rank in the row.
///
/// A bundle is immutable once built. Changing the heuristic weights means
/// building a new bundle.
pub struct Tables {
    pub(crate) row_left: Box<[Row]>,
    pub(crate) row_right: Box<[Row]>,
    pub(crate) col_up: Box<[BoardRaw]>,
    pub(crate) col_down: Box<[BoardRaw]>,
    pub(crate) row_max: Box<[Rank]>,
    pub(crate) heur_score: Box<[f32]>,
    pub(crate) score: Box<[f32]>,
    weights: HeuristicWeights,
}

pub(crate) const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

impl Tables {
    /// Build every table for the given heuristic weights.
    ///
    /// ```
    /// use threes_ai::config::HeuristicWeights;
    /// use threes_ai::engine::Tables;
    /// let tables = Tables::new(&HeuristicWeights::default());
    /// assert_eq!(tables.weights(), &HeuristicWeights::default());
    /// ```
    pub fn new(weights: &HeuristicWeights) -> Self {
        // Allocate on the heap to avoid large stack frames
        let mut row_left = vec![0 as Row; LINE_TABLE_SIZE];
        let mut row_right = vec![0 as Row; LINE_TABLE_SIZE];
        let mut col_up = vec![0 as BoardRaw; LINE_TABLE_SIZE];
        let mut col_down = vec![0 as BoardRaw; LINE_TABLE_SIZE];
        let mut row_max = vec![0 as Rank; LINE_TABLE_SIZE];
        let mut heur_score = vec![0f32; LINE_TABLE_SIZE];
        let mut score = vec![0f32; LINE_TABLE_SIZE];

        for val in 0..LINE_TABLE_SIZE {
            let row = val as Row;
            let line = row_to_cells(row);

            score[val] = calc_score(&line);
            row_max[val] = line.iter().copied().max().unwrap_or(0);
            heur_score[val] = calc_heuristic_score(&line, weights);

            let Some(result) = slide_left(line) else { continue };
            let result = cells_to_row(result);
            let rev_result = reverse_row(result);
            let rev_row = reverse_row(row);

            row_left[row as usize] = row ^ result;
            row_right[rev_row as usize] = rev_row ^ rev_result;
            col_up[row as usize] = unpack_col(row) ^ unpack_col(result);
            col_down[rev_row as usize] = unpack_col(rev_row) ^ unpack_col(rev_result);
        }
        trace!("built lookup tables ({} entries each)", LINE_TABLE_SIZE);

        Tables {
            row_left: row_left.into_boxed_slice(),
            row_right: row_right.into_boxed_slice(),
            col_up: col_up.into_boxed_slice(),
            col_down: col_down.into_boxed_slice(),
            row_max: row_max.into_boxed_slice(),
            heur_score: heur_score.into_boxed_slice(),
            score: score.into_boxed_slice(),
            weights: weights.clone(),
        }
    }

    /// The weights baked into `heur_score`.
    pub fn weights(&self) -> &HeuristicWeights {
        &self.weights
    }

    /// Left-slide delta for a packed row (`row ^ slid_row`, 0 if it cannot move).
    #[inline]
    pub fn row_left_delta(&self, row: u16) -> u16 {
        get_entry(&self.row_left, row)
    }

    /// Heuristic value of a single packed row.
    #[inline]
    pub fn row_heuristic(&self, row: u16) -> f32 {
        get_entry(&self.heur_score, row)
    }

    /// Actual score of a single packed row.
    #[inline]
    pub fn row_score(&self, row: u16) -> f32 {
        get_entry(&self.score, row)
    }

    #[inline]
    pub fn row_max_rank(&self, row: u16) -> u8 {
        get_entry(&self.row_max, row)
    }
}

impl Default for Tables {
    fn default() -> Self {
        Tables::new(&HeuristicWeights::default())
    }
}

#[inline(always)]
pub(crate) fn get_entry<T: Copy>(table: &[T], idx: Row) -> T {
    debug_assert_eq!(table.len(), LINE_TABLE_SIZE);
    // Every table has exactly 65,536 entries, so any u16 index is in bounds.
    unsafe { *table.get_unchecked(idx as usize) }
}

/// Slide a row towards index 0, applying at most one interaction.
///
/// Scans for the first position where a tile can move into the empty cell
/// before it, a 1 and a 2 combine into a 3, or two equal ranks of 3 or more
/// merge.
/// That single interaction is applied and everything after it shifts one
/// step left. Returns `None` when nothing can move.
pub(crate) fn slide_left(mut line: [Rank; 4]) -> Option<[Rank; 4]> {
    let i = (0..3).find(|&i| {
        let (a, b) = (line[i], line[i + 1]);
        (a == 0 && b != 0) || (a == 1 && b == 2) || (a == 2 && b == 1) || (a == b && a >= 3)
    })?;

    let (a, b) = (line[i], line[i + 1]);
    line[i] = match a {
        0 => b,
        1 | 2 => 3,
        // 12288 + 12288 = 12288
        r if r == MAX_RANK => MAX_RANK,
        r => r + 1,
    };
    for j in i + 1..3 {
        line[j] = line[j + 1];
    }
    line[3] = 0;
    Some(line)
}

fn calc_score(line: &[Rank; 4]) -> f32 {
    line.iter()
        .filter(|&&rank| rank >= 3)
        .map(|&rank| 3f32.powi(rank as i32 - 2))
        .sum()
}

fn calc_heuristic_score(line: &[Rank; 4], w: &HeuristicWeights) -> f32 {
    let (mono_left, mono_right) = calc_monotonicity(line, w.monotonicity_power);
    LOST_PENALTY
        + w.empty_weight * calc_empty(line)
        + w.merges_weight * calc_merges(line)
        + w.twelve_merges_weight * calc_twelve_merges(line)
        - w.monotonicity_weight * mono_left.min(mono_right)
        - w.monotonicity_weight * (mono_left + mono_right)
        - w.sum_weight * calc_sum(line, w.sum_power)
}

fn calc_sum(line: &[Rank; 4], power: f32) -> f32 {
    line.iter().map(|&rank| (rank as f32).powf(power)).sum()
}

fn calc_empty(line: &[Rank; 4]) -> f32 {
    line.iter().filter(|&&rank| rank == 0).count() as f32
}

// Each run of equal adjacent tiles counts run_length + 1 once. Empty cells
// are skipped, so tiles separated only by gaps still form a run.
fn calc_merges(line: &[Rank; 4]) -> f32 {
    let mut prev = 0;
    let mut counter = 0;
    let mut merges = 0;
    for &rank in line.iter().filter(|&&rank| rank != 0) {
        if prev == rank {
            counter += 1;
        } else if counter > 0 {
            merges += 1 + counter;
            counter = 0;
        }
        prev = rank;
    }
    if counter > 0 {
        merges += 1 + counter;
    }
    merges as f32
}

fn calc_twelve_merges(line: &[Rank; 4]) -> f32 {
    line.windows(2)
        .filter(|pair| matches!((pair[0], pair[1]), (1, 2) | (2, 1)))
        .count() as f32
}

fn calc_monotonicity(line: &[Rank; 4], power: f32) -> (f32, f32) {
    let mut monotonicity_left = 0f32;
    let mut monotonicity_right = 0f32;
    for pair in line.windows(2) {
        let tile1 = (pair[0] as f32).powf(power);
        let tile2 = (pair[1] as f32).powf(power);
        if pair[0] > pair[1] {
            monotonicity_left += tile1 - tile2;
        } else {
            monotonicity_right += tile2 - tile1;
        }
    }
    (monotonicity_left, monotonicity_right)
}
