use super::state::{
    extract_row, pack_col, transpose, Board, BoardRaw, Changed, Move, COL_MASK, ROW_MASK,
};
use super::tables::{get_entry, Tables};

impl Tables {
    /// Slide `board` in `dir`, reporting which rows/columns moved.
    ///
    /// A move whose [`Changed`] is empty is illegal from this board and
    /// leaves it bit-identical.
    ///
    /// ```
    /// use threes_ai::engine::{self, Board, Move};
    /// let tables = engine::init();
    /// let b = Board::from_rows([[1, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
    /// let (moved, changed) = tables.execute_move(Move::Right, b);
    /// assert_eq!(moved.cell(0, 1), 1);
    /// assert_eq!(changed.count(), 1);
    /// ```
    #[inline]
    pub fn execute_move(&self, dir: Move, board: Board) -> (Board, Changed) {
        match dir {
            Move::Up => self.shift_cols(&self.col_up, board),
            Move::Down => self.shift_cols(&self.col_down, board),
            Move::Left => self.shift_rows(&self.row_left, board),
            Move::Right => self.shift_rows(&self.row_right, board),
        }
    }

    #[inline(always)]
    fn shift_rows(&self, table: &[u16], board: Board) -> (Board, Changed) {
        let mut changed = Changed::NONE;
        let mut ret = board.0;
        for i in 0..4 {
            let delta = get_entry(table, extract_row(board.0, i));
            if delta != 0 {
                changed.mark(i);
                ret ^= (delta as BoardRaw) << (16 * i);
            }
        }
        (Board(ret), changed)
    }

    #[inline(always)]
    fn shift_cols(&self, table: &[BoardRaw], board: Board) -> (Board, Changed) {
        let mut changed = Changed::NONE;
        let mut ret = board.0;
        for i in 0..4 {
            let delta = get_entry(table, pack_col((board.0 >> (4 * i)) & COL_MASK));
            if delta != 0 {
                changed.mark(i);
                ret ^= delta << (4 * i);
            }
        }
        (Board(ret), changed)
    }

    /// Literal game score: the sum over rows of 3^(rank-2) for ranks 3 and above.
    ///
    /// ```
    /// use threes_ai::engine::{self, Board};
    /// let tables = engine::init();
    /// let b = Board::from_rows([[3, 4, 0, 0], [0; 4], [1, 2, 0, 0], [0; 4]]);
    /// assert_eq!(tables.score_actual(b), 12.0);
    /// ```
    #[inline]
    pub fn score_actual(&self, board: Board) -> f32 {
        score_helper(board.0, &self.score)
    }

    /// Heuristic evaluation: the row heuristic summed over all rows of the
    /// board and all rows of its transpose.
    #[inline]
    pub fn score_heuristic(&self, board: Board) -> f32 {
        score_helper(board.0, &self.heur_score) + score_helper(transpose(board.0), &self.heur_score)
    }

    /// Highest rank present on the board.
    #[inline]
    pub fn max_rank(&self, board: Board) -> u8 {
        let mut raw = board.0;
        let mut max_rank = 0;
        while raw != 0 {
            max_rank = max_rank.max(get_entry(&self.row_max, (raw & ROW_MASK) as u16));
            raw >>= 16;
        }
        max_rank
    }

    /// True if no move in any direction changes the board.
    pub fn is_game_over(&self, board: Board) -> bool {
        Move::ALL.iter().all(|&dir| self.execute_move(dir, board).1.is_empty())
    }
}

#[inline(always)]
fn score_helper(board: BoardRaw, table: &[f32]) -> f32 {
    (0..4).fold(0., |acc, idx| acc + get_entry(table, extract_row(board, idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LOST_PENALTY;
    use crate::engine;

    #[test]
    fn single_tile_slides_right_one_step() {
        let t = engine::init();
        let b = Board::from_rows([[1, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let (moved, changed) = t.execute_move(Move::Right, b);
        assert_eq!(moved, Board::from_rows([[0, 1, 0, 0], [0; 4], [0; 4], [0; 4]]));
        assert_eq!(changed.count(), 1);
        assert_eq!(changed.mask(), 0b0001);

        // Two more slides carry it into the far corner.
        let (b, _) = t.execute_move(Move::Right, moved);
        let (b, changed) = t.execute_move(Move::Right, b);
        assert_eq!(b.cell(0, 3), 1);
        assert_eq!(changed.count(), 1);
        let (same, changed) = t.execute_move(Move::Right, b);
        assert!(changed.is_empty());
        assert_eq!(same, b);
    }

    #[test]
    fn locked_rows_do_not_move_horizontally() {
        let t = engine::init();
        let b = Board::from_rows([[1, 1, 3, 4], [2, 2, 5, 6], [3, 4, 3, 4], [7, 8, 9, 10]]);
        for dir in [Move::Left, Move::Right] {
            let (moved, changed) = t.execute_move(dir, b);
            assert_eq!(changed.count(), 0);
            assert_eq!(moved.raw(), b.raw());
        }
    }

    #[test]
    fn moves_by_direction() {
        let t = engine::init();
        let b = Board::from_rows([[0, 1, 2, 0], [3, 3, 0, 0], [0; 4], [0, 0, 0, 6]]);

        let (l, ch) = t.execute_move(Move::Left, b);
        assert_eq!(l, Board::from_rows([[1, 2, 0, 0], [4, 0, 0, 0], [0; 4], [0, 0, 6, 0]]));
        assert_eq!(ch.mask(), 0b1011);
        assert_eq!(ch.count(), 3);

        let (r, ch) = t.execute_move(Move::Right, b);
        assert_eq!(r, Board::from_rows([[0, 0, 1, 2], [0, 3, 3, 0], [0; 4], [0, 0, 0, 6]]));
        assert_eq!(ch.mask(), 0b0011);

        let (u, ch) = t.execute_move(Move::Up, b);
        assert_eq!(u, Board::from_rows([[3, 1, 2, 0], [0, 3, 0, 0], [0, 0, 0, 6], [0; 4]]));
        assert_eq!(ch.mask(), 0b1001);
        assert_eq!(ch.count(), 2);

        let (d, ch) = t.execute_move(Move::Down, b);
        assert_eq!(d, Board::from_rows([[0; 4], [0, 1, 2, 0], [3, 3, 0, 0], [0, 0, 0, 6]]));
        assert_eq!(ch.mask(), 0b0111);
    }

    #[test]
    fn vacated_cells_accept_inserted_tiles() {
        let t = engine::init();
        let b = Board::from_rows([[1, 2, 3, 3], [0, 0, 0, 5], [4, 4, 4, 4], [0; 4]]);
        for dir in Move::ALL {
            let (moved, changed) = t.execute_move(dir, b);
            for pos in changed.units() {
                let inserted = moved.insert_tile(dir, pos, 2);
                assert_eq!(inserted.count_empty() + 1, moved.count_empty());
            }
        }
    }

    #[test]
    fn actual_score_ignores_empty_cell_layout() {
        let t = engine::init();
        let a = Board::from_rows([[3, 0, 0, 0], [0, 5, 0, 0], [0, 0, 1, 0], [0, 0, 0, 0]]);
        let b = Board::from_rows([[0, 0, 0, 3], [5, 0, 0, 0], [1, 0, 0, 0], [0, 0, 0, 0]]);
        let c = Board::from_rows([[0, 0, 0, 0], [0, 0, 3, 5], [0, 0, 0, 0], [0, 1, 0, 0]]);
        assert_eq!(t.score_actual(a), 3.0 + 27.0);
        assert_eq!(t.score_actual(a), t.score_actual(b));
        assert_eq!(t.score_actual(a), t.score_actual(c));
    }

    #[test]
    fn heuristic_includes_baseline_on_empty_board() {
        let t = engine::init();
        assert_eq!(t.score_heuristic(Board::EMPTY), 8.0 * LOST_PENALTY);
    }

    #[test]
    fn max_rank_and_game_over() {
        let t = engine::init();
        assert_eq!(t.max_rank(Board::EMPTY), 0);
        let b = Board::from_rows([[1, 0, 0, 0], [0; 4], [0, 0, 12, 0], [0; 4]]);
        assert_eq!(t.max_rank(b), 12);
        assert!(!t.is_game_over(b));
        let stuck = Board::from_rows([[1, 3, 1, 3], [3, 1, 3, 1], [1, 3, 1, 3], [3, 1, 3, 1]]);
        assert!(t.is_game_over(stuck));
        assert!(t.is_game_over(Board::EMPTY));
    }
}
