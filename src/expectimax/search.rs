use std::collections::HashMap;
use std::time::Instant;

use ahash::RandomState as AHasher;
use log::debug;

use crate::deck::{Deck, Tileset, HIGH_CARD_FREQ};
use crate::engine::{Board, Changed, Move, Tables};

use super::{BranchEval, ExpectimaxConfig, SearchStats, TOPLEVEL_EPSILON};

/// Board -> expectimax value, scoped to one top-level move evaluation.
///
/// Entries ignore the remaining depth budget at insertion time, so a value
/// is only an approximation when the same board is reached again at a
/// different depth. Bounding caching to shallow move nodes and discarding
/// the table after each top-level evaluation keeps that error contained.
type TransTable = HashMap<Board, f32, AHasher>;

struct EvalState {
    trans_table: TransTable,
    cur_depth: u32,
    max_depth: u32,
    cache_hits: u64,
    moves_evaled: u64,
}

impl EvalState {
    fn new() -> Self {
        Self {
            trans_table: HashMap::with_hasher(AHasher::new()),
            cur_depth: 0,
            max_depth: 0,
            cache_hits: 0,
            moves_evaled: 0,
        }
    }

    fn stats(&self) -> SearchStats {
        SearchStats {
            moves_evaled: self.moves_evaled,
            cache_hits: self.cache_hits,
            cache_size: self.trans_table.len() as u64,
            max_depth: self.max_depth,
        }
    }
}

/// Single-threaded expectimax searcher over a shared table bundle.
///
/// The search is deterministic: the same board, deck, tileset, tables and
/// configuration always produce the same evaluations.
pub struct Expectimax<'t> {
    tables: &'t Tables,
    cfg: ExpectimaxConfig,
    stats: SearchStats,
}

impl<'t> Expectimax<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        Self::with_config(tables, ExpectimaxConfig::default())
    }

    pub fn with_config(tables: &'t Tables, cfg: ExpectimaxConfig) -> Self {
        Self { tables, cfg, stats: SearchStats::default() }
    }

    pub fn config(&self) -> &ExpectimaxConfig {
        &self.cfg
    }

    /// Compute the best move, or `None` if no direction changes the board.
    ///
    /// Ties keep the earliest direction in `Up, Down, Left, Right` order.
    pub fn best_move(&mut self, board: Board, deck: Deck, tileset: Tileset) -> Option<Move> {
        let mut best = 0.0;
        let mut best_move = None;
        for branch in self.branch_evals(board, deck, tileset) {
            if branch.ev > best {
                best = branch.ev;
                best_move = Some(branch.dir);
            }
        }
        best_move
    }

    /// Expected score for each direction, in order `[Up, Down, Left, Right]`.
    ///
    /// Every direction is searched with a fresh transposition table.
    pub fn branch_evals(&mut self, board: Board, deck: Deck, tileset: Tileset) -> [BranchEval; 4] {
        let mut stats = SearchStats::default();
        let out = Move::ALL.map(|dir| {
            let (ev, legal, dir_stats) = self.evaluate_toplevel(board, deck, tileset, dir);
            stats.merge(dir_stats);
            BranchEval { dir, ev, legal }
        });
        self.stats = stats;
        out
    }

    /// Expected score of playing `dir` now (0 if the move is illegal).
    pub fn score_toplevel_move(
        &mut self,
        board: Board,
        deck: Deck,
        tileset: Tileset,
        dir: Move,
    ) -> f32 {
        let (ev, _, stats) = self.evaluate_toplevel(board, deck, tileset, dir);
        self.stats = stats;
        ev
    }

    /// Statistics collected from the last call to [`Self::best_move`],
    /// [`Self::branch_evals`] or [`Self::score_toplevel_move`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    fn evaluate_toplevel(
        &self,
        board: Board,
        deck: Deck,
        tileset: Tileset,
        dir: Move,
    ) -> (f32, bool, SearchStats) {
        let start = Instant::now();
        let mut state = EvalState::new();
        let (new_board, changed) = self.tables.execute_move(dir, board);
        if changed.is_empty() {
            return (0.0, false, state.stats());
        }

        let deck = deck.with_max_rank(self.tables.max_rank(board));
        let ev = if tileset.is_empty() {
            // Nothing known about the next tile: fall back to the deck odds.
            self.score_tilechoose_node(&mut state, new_board, deck, 1.0, dir, changed)
        } else {
            let mut result = 0.0;
            for tile in tileset {
                let drawn = deck.draw(tile);
                let ev = self.score_tileinsert_node(
                    &mut state, new_board, drawn, 1.0, dir, changed, tile,
                );
                result += ev;
            }
            result / tileset.len() as f32
        };
        let ev = ev + TOPLEVEL_EPSILON;

        let stats = state.stats();
        debug!(
            "move {:?}: result {:.1}: eval'd {} moves ({} cache hits, {} cache size) \
             in {:.3}s (maxdepth={})",
            dir,
            ev,
            stats.moves_evaled,
            stats.cache_hits,
            stats.cache_size,
            start.elapsed().as_secs_f64(),
            stats.max_depth
        );
        (ev, true, stats)
    }

    fn score_move_node(&self, state: &mut EvalState, board: Board, deck: Deck, cprob: f32) -> f32 {
        if cprob < self.cfg.prob_cutoff || state.cur_depth >= self.cfg.depth_limit {
            state.max_depth = state.max_depth.max(state.cur_depth);
            return self.tables.score_heuristic(board);
        }

        let cacheable = self.cfg.cache_enabled && state.cur_depth < self.cfg.cache_depth_limit;
        if cacheable {
            if let Some(&score) = state.trans_table.get(&board) {
                state.cache_hits += 1;
                return score;
            }
        }

        let mut best = 0.0f32;
        state.cur_depth += 1;
        for dir in Move::ALL {
            let (new_board, changed) = self.tables.execute_move(dir, board);
            state.moves_evaled += 1;
            if !changed.is_empty() {
                let ev = self.score_tilechoose_node(state, new_board, deck, cprob, dir, changed);
                best = best.max(ev);
            }
        }
        state.cur_depth -= 1;

        if cacheable {
            state.trans_table.insert(board, best);
        }
        best
    }

    fn score_tilechoose_node(
        &self,
        state: &mut EvalState,
        board: Board,
        deck: Deck,
        cprob: f32,
        dir: Move,
        changed: Changed,
    ) -> f32 {
        let deck = deck.refilled();
        let mut div = deck.total() as f32;

        let mut high = 0.0;
        let choices = deck.high_tile_choices();
        if choices > 0 {
            let n = choices as f32;
            let freq = HIGH_CARD_FREQ as f32;
            // High ranks 4, 5, ... are equally likely within the 1-in-freq high draw.
            let tile_prob = cprob / n / freq;
            for tile in 4..4 + choices {
                high +=
                    self.score_tileinsert_node(state, board, deck, tile_prob, dir, changed, tile);
            }
            high /= n * freq;
            div *= freq / (freq - 1.0);
        }

        let mut res = 0.0;
        for rank in 1..=3 {
            let count = deck.count(rank);
            if count > 0 {
                let weight = count as f32;
                let tile_prob = cprob / div * weight;
                let drawn = deck.draw(rank);
                let ev =
                    self.score_tileinsert_node(state, board, drawn, tile_prob, dir, changed, rank);
                res += ev * weight;
            }
        }
        res / div + high
    }

    #[allow(clippy::too_many_arguments)]
    fn score_tileinsert_node(
        &self,
        state: &mut EvalState,
        board: Board,
        deck: Deck,
        cprob: f32,
        dir: Move,
        changed: Changed,
        tile: u8,
    ) -> f32 {
        debug_assert!(changed.count() > 0);
        let factor = 1.0 / changed.count() as f32;
        let cprob = cprob * factor;
        let mut res = 0.0;
        for pos in changed.units() {
            res += self.score_move_node(state, board.insert_tile(dir, pos, tile), deck, cprob);
        }
        res * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;

    fn sample_board() -> Board {
        Board::from_rows([[1, 2, 3, 0], [0, 3, 4, 0], [2, 0, 5, 1], [0, 0, 3, 6]])
    }

    fn shallow(depth_limit: u32) -> ExpectimaxConfig {
        ExpectimaxConfig { depth_limit, ..Default::default() }
    }

    #[test]
    fn depth_zero_averages_heuristic_over_insert_positions() {
        let t = engine::init();
        let board = sample_board();
        let mut ex = Expectimax::with_config(t, shallow(0));
        for dir in Move::ALL {
            let (moved, changed) = t.execute_move(dir, board);
            let ev = ex.score_toplevel_move(board, Deck::INITIAL, Tileset::single(3), dir);
            if changed.is_empty() {
                assert_eq!(ev, 0.0);
                continue;
            }
            let factor = 1.0 / changed.count() as f32;
            let sum: f32 =
                changed.units().map(|pos| t.score_heuristic(moved.insert_tile(dir, pos, 3))).sum();
            let expected = sum * factor + TOPLEVEL_EPSILON;
            assert!((ev - expected).abs() <= expected * 1e-6, "{dir:?}: {ev} vs {expected}");
        }
    }

    #[test]
    fn depth_zero_averages_over_tileset_faces() {
        let t = engine::init();
        let board = sample_board();
        let mut ex = Expectimax::with_config(t, shallow(0));
        let one = ex.score_toplevel_move(board, Deck::INITIAL, Tileset::single(1), Move::Left);
        let two = ex.score_toplevel_move(board, Deck::INITIAL, Tileset::single(2), Move::Left);
        let pair = Tileset::from_ranks([1, 2]);
        let both = ex.score_toplevel_move(board, Deck::INITIAL, pair, Move::Left);
        let expected =
            ((one - TOPLEVEL_EPSILON) + (two - TOPLEVEL_EPSILON)) / 2.0 + TOPLEVEL_EPSILON;
        assert!((both - expected).abs() <= expected * 1e-6);
    }

    #[test]
    fn illegal_moves_score_zero() {
        let t = engine::init();
        let locked = Board::from_rows([[1, 1, 3, 4], [2, 2, 4, 3], [3, 4, 3, 4], [4, 3, 4, 3]]);
        let mut ex = Expectimax::with_config(t, shallow(2));
        let branches = ex.branch_evals(locked, Deck::INITIAL, Tileset::single(1));
        for branch in branches {
            match branch.dir {
                Move::Left | Move::Right => {
                    assert!(!branch.legal);
                    assert_eq!(branch.ev, 0.0);
                }
                Move::Up | Move::Down => {
                    assert!(branch.legal);
                    assert!(branch.ev > 0.0);
                }
            }
        }
        let best = ex.best_move(locked, Deck::INITIAL, Tileset::single(1));
        assert!(matches!(best, Some(Move::Up) | Some(Move::Down)));
    }

    #[test]
    fn no_move_available() {
        let t = engine::init();
        let stuck = Board::from_rows([[1, 3, 1, 3], [3, 1, 3, 1], [1, 3, 1, 3], [3, 1, 3, 1]]);
        let mut ex = Expectimax::new(t);
        assert_eq!(ex.best_move(stuck, Deck::INITIAL, Tileset::single(2)), None);
        assert!(ex.branch_evals(stuck, Deck::INITIAL, Tileset::single(2)).iter().all(|b| !b.legal));
    }

    #[test]
    fn search_is_deterministic() {
        let t = engine::init();
        let board = sample_board();
        let deck = Deck::new(2, 3, 1);
        let tileset = Tileset::single(2);
        let first = Expectimax::with_config(t, shallow(3)).branch_evals(board, deck, tileset);
        let second = Expectimax::with_config(t, shallow(3)).branch_evals(board, deck, tileset);
        assert_eq!(first, second);
        let a = Expectimax::with_config(t, shallow(3)).best_move(board, deck, tileset);
        let b = Expectimax::with_config(t, shallow(3)).best_move(board, deck, tileset);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn cache_is_fresh_per_toplevel_call() {
        let t = engine::init();
        let board = sample_board();
        let mut ex = Expectimax::with_config(t, shallow(3));
        let first = ex.score_toplevel_move(board, Deck::INITIAL, Tileset::single(3), Move::Up);
        let stats_first = ex.last_stats();
        let second = ex.score_toplevel_move(board, Deck::INITIAL, Tileset::single(3), Move::Up);
        assert_eq!(first, second);
        assert_eq!(stats_first, ex.last_stats());
        assert!(stats_first.cache_size > 0);
        assert!(stats_first.moves_evaled > 0);
    }

    #[test]
    fn cache_can_be_disabled() {
        let t = engine::init();
        let cfg = ExpectimaxConfig { cache_enabled: false, ..shallow(2) };
        let mut ex = Expectimax::with_config(t, cfg);
        let ev =
            ex.score_toplevel_move(sample_board(), Deck::INITIAL, Tileset::single(1), Move::Down);
        let stats = ex.last_stats();
        assert!(ev > 0.0);
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.cache_size, 0);
    }

    #[test]
    fn depth_limit_bounds_move_plies() {
        let t = engine::init();
        let cfg = ExpectimaxConfig { prob_cutoff: 0.0, ..shallow(2) };
        let mut ex = Expectimax::with_config(t, cfg);
        ex.branch_evals(sample_board(), Deck::INITIAL, Tileset::single(2));
        assert_eq!(ex.last_stats().max_depth, 2);
    }

    #[test]
    fn high_tiles_are_searched_once_unlocked() {
        let t = engine::init();
        let board = Board::from_rows([[7, 0, 0, 0], [3, 0, 0, 0], [0, 2, 0, 0], [0; 4]]);
        let mut ex = Expectimax::with_config(t, shallow(2));
        let branches = ex.branch_evals(board, Deck::INITIAL, Tileset::single(4));
        assert!(branches.iter().any(|b| b.legal));
        assert!(branches.iter().all(|b| b.ev.is_finite() && b.ev >= 0.0));
    }

    #[test]
    fn exhausted_deck_is_refilled() {
        let t = engine::init();
        let board = sample_board();
        let mut ex = Expectimax::with_config(t, shallow(2));
        let drained =
            ex.score_toplevel_move(board, Deck::new(0, 0, 1), Tileset::single(3), Move::Left);
        let no_ones = Deck::INITIAL.draw(1).draw(1).draw(1).draw(1);
        let fresh = ex.score_toplevel_move(board, no_ones, Tileset::single(1), Move::Left);
        assert!(drained.is_finite() && drained > 0.0);
        assert!(fresh.is_finite() && fresh > 0.0);
    }

    #[test]
    fn empty_tileset_uses_deck_odds() {
        let t = engine::init();
        let mut ex = Expectimax::with_config(t, shallow(1));
        let ev = ex.score_toplevel_move(sample_board(), Deck::INITIAL, Tileset::EMPTY, Move::Left);
        assert!(ev.is_finite() && ev > 0.0);
    }

    #[test]
    fn probability_cutoff_stops_before_depth_limit() {
        let t = engine::init();
        let board = sample_board();
        let (moved, changed) = t.execute_move(Move::Left, board);
        assert_eq!(changed.count(), 4);

        // Each insert position carries probability 1/4, below the cutoff.
        let cfg = ExpectimaxConfig { prob_cutoff: 0.3, ..shallow(8) };
        let mut ex = Expectimax::with_config(t, cfg);
        let ev = ex.score_toplevel_move(board, Deck::INITIAL, Tileset::single(3), Move::Left);
        let inserted = |pos| moved.insert_tile(Move::Left, pos, 3);
        let sum: f32 = changed.units().map(|pos| t.score_heuristic(inserted(pos))).sum();
        let expected = sum / 4.0 + TOPLEVEL_EPSILON;
        assert!((ev - expected).abs() <= expected.abs() * 1e-6, "{ev} vs {expected}");
        assert_eq!(ex.last_stats().max_depth, 0);
        assert_eq!(ex.last_stats().moves_evaled, 0);

        let cfg = ExpectimaxConfig { prob_cutoff: 0.01, ..shallow(8) };
        let mut ex = Expectimax::with_config(t, cfg);
        ex.score_toplevel_move(board, Deck::INITIAL, Tileset::single(3), Move::Left);
        let depth = ex.last_stats().max_depth;
        assert!((1..8).contains(&depth), "max depth {depth}");
    }

    #[test]
    fn tile_choice_weights_low_and_high_ranks() {
        let t = engine::init();
        // Max rank 8 unlocks high tiles 4 and 5.
        let board = Board::from_rows([[8, 0, 0, 0], [3, 0, 0, 0], [0, 2, 0, 0], [0, 0, 1, 0]]);
        let dir = Move::Left;
        let (moved, changed) = t.execute_move(dir, board);
        assert_eq!(changed.units().collect::<Vec<_>>(), vec![2, 3]);

        let avg = |tile: u8| -> f32 {
            let inserted = |pos| moved.insert_tile(dir, pos, tile);
            let sum: f32 = changed.units().map(|pos| t.score_heuristic(inserted(pos))).sum();
            sum / changed.count() as f32
        };
        let freq = HIGH_CARD_FREQ as f32;
        // One 1 and three 2s left; the low draw happens 20 times in 21.
        let low = (avg(1) + 3.0 * avg(2)) / (4.0 * freq / (freq - 1.0));
        let high = (avg(4) + avg(5)) / (2.0 * freq);
        let expected = low + high + TOPLEVEL_EPSILON;

        let mut ex = Expectimax::with_config(t, shallow(0));
        let ev = ex.score_toplevel_move(board, Deck::new(1, 3, 0), Tileset::EMPTY, dir);
        assert!((ev - expected).abs() <= expected.abs() * 1e-5, "{ev} vs {expected}");
    }

    #[test]
    fn cache_depth_limit_zero_never_caches() {
        let t = engine::init();
        let cfg = ExpectimaxConfig { cache_depth_limit: 0, ..shallow(3) };
        assert!(cfg.cache_enabled);
        let mut ex = Expectimax::with_config(t, cfg);
        ex.branch_evals(sample_board(), Deck::INITIAL, Tileset::single(2));
        let stats = ex.last_stats();
        assert!(stats.moves_evaled > 0);
        assert_eq!(stats.cache_size, 0);
        assert_eq!(stats.cache_hits, 0);
    }

    #[test]
    fn cached_values_ignore_the_depth_they_were_stored_at() {
        let t = engine::init();
        let board = sample_board();
        let cfg = ExpectimaxConfig { prob_cutoff: 0.0, ..shallow(2) };
        let ex = Expectimax::with_config(t, cfg);

        // Stored at the root with two plies below it.
        let mut state = EvalState::new();
        let deep = ex.score_move_node(&mut state, board, Deck::INITIAL, 1.0);
        let hits = state.cache_hits;

        // Reached again one ply lower within the same evaluation.
        state.cur_depth = 1;
        let revisit = ex.score_move_node(&mut state, board, Deck::INITIAL, 1.0);
        assert_eq!(revisit, deep);
        assert_eq!(state.cache_hits, hits + 1);

        // Searched without the cache at that depth, only one ply remains.
        let mut fresh = EvalState::new();
        fresh.cur_depth = 1;
        let one_ply = ex.score_move_node(&mut fresh, board, Deck::INITIAL, 1.0);
        assert_ne!(one_ply, deep);
    }
}
