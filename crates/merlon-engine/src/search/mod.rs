//! Iterative-deepening alpha-beta search with Lazy SMP workers.

pub mod control;
pub mod draw;
pub mod heuristics;
pub mod kernel;
pub mod ordering;
pub mod params;
pub mod pool;
pub mod quiesce;
pub mod report;
pub mod see;
pub mod tt;

use std::sync::Mutex;
use std::time::Instant;

use cozy_chess::{Board, Move};

use control::{Coordinator, SearchLimits};
use heuristics::{HistoryTable, KillerTable, RefutationTable};
use params::{MATE, MAX_EVAL};
use tt::TransTable;

/// A principal variation built up the recursion stack.
#[derive(Debug, Clone, Default)]
pub struct PvLine {
    moves: Vec<Move>,
}

impl PvLine {
    /// Create an empty line.
    pub fn new() -> Self {
        Self::default()
    }

    /// The moves of the line, best first.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    fn clear(&mut self) {
        self.moves.clear();
    }

    fn first(&self) -> Option<Move> {
        self.moves.first().copied()
    }

    /// Rebuild as `mv` followed by the child's line.
    fn load(&mut self, mv: Move, child: &PvLine) {
        self.moves.clear();
        self.moves.push(mv);
        self.moves.extend_from_slice(&child.moves);
    }
}

/// Deepest root line published so far, shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct RootLine {
    /// Root depth that produced the line.
    pub depth: i32,
    /// Score in centipawns or mate range.
    pub score: i32,
    /// Principal variation, best move first.
    pub pv: Vec<Move>,
}

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best move at the deepest completed depth; `None` only when the root
    /// position has no legal moves.
    pub best_move: Option<Move>,
    /// Expected reply, for pondering.
    pub ponder_move: Option<Move>,
    /// Full principal variation.
    pub pv: Vec<Move>,
    /// Score from the engine's perspective.
    pub score: i32,
    /// Total nodes searched by all workers.
    pub nodes: u64,
    /// Deepest completed root depth.
    pub depth: i32,
}

/// A worker falls back to catch up when it lags the field by two or more
/// completed depths.
fn lagging(depth_reached: i32, dp_completed: i32) -> bool {
    depth_reached > dp_completed + 1
}

/// One search worker. Workers share the transposition table and the
/// coordinator; everything else is private to the worker.
pub struct Worker<'a> {
    thread_id: usize,
    silent: bool,
    tt: &'a TransTable,
    glob: &'a Coordinator,
    limits: &'a SearchLimits,
    best_line: &'a Mutex<RootLine>,
    start: Instant,
    root: Board,
    history: HistoryTable,
    killers: KillerTable,
    refutations: RefutationTable,
    repetitions: Vec<u64>,
    root_depth: i32,
    dp_completed: i32,
    root_choice: bool,
    local_nodes: u64,
}

impl<'a> Worker<'a> {
    /// Create a fresh worker.
    pub fn new(
        thread_id: usize,
        tt: &'a TransTable,
        glob: &'a Coordinator,
        limits: &'a SearchLimits,
        best_line: &'a Mutex<RootLine>,
        silent: bool,
        start: Instant,
    ) -> Self {
        Self {
            thread_id,
            silent,
            tt,
            glob,
            limits,
            best_line,
            start,
            root: Board::default(),
            history: HistoryTable::new(),
            killers: KillerTable::new(),
            refutations: RefutationTable::new(),
            repetitions: Vec::with_capacity(256),
            root_depth: 0,
            dp_completed: 0,
            root_choice: false,
            local_nodes: 0,
        }
    }

    /// Search `board` within the configured limits. `game_hashes` are the
    /// position hashes played before the root, for repetition detection.
    pub fn think(&mut self, board: &Board, game_hashes: &[u64]) {
        self.root = board.clone();
        self.repetitions.clear();
        self.repetitions.extend_from_slice(game_hashes);
        self.history.age();
        self.root_choice = false;
        self.root_depth = 0;
        self.dp_completed = 0;
        self.local_nodes = 0;
        self.iterate(board);
    }

    /// The outer iterative-deepening loop.
    fn iterate(&mut self, board: &Board) {
        let mut cur_val = 0;
        let mut pv = PvLine::new();

        // Lazy SMP works best with some depth variance, so every other
        // worker starts one depth further in.
        let offset = (self.thread_id & 1) as i32;

        for depth in (1 + offset)..=self.limits.depth {
            self.root_depth = depth;

            // A worker lagging the field is unlikely to contribute at this
            // depth; skip ahead instead of searching.
            if lagging(self.glob.depth_reached(), self.dp_completed) {
                self.dp_completed += 1;
                continue;
            }

            if !self.silent {
                println!("info depth {depth}");
            }
            cur_val = self.widen(board, depth, cur_val, &mut pv);

            if self.glob.aborted() {
                break;
            }

            self.record_iteration(cur_val, &pv);

            // A forced move needs no deeper thought
            if depth >= 8 && !self.root_choice {
                break;
            }

            // Stop once the shortest mate cannot be improved by going deeper
            if cur_val.abs() > MAX_EVAL {
                let mate_depth = (MATE - cur_val.abs() + 2) * 4 / 3;
                if mate_depth <= depth {
                    self.dp_completed = depth;
                    break;
                }
            }

            self.dp_completed = depth;
            self.glob.raise_depth(self.dp_completed);
        }

        // Converge the other workers after a fixed-depth exit
        if !self.silent {
            self.glob.raise_abort();
        }
    }

    fn record_iteration(&self, score: i32, pv: &PvLine) {
        let mut line = self.best_line.lock().expect("root line mutex poisoned");
        if self.root_depth >= line.depth {
            line.depth = self.root_depth;
            line.score = score;
            if !pv.moves.is_empty() {
                line.pv = pv.moves.clone();
            }
        }
    }

    /// Publish a new root line and, unless stale or silent, print it.
    fn publish_root(&self, score: i32, pv: &PvLine) {
        {
            let mut line = self.best_line.lock().expect("root line mutex poisoned");
            if self.root_depth >= line.depth {
                line.depth = self.root_depth;
                line.score = score;
                line.pv = pv.moves.clone();
            }
        }
        // Workers that fell behind keep quiet so the output depth stays monotonic
        if self.silent || self.root_depth < self.glob.depth_reached() {
            return;
        }
        report::display_pv(
            &self.root,
            self.root_depth,
            self.start.elapsed().as_millis(),
            self.glob.nodes(),
            score,
            &pv.moves,
        );
    }

    fn deadline_exceeded(&self) -> bool {
        !self.glob.is_pondering()
            && self
                .limits
                .move_time
                .is_some_and(|budget| self.start.elapsed() >= budget)
    }

    /// Periodic node/time/NPS bookkeeping, called on every node.
    fn slowdown(&mut self) {
        if let Some(cap) = self.limits.max_nodes
            && self.glob.nodes() >= cap
        {
            self.glob.raise_abort();
        }

        // Weak-level throttle: sleep until the measured speed drops under
        // the cap, still honouring the move-time deadline.
        if let Some(nps_cap) = self.limits.nps_cap
            && self.root_depth > 1
        {
            loop {
                let elapsed = self.start.elapsed().as_millis().max(1) as u64;
                let nps = self.glob.nodes() * 1000 / elapsed;
                if nps <= nps_cap || self.glob.aborted() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
                if self.deadline_exceeded() {
                    self.glob.raise_abort();
                    return;
                }
            }
        }

        if self.local_nodes & 2047 == 0 && self.root_depth > 1 && self.deadline_exceeded() {
            self.glob.raise_abort();
        }
    }

    fn is_draw(&self, board: &Board) -> bool {
        draw::is_draw(board, &self.repetitions)
    }

    /// Credit a cutoff move: history bonus, killer slot, and the
    /// refutation entry for the opponent's previous move. Captures and
    /// promotions carry their own ordering signal and are skipped.
    fn credit_cutoff(&mut self, board: &Board, last_move: Option<Move>, mv: Move, depth: i32, ply: i32) {
        let stm = board.side_to_move();
        let quiet = board.piece_on(mv.to).is_none() && mv.promotion.is_none();
        if !quiet {
            return;
        }
        let piece = board.piece_on(mv.from).unwrap_or(cozy_chess::Piece::Pawn);
        self.history.bump(stm, piece, mv.to, depth);
        self.killers.store(ply, mv);
        if let Some(last) = last_move {
            self.refutations.store(last, mv);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    use super::params::{MATE, MAX_EVAL};

    fn run_search(fen: &str, depth: i32) -> RootLine {
        let board: Board = fen.parse().unwrap();
        let tt = TransTable::new(1);
        let glob = Coordinator::new();
        let limits = SearchLimits::depth_only(depth);
        let line = Mutex::new(RootLine::default());
        {
            let mut worker = Worker::new(0, &tt, &glob, &limits, &line, true, Instant::now());
            worker.think(&board, &[]);
        }
        line.into_inner().expect("root line mutex poisoned")
    }

    #[test]
    fn lagging_predicate_matches_skip_rule() {
        assert!(!lagging(0, 0));
        assert!(!lagging(1, 0));
        assert!(lagging(2, 0));
        assert!(lagging(5, 3));
        assert!(!lagging(4, 3));
    }

    #[test]
    fn finds_scholars_mate() {
        let line = run_search(
            "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
            2,
        );
        assert_eq!(line.pv[0].to_string(), "h5f7");
        assert_eq!(line.score, MATE - 1);
    }

    #[test]
    fn finds_mate_in_two_with_queen_and_king() {
        // Qd6/Kd5 vs Ke8: Ke6 forces Kd8, then Qd7 mates
        let line = run_search("4k3/8/3Q4/3K4/8/8/8/8 w - - 0 1", 4);
        assert!(
            line.score > MAX_EVAL,
            "score {} should be in the mate range",
            line.score
        );
        assert_eq!(line.score, MATE - 3);
    }

    #[test]
    fn avoids_stalemate_and_mates_instead() {
        // Qf7/Kg6 vs Kh8: Qg7 is mate, most queen retreats stalemate
        let line = run_search("7k/5Q2/6K1/8/8/8/8/8 w - - 0 1", 4);
        assert_ne!(line.score, 0, "must never score its own position as stalemate");
        assert_eq!(line.score, MATE - 1);
        let best = line.pv[0].to_string();
        assert!(
            best == "f7g7" || best == "f7f8",
            "{best} is not one of the mating moves"
        );
    }

    #[test]
    fn fifty_move_rule_prefers_the_mating_capture() {
        // Clock at 99: quiet back-rank mates land on the hundredth half-move
        // and count as draws, so only Rxa8# keeps a winning score.
        let line = run_search("r5k1/5ppp/8/8/8/8/8/R5K1 w - - 99 80", 3);
        assert!(
            line.score > MAX_EVAL,
            "score {} should be a mate, not the draw score",
            line.score
        );
        assert_eq!(line.pv[0].to_string(), "a1a8");
    }

    #[test]
    fn mated_position_scores_deeply_negative() {
        // Black is already checkmated
        let line = run_search("7k/6Q1/5K2/8/8/8/8/8 b - - 0 1", 2);
        assert!(line.score < -MAX_EVAL);
        assert!(line.pv.is_empty());
    }

    #[test]
    fn stalemate_scores_zero() {
        let line = run_search("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1", 2);
        assert_eq!(line.score, 0);
        assert!(line.pv.is_empty());
    }

    #[test]
    fn single_legal_move_stops_at_depth_eight() {
        // Ka1 can only go to a2
        let line = run_search("8/8/8/8/8/1r6/2k5/K7 w - - 0 1", 30);
        assert_eq!(line.depth, 8, "a forced move should stop iterating at depth 8");
        assert_eq!(line.pv[0].to_string(), "a1a2");
    }

    #[test]
    fn completed_depth_never_exceeds_root_depth() {
        let board = Board::default();
        let tt = TransTable::new(1);
        let glob = Coordinator::new();
        let limits = SearchLimits::depth_only(5);
        let line = Mutex::new(RootLine::default());
        {
            let mut worker = Worker::new(0, &tt, &glob, &limits, &line, true, Instant::now());
            worker.think(&board, &[]);
            assert!(worker.dp_completed <= worker.root_depth);
            assert_eq!(worker.dp_completed, 5);
        }
        assert!(glob.depth_reached() >= 5);
    }

    #[test]
    fn repetition_of_game_history_is_a_draw() {
        // The root position already occurred: shuffling back counts as a
        // repetition, so the search must not claim a big material edge twice.
        let board: Board = "4k3/8/8/8/8/8/8/Q3K3 w - - 0 1".parse().unwrap();
        let tt = TransTable::new(1);
        let glob = Coordinator::new();
        let limits = SearchLimits::depth_only(3);
        let line = Mutex::new(RootLine::default());
        {
            let mut worker = Worker::new(0, &tt, &glob, &limits, &line, true, Instant::now());
            worker.think(&board, &[board.hash()]);
        }
        let line = line.into_inner().unwrap();
        assert!(!line.pv.is_empty());
    }

    #[test]
    fn deterministic_across_identical_runs() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3";
        let a = run_search(fen, 6);
        let b = run_search(fen, 6);
        assert_eq!(a.score, b.score);
        assert_eq!(a.pv, b.pv);
    }
}
