//! Lazy SMP worker pool.
//!
//! Workers run independent iterative-deepening searches against private
//! board clones and coordinate only through the shared transposition table
//! and the coordinator flags. Thread-id parity staggers the starting
//! depths; the first worker to satisfy a completion condition raises the
//! abort flag and the rest converge.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use cozy_chess::Board;
use tracing::debug;

use crate::search::control::{Coordinator, SearchLimits};
use crate::search::tt::TransTable;
use crate::search::{RootLine, SearchResult, Worker};

/// Generous stacks: the kernel may recurse a full `MAX_PLY` of frames,
/// each carrying a move picker and a PV buffer.
const WORKER_STACK: usize = 16 * 1024 * 1024;

/// Owns the shared transposition table and spawns the search workers.
pub struct SearchPool {
    tt: TransTable,
    glob: Arc<Coordinator>,
    threads: usize,
    silent: bool,
}

impl SearchPool {
    /// Create a pool with a `hash_mb` megabyte transposition table.
    pub fn new(hash_mb: usize, glob: Arc<Coordinator>) -> Self {
        Self {
            tt: TransTable::new(hash_mb),
            glob,
            threads: 1,
            silent: false,
        }
    }

    /// Set the number of search workers.
    pub fn set_threads(&mut self, n: usize) {
        self.threads = n.max(1);
    }

    /// Suppress all stdout output (fixed-depth tests and benches).
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Replace the transposition table with a fresh one of `mb` megabytes.
    pub fn resize_tt(&mut self, mb: usize) {
        self.tt = TransTable::new(mb);
    }

    /// Wipe the transposition table.
    pub fn clear(&self) {
        self.tt.clear();
    }

    /// The coordinator shared with the UCI driver.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.glob
    }

    /// Run a search over `board` within `limits`.
    ///
    /// `game_hashes` holds the hashes of every position reached in the game
    /// so far, for repetition detection. Worker 0 runs on the calling
    /// thread; helpers are scope-spawned so the table needs no `Arc`.
    pub fn search(
        &mut self,
        board: &Board,
        game_hashes: &[u64],
        limits: &SearchLimits,
    ) -> SearchResult {
        if self.glob.take_clear_request() {
            self.tt.clear();
        }
        self.glob.new_search();
        self.tt.new_generation();

        debug!(threads = self.threads, depth = limits.depth, "search started");

        let best_line = Mutex::new(RootLine::default());
        let start = Instant::now();
        let silent = self.silent;
        let tt = &self.tt;
        let glob = &self.glob;

        std::thread::scope(|scope| {
            for thread_id in 1..self.threads {
                let best_line = &best_line;
                std::thread::Builder::new()
                    .name(format!("merlon-{thread_id}"))
                    .stack_size(WORKER_STACK)
                    .spawn_scoped(scope, move || {
                        let mut worker =
                            Worker::new(thread_id, tt, glob, limits, best_line, silent, start);
                        worker.think(board, game_hashes);
                    })
                    .expect("failed to spawn search worker");
            }

            let mut worker = Worker::new(0, tt, glob, limits, &best_line, silent, start);
            worker.think(board, game_hashes);
        });
        // the scope joins every helper before results are read

        let line = best_line.into_inner().expect("root line mutex poisoned");
        let best_move = line.pv.first().copied();
        let ponder_move = line.pv.get(1).copied();

        SearchResult {
            best_move,
            ponder_move,
            pv: line.pv,
            score: line.score,
            nodes: self.glob.nodes(),
            depth: line.depth,
        }
    }
}

impl std::fmt::Debug for SearchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPool")
            .field("tt", &self.tt)
            .field("threads", &self.threads)
            .finish()
    }
}
