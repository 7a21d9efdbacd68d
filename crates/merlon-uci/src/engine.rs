//! Event-driven, multi-threaded UCI engine with pondering support.

use std::io::{self, BufRead};
use std::sync::{Arc, mpsc};

use tracing::{debug, info, warn};

use cozy_chess::Board;
use merlon_engine::search::report::move_to_uci;
use merlon_engine::{Coordinator, SearchPool, SearchResult, limits_from_go};

use crate::command::{Command, GoParams, parse_command};
use crate::error::UciError;

/// Stack for the thread that runs worker 0 of the search.
const SEARCH_STACK: usize = 16 * 1024 * 1024;

const DEFAULT_HASH_MB: usize = 64;

/// Internal engine state — idle, searching, or pondering.
enum EngineState {
    Idle,
    Searching,
    Pondering,
}

/// Events processed by the main engine loop.
enum EngineEvent {
    UciCommand(Result<Command, UciError>),
    SearchDone(SearchDone),
    InputClosed,
}

/// Payload returned by the search thread when it finishes.
struct SearchDone {
    result: SearchResult,
    pool: SearchPool,
}

/// The UCI engine, holding the current position and the search pool.
///
/// Runs an event-driven loop on the main thread: a reader thread feeds
/// stdin lines into a channel, searches run on their own thread, and
/// `stop`/`quit`/`ponderhit` act through the shared coordinator flags.
pub struct UciEngine {
    board: Board,
    game_hashes: Vec<u64>,
    glob: Arc<Coordinator>,
    pool: Option<SearchPool>,
    state: EngineState,
    nps_limit: Option<u64>,
}

impl UciEngine {
    /// Create a new engine with the starting position.
    pub fn new() -> Self {
        let glob = Arc::new(Coordinator::new());
        let board = Board::default();
        Self {
            game_hashes: vec![board.hash()],
            board,
            pool: Some(SearchPool::new(DEFAULT_HASH_MB, Arc::clone(&glob))),
            glob,
            state: EngineState::Idle,
            nps_limit: None,
        }
    }

    /// Run the UCI event loop until `quit` or stdin closes.
    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<EngineEvent>();

        // Spawn stdin reader thread
        let stdin_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim().to_string();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!(cmd = %trimmed, "received UCI command");
                        let cmd = parse_command(&trimmed);
                        if stdin_tx.send(EngineEvent::UciCommand(cmd)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = stdin_tx.send(EngineEvent::InputClosed);
        });

        for event in &rx {
            match event {
                EngineEvent::UciCommand(Ok(cmd)) => match cmd {
                    Command::Uci => self.handle_uci(),
                    Command::IsReady => println!("readyok"),
                    Command::UciNewGame => self.handle_ucinewgame(),
                    Command::Position { board, hashes } => {
                        self.board = board;
                        self.game_hashes = hashes;
                    }
                    Command::SetOption { name, value } => self.handle_setoption(&name, value),
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::PonderHit => self.handle_ponderhit(),
                    Command::Stop => self.glob.raise_abort(),
                    Command::Quit => {
                        self.shutdown(&rx);
                        break;
                    }
                    Command::Unknown(_) => {}
                },
                EngineEvent::UciCommand(Err(e)) => {
                    warn!(error = %e, "UCI parse error");
                }
                EngineEvent::SearchDone(done) => self.finish_search(done),
                EngineEvent::InputClosed => {
                    self.shutdown(&rx);
                    break;
                }
            }
        }

        info!("merlon shutting down");
        Ok(())
    }

    fn handle_uci(&self) {
        println!("id name merlon");
        println!("id author the merlon authors");
        println!("option name Hash type spin default {DEFAULT_HASH_MB} min 1 max 4096");
        println!("option name Threads type spin default 1 min 1 max 256");
        println!("option name Ponder type check default false");
        println!("option name Clear Hash type button");
        println!("option name NpsLimit type spin default 0 min 0 max 100000000");
        println!("uciok");
    }

    fn handle_ucinewgame(&mut self) {
        self.board = Board::default();
        self.game_hashes = vec![self.board.hash()];
        self.glob.request_clear();
    }

    fn handle_setoption(&mut self, name: &str, value: Option<String>) {
        match name {
            "hash" => {
                let Some(mb) = value.and_then(|v| v.parse::<usize>().ok()) else {
                    warn!("bad Hash value");
                    return;
                };
                match self.pool.as_mut() {
                    Some(pool) => pool.resize_tt(mb.clamp(1, 4096)),
                    None => warn!("cannot resize hash during a search"),
                }
            }
            "threads" => {
                let Some(n) = value.and_then(|v| v.parse::<usize>().ok()) else {
                    warn!("bad Threads value");
                    return;
                };
                match self.pool.as_mut() {
                    Some(pool) => pool.set_threads(n.clamp(1, 256)),
                    None => warn!("cannot change threads during a search"),
                }
            }
            "clear hash" => self.glob.request_clear(),
            "npslimit" => {
                self.nps_limit = value
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|&cap| cap > 0);
            }
            "ponder" => {} // declared for interfaces; pondering is driven by `go ponder`
            other => debug!(option = other, "ignoring unknown option"),
        }
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<EngineEvent>) {
        if !matches!(self.state, EngineState::Idle) {
            warn!("go received while not idle, ignoring");
            return;
        }
        let Some(mut pool) = self.pool.take() else {
            warn!("search pool unavailable");
            return;
        };

        self.glob.set_pondering(params.ponder);

        let mut limits = limits_from_go(
            params.wtime,
            params.btime,
            params.winc,
            params.binc,
            params.movestogo,
            params.depth,
            params.movetime,
            params.nodes,
            params.infinite,
            self.board.side_to_move(),
        );
        limits.nps_cap = self.nps_limit;

        let board = self.board.clone();
        let hashes = self.game_hashes.clone();
        let tx = tx.clone();

        std::thread::Builder::new()
            .name("merlon-search".into())
            .stack_size(SEARCH_STACK)
            .spawn(move || {
                let result = pool.search(&board, &hashes, &limits);
                let _ = tx.send(EngineEvent::SearchDone(SearchDone { result, pool }));
            })
            .expect("failed to spawn search thread");

        self.state = if params.ponder {
            EngineState::Pondering
        } else {
            EngineState::Searching
        };
    }

    /// Latch the goodbye flag and wait out any in-flight search: the
    /// process must not exit while workers are still writing.
    fn shutdown(&mut self, rx: &mpsc::Receiver<EngineEvent>) {
        self.glob.say_goodbye();
        if matches!(self.state, EngineState::Idle) {
            return;
        }
        self.glob.raise_abort();
        for ev in rx {
            if let EngineEvent::SearchDone(done) = ev {
                self.finish_search(done);
                break;
            }
        }
    }

    fn handle_ponderhit(&mut self) {
        if !matches!(self.state, EngineState::Pondering) {
            warn!("ponderhit received while not pondering, ignoring");
            return;
        }
        self.glob.set_pondering(false);
        self.state = EngineState::Searching;
    }

    fn finish_search(&mut self, done: SearchDone) {
        self.pool = Some(done.pool);
        self.state = EngineState::Idle;
        self.glob.set_pondering(false);

        let result = &done.result;
        match result.best_move {
            None => println!("bestmove 0000"),
            Some(best) => {
                let best_str = move_to_uci(&self.board, best);
                match result.ponder_move {
                    Some(ponder) => {
                        // Render the reply on the board it will be played on
                        let mut after = self.board.clone();
                        if after.try_play(best).is_ok() {
                            println!("bestmove {best_str} ponder {}", move_to_uci(&after, ponder));
                        } else {
                            println!("bestmove {best_str}");
                        }
                    }
                    None => println!("bestmove {best_str}"),
                }
            }
        }
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}
