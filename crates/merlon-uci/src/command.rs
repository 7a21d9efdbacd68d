//! UCI command parsing.

use std::time::Duration;

use cozy_chess::{Board, File, Move, Piece, Square};

use crate::error::UciError;

/// Parameters for the `go` command.
///
/// All fields are optional; a bare `go` searches without limits.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    /// White's remaining time.
    pub wtime: Option<Duration>,
    /// Black's remaining time.
    pub btime: Option<Duration>,
    /// White's increment per move.
    pub winc: Option<Duration>,
    /// Black's increment per move.
    pub binc: Option<Duration>,
    /// Moves until the next time control.
    pub movestogo: Option<u32>,
    /// Search to this depth only.
    pub depth: Option<i32>,
    /// Search for exactly this duration.
    pub movetime: Option<Duration>,
    /// Search this many nodes only.
    pub nodes: Option<u64>,
    /// Search until `stop`.
    pub infinite: bool,
    /// Search in pondering mode.
    pub ponder: bool,
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- reset engine state.
    UciNewGame,
    /// `position` -- board plus the hash of every position on the way there.
    Position {
        /// The position to search.
        board: Board,
        /// Hashes from the initial position through `board`, inclusive.
        hashes: Vec<u64>,
    },
    /// `go` -- start searching.
    Go(GoParams),
    /// `setoption` -- engine configuration.
    SetOption {
        /// Option name, lowercased.
        name: String,
        /// Option value, if any.
        value: Option<String>,
    },
    /// `ponderhit` -- the opponent played the expected move.
    PonderHit,
    /// `stop` -- halt the current search.
    Stop,
    /// `quit` -- exit the engine.
    Quit,
    /// Unrecognized command (silently ignored per UCI convention).
    Unknown(String),
}

/// Parse a single line of UCI input.
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        "ponderhit" => Ok(Command::PonderHit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "setoption" => parse_setoption(&tokens[1..]),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Resolve a UCI move string against a position.
///
/// Standard castling notation (`e1g1`) is normalized to cozy-chess's
/// king-takes-rook encoding; the move must be legal on `board`.
pub fn parse_uci_move(board: &Board, text: &str) -> Option<Move> {
    let mut mv: Move = text.parse().ok()?;

    if board.piece_on(mv.from) == Some(Piece::King) && mv.from.rank() == mv.to.rank() {
        let from_file = mv.from.file() as i32;
        let to_file = mv.to.file() as i32;
        if (from_file - to_file).abs() == 2 {
            let rook_file = if to_file > from_file { File::H } else { File::A };
            mv = Move {
                from: mv.from,
                to: Square::new(rook_file, mv.from.rank()),
                promotion: None,
            };
        }
    }

    let mut legal = false;
    board.generate_moves(|set| {
        for candidate in set {
            if candidate == mv {
                legal = true;
            }
        }
        legal
    });
    legal.then_some(mv)
}

/// Parse the `position` command arguments.
///
/// Supports `position startpos [moves ...]` and
/// `position fen <fen> [moves ...]`, collecting the hash of every position
/// along the way for repetition detection.
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (mut board, rest) = if tokens[0] == "startpos" {
        (Board::default(), &tokens[1..])
    } else if tokens[0] == "fen" {
        // FEN is 6 space-separated fields
        if tokens.len() < 7 {
            return Err(UciError::InvalidFen {
                fen: tokens[1..].join(" "),
            });
        }
        let fen = tokens[1..7].join(" ");
        let board: Board = fen
            .parse()
            .map_err(|_| UciError::InvalidFen { fen: fen.clone() })?;
        (board, &tokens[7..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    let mut hashes = vec![board.hash()];
    if !rest.is_empty() && rest[0] == "moves" {
        for text in &rest[1..] {
            let mv = parse_uci_move(&board, text).ok_or_else(|| UciError::InvalidMove {
                uci_move: text.to_string(),
            })?;
            board.play_unchecked(mv);
            hashes.push(board.hash());
        }
    }

    Ok(Command::Position { board, hashes })
}

/// Parse the `go` command arguments; unknown tokens are skipped.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "wtime" => {
                params.wtime = Some(parse_millis(tokens.get(i + 1), "wtime")?);
                i += 2;
            }
            "btime" => {
                params.btime = Some(parse_millis(tokens.get(i + 1), "btime")?);
                i += 2;
            }
            "winc" => {
                params.winc = Some(parse_millis(tokens.get(i + 1), "winc")?);
                i += 2;
            }
            "binc" => {
                params.binc = Some(parse_millis(tokens.get(i + 1), "binc")?);
                i += 2;
            }
            "movestogo" => {
                params.movestogo = Some(parse_int(tokens.get(i + 1), "movestogo")?);
                i += 2;
            }
            "depth" => {
                params.depth = Some(parse_int(tokens.get(i + 1), "depth")?);
                i += 2;
            }
            "movetime" => {
                params.movetime = Some(parse_millis(tokens.get(i + 1), "movetime")?);
                i += 2;
            }
            "nodes" => {
                params.nodes = Some(parse_int(tokens.get(i + 1), "nodes")?);
                i += 2;
            }
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    Ok(Command::Go(params))
}

/// Parse `setoption name <name...> [value <value...>]`.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.first() != Some(&"name") {
        return Err(UciError::MalformedSetOption);
    }
    let value_at = tokens.iter().position(|&t| t == "value");
    let name_end = value_at.unwrap_or(tokens.len());
    if name_end <= 1 {
        return Err(UciError::MalformedSetOption);
    }

    let name = tokens[1..name_end].join(" ").to_ascii_lowercase();
    let value = value_at.map(|at| tokens[at + 1..].join(" "));

    Ok(Command::SetOption { name, value })
}

fn parse_millis(token: Option<&&str>, param: &str) -> Result<Duration, UciError> {
    let value = token.ok_or_else(|| UciError::MissingGoValue {
        param: param.to_string(),
    })?;
    // Some interfaces send negative clocks when flagging; floor at zero
    let ms: i64 = value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })?;
    Ok(Duration::from_millis(ms.max(0) as u64))
}

fn parse_int<T: std::str::FromStr>(token: Option<&&str>, param: &str) -> Result<T, UciError> {
    let value = token.ok_or_else(|| UciError::MissingGoValue {
        param: param.to_string(),
    })?;
    value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })
}
