//! UCI `info` output: principal variations, mate conversion, currmove.

use cozy_chess::{Board, File, Move, Piece, Square};

use crate::search::params::{MATE, MAX_EVAL};

/// Render a move in standard UCI notation.
///
/// cozy-chess encodes castling as king-takes-rook; the protocol expects
/// the king's arrival square instead.
pub fn move_to_uci(board: &Board, mv: Move) -> String {
    if board.color_on(mv.to) == Some(board.side_to_move())
        && board.piece_on(mv.from) == Some(Piece::King)
    {
        let file = if (mv.to.file() as usize) > (mv.from.file() as usize) {
            File::G
        } else {
            File::C
        };
        let dest = Square::new(file, mv.from.rank());
        return format!("{}{}", mv.from, dest);
    }
    mv.to_string()
}

/// Render a principal variation, walking the line so each move is printed
/// against the board it is played on.
pub fn pv_to_string(root: &Board, pv: &[Move]) -> String {
    let mut board = root.clone();
    let mut parts = Vec::with_capacity(pv.len());
    for &mv in pv {
        parts.push(move_to_uci(&board, mv));
        if board.try_play(mv).is_err() {
            break;
        }
    }
    parts.join(" ")
}

/// Split a search score into the UCI score type and value, converting the
/// reserved mate range into a distance in full moves.
pub fn uci_score(score: i32) -> (&'static str, i32) {
    if score > MAX_EVAL {
        ("mate", (MATE - score + 1) / 2)
    } else if score < -MAX_EVAL {
        ("mate", (-MATE - score) / 2)
    } else {
        ("cp", score)
    }
}

/// Print a full `info` line for a new root line.
pub fn display_pv(root: &Board, depth: i32, elapsed_ms: u128, nodes: u64, score: i32, pv: &[Move]) {
    let elapsed_ms = elapsed_ms.max(1);
    let nps = nodes as u128 * 1000 / elapsed_ms;
    let (kind, value) = uci_score(score);
    println!(
        "info depth {depth} time {elapsed_ms} nodes {nodes} nps {nps} score {kind} {value} pv {}",
        pv_to_string(root, pv)
    );
}

/// Print the move currently being searched at the root.
pub fn display_currmove(board: &Board, mv: Move, number: i32) {
    println!(
        "info currmove {} currmovenumber {number}",
        move_to_uci(board, mv)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_mate_distance_in_full_moves() {
        assert_eq!(uci_score(MATE - 1), ("mate", 1));
        assert_eq!(uci_score(MATE - 3), ("mate", 2));
        assert_eq!(uci_score(MATE - 5), ("mate", 3));
    }

    #[test]
    fn negative_mate_distance_in_full_moves() {
        assert_eq!(uci_score(-MATE + 2), ("mate", -1));
        assert_eq!(uci_score(-MATE + 4), ("mate", -2));
    }

    #[test]
    fn centipawn_scores_pass_through() {
        assert_eq!(uci_score(42), ("cp", 42));
        assert_eq!(uci_score(-MAX_EVAL), ("cp", -MAX_EVAL));
    }

    #[test]
    fn castling_prints_king_destination() {
        let board: Board = "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1"
            .parse()
            .unwrap();
        let mut short = None;
        let mut long = None;
        board.generate_moves(|set| {
            for mv in set {
                if board.color_on(mv.to) == Some(cozy_chess::Color::White) {
                    if mv.to == Square::H1 {
                        short = Some(mv);
                    } else if mv.to == Square::A1 {
                        long = Some(mv);
                    }
                }
            }
            false
        });
        assert_eq!(move_to_uci(&board, short.unwrap()), "e1g1");
        assert_eq!(move_to_uci(&board, long.unwrap()), "e1c1");
    }

    #[test]
    fn ordinary_moves_print_verbatim() {
        let board = Board::default();
        let mv: Move = "e2e4".parse().unwrap();
        assert_eq!(move_to_uci(&board, mv), "e2e4");
    }

    #[test]
    fn pv_walks_the_line() {
        let board = Board::default();
        let pv: Vec<Move> = vec!["e2e4".parse().unwrap(), "e7e5".parse().unwrap()];
        assert_eq!(pv_to_string(&board, &pv), "e2e4 e7e5");
    }
}
