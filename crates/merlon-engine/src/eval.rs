//! Static evaluation: material and piece-square tables.
//!
//! Deliberately lightweight — the search core only needs a sane, fast
//! centipawn signal for stand-pat and pruning margins.

use cozy_chess::{Board, Color, Piece};

const MATERIAL: [i32; 6] = [100, 325, 335, 500, 975, 0];

const TEMPO: i32 = 10;

#[rustfmt::skip]
const PAWN_PST: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      2,   4,   4, -12, -12,   4,   4,   2,
      2,  -2,  -4,   2,   2,  -4,  -2,   2,
      0,   0,   6,  14,  14,   6,   0,   0,
      4,   4,  10,  18,  18,  10,   4,   4,
      8,  10,  16,  22,  22,  16,  10,   8,
     28,  30,  34,  36,  36,  34,  30,  28,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
    -34, -22, -16, -12, -12, -16, -22, -34,
    -20,  -8,   0,   4,   4,   0,  -8, -20,
    -12,   4,  10,  14,  14,  10,   4, -12,
     -8,   6,  16,  20,  20,  16,   6,  -8,
     -8,   6,  18,  22,  22,  18,   6,  -8,
    -12,   4,  12,  18,  18,  12,   4, -12,
    -20,  -8,   2,   6,   6,   2,  -8, -20,
    -34, -22, -14, -10, -10, -14, -22, -34,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
    -14, -10,  -8,  -6,  -6,  -8, -10, -14,
     -6,   8,   4,   2,   2,   4,   8,  -6,
     -4,   4,   8,   6,   6,   8,   4,  -4,
     -2,   2,   8,  12,  12,   8,   2,  -2,
     -2,   2,  10,  12,  12,  10,   2,  -2,
     -4,   6,   8,   8,   8,   8,   6,  -4,
     -6,   2,   2,   2,   2,   2,   2,  -6,
    -14,  -8,  -8,  -6,  -6,  -8,  -8, -14,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
     -4,  -2,   2,   6,   6,   2,  -2,  -4,
     -6,  -2,   0,   4,   4,   0,  -2,  -6,
     -6,  -2,   0,   4,   4,   0,  -2,  -6,
     -6,  -2,   0,   4,   4,   0,  -2,  -6,
     -4,   0,   2,   4,   4,   2,   0,  -4,
     -2,   2,   4,   6,   6,   4,   2,  -2,
      8,  12,  14,  16,  16,  14,  12,   8,
      4,   6,   8,  10,  10,   8,   6,   4,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
    -12,  -8,  -6,  -2,  -2,  -6,  -8, -12,
     -8,  -2,   2,   2,   2,   2,  -2,  -8,
     -6,   2,   4,   4,   4,   4,   2,  -6,
     -2,   2,   4,   6,   6,   4,   2,  -2,
     -2,   2,   4,   6,   6,   4,   2,  -2,
     -6,   2,   4,   4,   4,   4,   2,  -6,
     -8,  -2,   2,   2,   2,   2,  -2,  -8,
    -12,  -8,  -6,  -2,  -2,  -6,  -8, -12,
];

#[rustfmt::skip]
const KING_PST: [i32; 64] = [
     16,  22,  10,  -4,  -4,  10,  22,  16,
     12,  14,   2,  -8,  -8,   2,  14,  12,
     -8, -12, -16, -20, -20, -16, -12,  -8,
    -16, -20, -24, -30, -30, -24, -20, -16,
    -24, -28, -32, -36, -36, -32, -28, -24,
    -28, -32, -36, -40, -40, -36, -32, -28,
    -32, -36, -40, -44, -44, -40, -36, -32,
    -36, -40, -44, -48, -48, -44, -40, -36,
];

const PST: [&[i32; 64]; 6] = [
    &PAWN_PST,
    &KNIGHT_PST,
    &BISHOP_PST,
    &ROOK_PST,
    &QUEEN_PST,
    &KING_PST,
];

/// Evaluate the position in centipawns from the side to move's perspective.
pub fn evaluate(board: &Board) -> i32 {
    let mut score = 0;
    for piece in Piece::ALL {
        let value = MATERIAL[piece as usize];
        let pst = PST[piece as usize];
        for sq in board.colored_pieces(Color::White, piece) {
            score += value + pst[sq as usize];
        }
        for sq in board.colored_pieces(Color::Black, piece) {
            score -= value + pst[sq as usize ^ 56];
        }
    }
    let score = if board.side_to_move() == Color::White {
        score
    } else {
        -score
    };
    score + TEMPO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_is_balanced_up_to_tempo() {
        assert_eq!(evaluate(&Board::default()), TEMPO);
    }

    #[test]
    fn evaluation_is_symmetric() {
        // Mirrored position: the same score from both sides
        let white_view: Board = "4k3/8/8/8/8/8/8/RN2K3 w - - 0 1".parse().unwrap();
        let black_view: Board = "rn2k3/8/8/8/8/8/8/4K3 b - - 0 1".parse().unwrap();
        assert_eq!(evaluate(&white_view), evaluate(&black_view));
    }

    #[test]
    fn material_up_is_positive() {
        let board: Board = "4k3/8/8/8/8/8/8/Q3K3 w - - 0 1".parse().unwrap();
        assert!(evaluate(&board) > 800);
    }

    #[test]
    fn perspective_flips_sign() {
        let board: Board = "4k3/8/8/8/8/8/8/Q3K3 b - - 0 1".parse().unwrap();
        assert!(evaluate(&board) < -800);
    }

    #[test]
    fn centre_pawn_beats_rim_pawn() {
        let centre: Board = "4k3/8/8/8/3P4/8/8/4K3 w - - 0 1".parse().unwrap();
        let rim: Board = "4k3/8/8/8/P7/8/8/4K3 w - - 0 1".parse().unwrap();
        assert!(evaluate(&centre) > evaluate(&rim));
    }
}
