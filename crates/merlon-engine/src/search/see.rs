//! Static exchange evaluation.
//!
//! Classic swap algorithm: play out the capture sequence on the target
//! square, always recapturing with the least valuable attacker, then fold
//! the gain list back assuming either side may stop the exchange.

use cozy_chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves,
    BitBoard, Board, Color, Move, Piece, Rank, Square,
};

const SEE_VALUE: [i32; 6] = [100, 325, 335, 500, 975, 20_000];

/// All pieces of either side attacking `sq`, given the occupancy `occ`.
///
/// Recomputing the slider attacks against a shrinking occupancy is what
/// reveals x-ray attackers as the exchange progresses.
fn attackers_to(board: &Board, sq: Square, occ: BitBoard) -> BitBoard {
    let rooks = board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    let bishops = board.pieces(Piece::Bishop) | board.pieces(Piece::Queen);
    let attackers = (get_rook_moves(sq, occ) & rooks)
        | (get_bishop_moves(sq, occ) & bishops)
        | (get_knight_moves(sq) & board.pieces(Piece::Knight))
        | (get_king_moves(sq) & board.pieces(Piece::King))
        | (get_pawn_attacks(sq, Color::Black) & board.colored_pieces(Color::White, Piece::Pawn))
        | (get_pawn_attacks(sq, Color::White) & board.colored_pieces(Color::Black, Piece::Pawn));
    attackers & occ
}

fn least_attacker(board: &Board, set: BitBoard) -> Option<(Square, Piece)> {
    for piece in Piece::ALL {
        if let Some(sq) = (set & board.pieces(piece)).into_iter().next() {
            return Some((sq, piece));
        }
    }
    None
}

/// Net material outcome of `mv` in centipawns for the side to move.
pub fn see(board: &Board, mv: Move) -> i32 {
    let target = mv.to;
    let attacker = board.piece_on(mv.from).unwrap_or(Piece::Pawn);
    let mut occ = board.occupied();

    let mut first_gain = board.piece_on(target).map_or(0, |p| SEE_VALUE[p as usize]);
    if attacker == Piece::Pawn && mv.from.file() != target.file() && board.piece_on(target).is_none() {
        // en passant: the captured pawn sits behind the target square
        first_gain = SEE_VALUE[Piece::Pawn as usize];
        let victim_rank = if board.side_to_move() == Color::White {
            Rank::Fifth
        } else {
            Rank::Fourth
        };
        occ ^= Square::new(target.file(), victim_rank).bitboard();
    }

    let mut gain = [0i32; 32];
    gain[0] = first_gain;
    let mut occupant_value = SEE_VALUE[attacker as usize];
    let mut from_sq = mv.from;
    let mut side = board.side_to_move();
    let mut depth = 0usize;

    loop {
        occ ^= from_sq.bitboard();
        side = !side;
        let recapturers = attackers_to(board, target, occ) & board.colors(side);
        let Some((sq, piece)) = least_attacker(board, recapturers) else {
            break;
        };
        if depth + 1 >= gain.len() {
            break;
        }
        depth += 1;
        gain[depth] = occupant_value - gain[depth - 1];
        occupant_value = SEE_VALUE[piece as usize];
        from_sq = sq;
    }

    while depth > 0 {
        gain[depth - 1] = -(-gain[depth - 1]).max(gain[depth]);
        depth -= 1;
    }
    gain[0]
}
