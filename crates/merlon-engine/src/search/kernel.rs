//! The alpha-beta kernel: fail-soft negamax with aspiration windows,
//! transposition cutoffs, null-move pruning, razoring, futility and
//! late-move pruning, late-move reductions, and selective extensions.

use cozy_chess::{Board, Move, Piece, Rank, Square};

use crate::eval::evaluate;
use crate::search::ordering::{MoveKind, MovePicker, OrderingHints};
use crate::search::params::{
    DRAW_SCORE, FUT_DEPTH, FUT_MARGIN, HIST_LIMIT, INF, MATE, MAX_EVAL, MAX_PLY, RAZOR_DEPTH,
    RAZOR_MARGIN, SELECTIVE_DEPTH, SNP_DEPTH, lmr_reduction,
};
use crate::search::report;
use crate::search::tt::Bound;
use crate::search::{PvLine, Worker};

/// Null-moving is unsound when the side to move has nothing but pawns left.
fn may_null(board: &Board) -> bool {
    let stm = board.side_to_move();
    let sliders_and_knights =
        board.colors(stm) & !(board.pieces(Piece::Pawn) | board.pieces(Piece::King));
    !sliders_and_knights.is_empty()
}

/// True when no friendly pawn stands one step from promotion.
fn no_promotable_pawn(board: &Board) -> bool {
    let stm = board.side_to_move();
    let seventh = Rank::Seventh.relative_to(stm);
    !board
        .colored_pieces(stm, Piece::Pawn)
        .into_iter()
        .any(|sq| sq.rank() == seventh)
}

impl Worker<'_> {
    /// Aspiration search, progressively widening the window around the
    /// previous iteration's score.
    pub(crate) fn widen(
        &mut self,
        board: &Board,
        depth: i32,
        last_score: i32,
        pv: &mut PvLine,
    ) -> i32 {
        if depth > 6 && last_score.abs() <= MAX_EVAL {
            let mut margin = 8;
            while margin < 500 {
                let alpha = last_score - margin;
                let beta = last_score + margin;
                let val = self.search(board, 0, alpha, beta, depth, false, None, None, pv);
                if self.glob.aborted() {
                    break;
                }
                if val > alpha && val < beta {
                    return val; // finished within the window
                }
                if val.abs() > MAX_EVAL {
                    break; // mate scores need infinite bounds to be proved
                }
                margin *= 2;
            }
        }

        self.search(board, 0, -INF, INF, depth, false, None, None, pv)
    }

    /// Fail-soft negamax; the returned score may lie outside `[alpha, beta]`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search(
        &mut self,
        board: &Board,
        ply: i32,
        mut alpha: i32,
        mut beta: i32,
        depth: i32,
        was_null: bool,
        last_move: Option<Move>,
        last_capt_sq: Option<Square>,
        pv: &mut PvLine,
    ) -> i32 {
        if depth <= 0 {
            return self.quiesce(board, ply, alpha, beta, pv);
        }

        let is_pv = alpha != beta - 1;

        self.glob.count_node();
        self.local_nodes += 1;
        self.slowdown();
        if self.glob.aborted() && self.root_depth > 1 {
            return 0;
        }

        if ply > 0 {
            pv.clear();
            if self.is_draw(board) {
                return DRAW_SCORE;
            }
        }

        // Mate-distance pruning
        if ply > 0 {
            let checkmating = MATE - ply;
            if checkmating < beta {
                beta = checkmating;
                if alpha >= checkmating {
                    return alpha;
                }
            }
            let checkmated = -MATE + ply;
            if checkmated > alpha {
                alpha = checkmated;
                if beta <= checkmated {
                    return beta;
                }
            }
        }

        let hash = board.hash();
        let lookup = self.tt.retrieve(hash, alpha, beta, depth, ply);
        let mut tt_move = lookup.best_move;
        if let Some(score) = lookup.score {
            if score >= beta
                && let Some(mv) = tt_move
            {
                self.credit_cutoff(board, last_move, mv, depth, ply);
            }
            if !is_pv {
                return score;
            }
        }

        if ply >= MAX_PLY - 1 {
            return evaluate(board);
        }

        let fl_check = !board.checkers().is_empty();
        let prunable = !fl_check && !is_pv && alpha > -MAX_EVAL && beta < MAX_EVAL;

        let mut eval = 0;
        if prunable && (!was_null || depth <= SELECTIVE_DEPTH) {
            eval = evaluate(board);
        }

        // Static null move: a big enough standing margin fails high outright
        if prunable && depth <= SNP_DEPTH && !was_null {
            let sc = eval - 120 * depth;
            if sc > beta {
                return sc;
            }
        }

        let mut ref_sq: Option<Square> = None;
        let mut did_null = false;

        'null_move: {
            if depth > 1 && !was_null && prunable && may_null(board) && eval >= beta {
                did_null = true;

                let new_depth = depth - (823 + 67 * depth) / 256 - ((eval - beta) / 200).min(3);

                // Skip the null search when the table already shows a normal
                // search to the same depth staying below beta
                let probe = self.tt.retrieve(hash, alpha, beta, new_depth, ply);
                if let Some(score) = probe.score
                    && score < beta
                {
                    break 'null_move;
                }

                let Some(null_board) = board.null_move() else {
                    break 'null_move;
                };
                let mut null_pv = PvLine::new();
                self.repetitions.push(hash);
                let mut score = if new_depth <= 0 {
                    -self.quiesce(&null_board, ply + 1, -beta, -beta + 1, &mut null_pv)
                } else {
                    -self.search(
                        &null_board,
                        ply + 1,
                        -beta,
                        -beta + 1,
                        new_depth,
                        true,
                        None,
                        None,
                        &mut null_pv,
                    )
                };
                self.repetitions.pop();

                // The piece whose capture refuted the null move is in danger;
                // its escape will be prioritised in the move ordering
                let refutation = self.tt.retrieve(null_board.hash(), alpha, beta, depth, ply);
                if let Some(mv) = refutation.best_move {
                    ref_sq = Some(mv.to);
                }

                if self.glob.aborted() && self.root_depth > 1 {
                    return 0;
                }

                // Never trust an unproved mate from a reduced null search
                if score >= MAX_EVAL {
                    score = beta;
                }

                if score >= beta {
                    if new_depth > 6 {
                        score = self.search(
                            board,
                            ply,
                            alpha,
                            beta,
                            new_depth - 5,
                            true,
                            last_move,
                            last_capt_sq,
                            pv,
                        );
                    }
                    if self.glob.aborted() && self.root_depth > 1 {
                        return 0;
                    }
                    if score >= beta {
                        return score;
                    }
                }
            }
        }

        // Razoring: a hopeless eval drops straight into quiescence
        if prunable
            && tt_move.is_none()
            && !was_null
            && depth <= RAZOR_DEPTH
            && no_promotable_pawn(board)
        {
            let threshold = beta - RAZOR_MARGIN[depth as usize];
            if eval < threshold {
                let mut scratch = PvLine::new();
                let score = self.quiesce(board, ply, alpha, beta, &mut scratch);
                if score < threshold {
                    return score;
                }
            }
        }

        // Internal iterative deepening: buy a hash move for ordering
        if is_pv && !fl_check && tt_move.is_none() && depth > 6 {
            let mut scratch = PvLine::new();
            self.search(board, ply, alpha, beta, depth - 2, false, None, last_capt_sq, &mut scratch);
            tt_move = self.tt.retrieve_move(hash);
        }

        let stm = board.side_to_move();
        let hints = OrderingHints {
            tt_move,
            refutation: self.refutations.get(last_move),
            ref_sq,
        };
        let mut picker = MovePicker::new(board, hints, &self.killers, &self.history, ply);

        let mut best = -INF;
        let mut raised_alpha = false;
        let mut fl_futility = false;
        let mut mv_tried = 0;
        let mut quiet_tried = 0;
        let mut tried_quiets: Vec<(Move, Piece)> = Vec::new();
        let mut new_pv = PvLine::new();

        while let Some((mv, kind)) = picker.next() {
            // Arm futility before the first quiet move is tried
            if kind == MoveKind::Normal
                && quiet_tried == 0
                && prunable
                && depth <= FUT_DEPTH
                && eval + FUT_MARGIN[depth as usize] < beta
            {
                fl_futility = true;
            }

            let piece = board.piece_on(mv.from).unwrap_or(Piece::Pawn);
            let mv_hist = self.history.score(stm, piece, mv.to);
            let last_capt = (board.color_on(mv.to) == Some(!stm)).then_some(mv.to);

            let mut child = board.clone();
            child.play_unchecked(mv);

            mv_tried += 1;
            if ply == 0 && mv_tried > 1 {
                self.root_choice = true;
            }
            if kind == MoveKind::Normal {
                quiet_tried += 1;
                tried_quiets.push((mv, piece));
            }
            if ply == 0 && !self.silent && depth > 16 && self.thread_id == 0 {
                report::display_currmove(board, mv, mv_tried);
            }

            let gives_check = !child.checkers().is_empty();
            let mut new_depth = depth - 1;

            // Check extension, in pv nodes or at low depth
            if (is_pv || depth < 8) && gives_check {
                new_depth += 1;
            }
            // Recapture extension in pv nodes
            if is_pv && Some(mv.to) == last_capt_sq {
                new_depth += 1;
            }
            // Pawn reaching the brink of promotion, near the pv tips
            if is_pv
                && depth < 6
                && piece == Piece::Pawn
                && (mv.to.rank() == Rank::Second || mv.to.rank() == Rank::Seventh)
            {
                new_depth += 1;
            }

            // Futility pruning
            if fl_futility
                && !gives_check
                && mv_hist < HIST_LIMIT
                && kind == MoveKind::Normal
                && mv_tried > 1
            {
                continue;
            }

            // Late-move pruning
            if prunable
                && depth <= 3
                && quiet_tried > 3 * depth
                && !gives_check
                && mv_hist < HIST_LIMIT
                && kind == MoveKind::Normal
            {
                continue;
            }

            // After a failed null attempt, a quiescence probe that still
            // clears beta licenses one extra ply of reduction
            let mut sherwin_flag = false;
            if did_null && depth > 2 && !gives_check {
                let q_score = self.quiesce(&child, ply, -beta, -beta + 1, &mut new_pv);
                if q_score >= beta {
                    sherwin_flag = true;
                }
            }

            // Late-move reduction of quiet moves
            let mut reduction = 0;
            if depth > 2
                && mv_tried > 3
                && !fl_check
                && !gives_check
                && kind == MoveKind::Normal
                && mv_hist < HIST_LIMIT
            {
                reduction = lmr_reduction(is_pv, depth, mv_tried);
                if reduction > 0 {
                    if sherwin_flag && new_depth - reduction >= 2 {
                        reduction += 1;
                    }
                    if mv_hist < 0 && new_depth - reduction >= 2 {
                        reduction += 1;
                    }
                    new_depth -= reduction;
                }
            }

            // Marginal reduction of late bad captures
            if depth > 2
                && mv_tried > 6
                && alpha > -MAX_EVAL
                && beta < MAX_EVAL
                && !fl_check
                && !gives_check
                && kind == MoveKind::BadCapture
                && !is_pv
            {
                reduction = 1;
                new_depth -= 1;
            }

            // Principal-variation search, re-entered once with the original
            // depth if a reduced move comes back above alpha
            let mut score;
            loop {
                self.repetitions.push(hash);
                if best == -INF {
                    score = -self.search(
                        &child, ply + 1, -beta, -alpha, new_depth, false, Some(mv), last_capt,
                        &mut new_pv,
                    );
                } else {
                    score = -self.search(
                        &child, ply + 1, -alpha - 1, -alpha, new_depth, false, Some(mv), last_capt,
                        &mut new_pv,
                    );
                    if !self.glob.aborted() && score > alpha && score < beta {
                        score = -self.search(
                            &child, ply + 1, -beta, -alpha, new_depth, false, Some(mv), last_capt,
                            &mut new_pv,
                        );
                    }
                }
                self.repetitions.pop();

                if score > alpha && reduction > 0 {
                    new_depth += reduction;
                    reduction = 0;
                    continue;
                }
                break;
            }

            if self.glob.aborted() && self.root_depth > 1 {
                return 0;
            }

            if score >= beta {
                if !fl_check {
                    self.credit_cutoff(board, last_move, mv, depth, ply);
                    for &(quiet, quiet_piece) in &tried_quiets {
                        if quiet != mv {
                            self.history.cut(stm, quiet_piece, quiet.to, depth);
                        }
                    }
                }
                self.tt.store(hash, Some(mv), score, Bound::Lower, depth, ply);
                if ply == 0 {
                    pv.load(mv, &new_pv);
                    self.publish_root(score, pv);
                }
                return score;
            }

            if score > best {
                best = score;
                if score > alpha {
                    alpha = score;
                    raised_alpha = true;
                    pv.load(mv, &new_pv);
                    if ply == 0 {
                        self.publish_root(score, pv);
                    }
                }
            }
        }

        // Checkmate or stalemate
        if best == -INF {
            return if fl_check { -MATE + ply } else { DRAW_SCORE };
        }

        if raised_alpha
            && let Some(head) = pv.first()
        {
            if !fl_check {
                self.credit_cutoff(board, last_move, head, depth, ply);
                for &(quiet, quiet_piece) in &tried_quiets {
                    if quiet != head {
                        self.history.cut(stm, quiet_piece, quiet.to, depth);
                    }
                }
            }
            self.tt.store(hash, Some(head), best, Bound::Exact, depth, ply);
        } else {
            self.tt.store(hash, None, best, Bound::Upper, depth, ply);
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    use crate::search::control::{Coordinator, SearchLimits};
    use crate::search::tt::TransTable;
    use crate::search::RootLine;

    struct Harness {
        tt: TransTable,
        glob: Coordinator,
        limits: SearchLimits,
        line: Mutex<RootLine>,
    }

    impl Harness {
        fn new(depth: i32) -> Self {
            Self {
                tt: TransTable::new(1),
                glob: Coordinator::new(),
                limits: SearchLimits::depth_only(depth),
                line: Mutex::new(RootLine::default()),
            }
        }

        fn worker(&self) -> Worker<'_> {
            Worker::new(0, &self.tt, &self.glob, &self.limits, &self.line, true, Instant::now())
        }
    }

    #[test]
    fn may_null_needs_a_piece() {
        let kp_only: Board = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1".parse().unwrap();
        assert!(!may_null(&kp_only));
        let with_rook: Board = "4k3/8/8/8/8/8/8/R3K3 w - - 0 1".parse().unwrap();
        assert!(may_null(&with_rook));
    }

    #[test]
    fn promotable_pawn_is_detected_for_both_sides() {
        let white_seventh: Board = "4k3/P7/8/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
        assert!(!no_promotable_pawn(&white_seventh));
        let black_second: Board = "4k3/8/8/8/8/8/p7/3K4 b - - 0 1".parse().unwrap();
        assert!(!no_promotable_pawn(&black_second));
        let quiet: Board = "4k3/8/8/4p3/8/8/4P3/4K3 w - - 0 1".parse().unwrap();
        assert!(no_promotable_pawn(&quiet));
    }

    #[test]
    fn depth_zero_delegates_to_quiescence() {
        // A noisy position: depth 0 must return the quiescence value, not
        // recurse into the main search
        let board: Board = "4k3/8/8/4p3/3Q4/8/8/4K3 w - - 0 1".parse().unwrap();
        let harness = Harness::new(1);
        let mut worker = harness.worker();
        let mut pv = PvLine::new();
        let direct = worker.search(&board, 1, -INF, INF, 0, false, None, None, &mut pv);
        let mut pv2 = PvLine::new();
        let quiesced = worker.quiesce(&board, 1, -INF, INF, &mut pv2);
        assert_eq!(direct, quiesced);
    }

    #[test]
    fn ply_ceiling_returns_static_eval() {
        let board = Board::default();
        let harness = Harness::new(1);
        let mut worker = harness.worker();
        let mut pv = PvLine::new();
        let score = worker.search(&board, MAX_PLY - 1, -INF, INF, 5, false, None, None, &mut pv);
        assert_eq!(score, evaluate(&board));
    }

    #[test]
    fn mate_distance_pruning_bounds_the_window() {
        // With alpha already at mate-in-2, a node at ply 4 cannot do better;
        // the kernel must return alpha without searching.
        let board = Board::default();
        let harness = Harness::new(1);
        let mut worker = harness.worker();
        let mut pv = PvLine::new();
        let alpha = MATE - 2;
        let score = worker.search(&board, 4, alpha, alpha + 1, 3, false, None, None, &mut pv);
        assert_eq!(score, alpha);
    }

    #[test]
    fn mated_bound_returns_beta() {
        let board = Board::default();
        let harness = Harness::new(1);
        let mut worker = harness.worker();
        let mut pv = PvLine::new();
        // beta below the worst possible score at this ply
        let beta = -MATE + 2;
        let score = worker.search(&board, 4, beta - 1, beta, 3, false, None, None, &mut pv);
        assert_eq!(score, beta);
    }

    #[test]
    fn draw_by_repetition_scores_zero_at_interior_node() {
        let board = Board::default();
        let harness = Harness::new(1);
        let mut worker = harness.worker();
        worker.repetitions.push(board.hash());
        let mut pv = PvLine::new();
        let score = worker.search(&board, 2, -INF, INF, 4, false, None, None, &mut pv);
        assert_eq!(score, DRAW_SCORE);
    }

    #[test]
    fn widen_falls_through_to_full_window_at_low_depth() {
        // Below depth 7 the aspiration loop must not run at all
        let board = Board::default();
        let harness = Harness::new(4);
        let mut worker = harness.worker();
        let mut pv = PvLine::new();
        let narrow = worker.widen(&board, 4, 10_000, &mut pv);
        assert!(narrow.abs() < 1000, "full-window result expected, got {narrow}");
    }

    #[test]
    fn widen_with_mate_range_score_uses_the_infinite_window() {
        // A mate-range previous score skips the aspiration loop entirely,
        // so the result must match a plain full-window search exactly.
        let board: Board = "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3"
            .parse()
            .unwrap();
        let first = Harness::new(7);
        let mut worker = first.worker();
        let mut pv = PvLine::new();
        worker.root_depth = 7;
        let aspirated = worker.widen(&board, 7, MATE - 5, &mut pv);

        let second = Harness::new(7);
        let mut plain = second.worker();
        let mut pv2 = PvLine::new();
        plain.root_depth = 7;
        let full = plain.search(&board, 0, -INF, INF, 7, false, None, None, &mut pv2);

        assert_eq!(aspirated, full);
        assert_eq!(pv.moves(), pv2.moves());
    }

    #[test]
    fn exact_entries_respect_their_bound() {
        // After a search, every exact TT hit probed with an infinite window
        // must carry a score inside the mate bounds
        let board = Board::default();
        let harness = Harness::new(5);
        let mut worker = harness.worker();
        let mut pv = PvLine::new();
        let score = worker.search(&board, 0, -INF, INF, 5, false, None, None, &mut pv);
        assert!(score.abs() < MAX_EVAL);
        let hit = harness.tt.retrieve(board.hash(), -INF, INF, 5, 0);
        assert_eq!(hit.score, Some(score), "root entry should be exact at depth 5");
    }

    #[test]
    fn null_move_keeps_mate_detection_sound() {
        // Null-move pruning must not break a simple mate-in-one
        let board: Board = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4"
            .parse()
            .unwrap();
        let harness = Harness::new(4);
        let mut worker = harness.worker();
        let mut pv = PvLine::new();
        let score = worker.search(&board, 0, -INF, INF, 4, false, None, None, &mut pv);
        assert_eq!(score, MATE - 1);
        assert_eq!(pv.moves()[0].to_string(), "h5f7");
    }

    #[test]
    fn kernel_frames_leave_repetition_stack_balanced() {
        let board = Board::default();
        let harness = Harness::new(4);
        let mut worker = harness.worker();
        worker.repetitions.push(0x1234);
        let mut pv = PvLine::new();
        worker.search(&board, 0, -INF, INF, 4, false, None, None, &mut pv);
        assert_eq!(worker.repetitions.len(), 1, "push/pop must pair on every exit path");
    }
}
