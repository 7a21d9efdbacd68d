//! Quiescence search: resolve captures and check sequences before letting
//! the static evaluation speak.

use cozy_chess::Board;

use crate::eval::evaluate;
use crate::search::ordering::MovePicker;
use crate::search::params::{DRAW_SCORE, INF, MATE, MAX_PLY};
use crate::search::{PvLine, Worker};

impl Worker<'_> {
    /// Fail-soft quiescence. Out of check only non-losing captures and
    /// promotions are tried; in check every evasion is searched, which is
    /// what lets shallow mates surface through the horizon.
    pub(crate) fn quiesce(
        &mut self,
        board: &Board,
        ply: i32,
        mut alpha: i32,
        beta: i32,
        pv: &mut PvLine,
    ) -> i32 {
        self.glob.count_node();
        self.local_nodes += 1;
        self.slowdown();
        if self.glob.aborted() && self.root_depth > 1 {
            return 0;
        }

        pv.clear();
        if ply > 0 && self.is_draw(board) {
            return DRAW_SCORE;
        }
        if ply >= MAX_PLY - 1 {
            return evaluate(board);
        }

        let in_check = !board.checkers().is_empty();

        let mut best;
        if in_check {
            best = -INF;
        } else {
            // Stand pat: the side to move may decline every capture
            best = evaluate(board);
            if best >= beta {
                return best;
            }
            if best > alpha {
                alpha = best;
            }
        }

        let mut picker = if in_check {
            MovePicker::evasions(board)
        } else {
            MovePicker::quiescence(board)
        };

        let mut new_pv = PvLine::new();
        let mut any_move = false;

        while let Some((mv, _)) = picker.next() {
            let mut child = board.clone();
            child.play_unchecked(mv);
            any_move = true;

            self.repetitions.push(board.hash());
            let score = -self.quiesce(&child, ply + 1, -beta, -alpha, &mut new_pv);
            self.repetitions.pop();

            if self.glob.aborted() && self.root_depth > 1 {
                return 0;
            }

            if score >= beta {
                return score;
            }
            if score > best {
                best = score;
                if score > alpha {
                    alpha = score;
                    pv.load(mv, &new_pv);
                }
            }
        }

        if in_check && !any_move {
            return -MATE + ply;
        }

        best
    }
}
