//! Turn UCI clock parameters into a per-move time budget.

use std::time::Duration;

use cozy_chess::Color;

use crate::search::control::SearchLimits;
use crate::search::params::MAX_PLY;

/// Milliseconds reserved for I/O latency per move.
const MOVE_OVERHEAD_MS: u64 = 10;

/// Allocate a single hard budget for the move from the remaining clock.
///
/// A thirtieth of the remaining time plus most of the increment, never more
/// than half the clock. With only scraps left, play instantly.
pub fn budget_from_clock(
    remaining: Duration,
    increment: Duration,
    moves_to_go: Option<u32>,
) -> Duration {
    let remaining_ms = remaining.as_millis() as u64;
    if remaining_ms <= MOVE_OVERHEAD_MS * 2 {
        return Duration::from_millis(1);
    }

    let usable = remaining_ms - MOVE_OVERHEAD_MS;
    let mtg = moves_to_go.unwrap_or(30).max(1) as u64;
    let base = usable / mtg + increment.as_millis() as u64 * 3 / 4;

    Duration::from_millis(base.min(usable / 2).max(1))
}

/// Build [`SearchLimits`] from the parameters of a UCI `go` command.
#[allow(clippy::too_many_arguments)]
pub fn limits_from_go(
    wtime: Option<Duration>,
    btime: Option<Duration>,
    winc: Option<Duration>,
    binc: Option<Duration>,
    movestogo: Option<u32>,
    depth: Option<i32>,
    movetime: Option<Duration>,
    nodes: Option<u64>,
    infinite: bool,
    side: Color,
) -> SearchLimits {
    let mut limits = SearchLimits {
        depth: depth.unwrap_or(MAX_PLY - 1).clamp(1, MAX_PLY - 1),
        max_nodes: nodes,
        ..SearchLimits::default()
    };

    if infinite {
        return limits;
    }
    if let Some(mt) = movetime {
        limits.move_time = Some(mt);
        return limits;
    }

    let (remaining, increment) = match side {
        Color::White => (wtime, winc),
        Color::Black => (btime, binc),
    };
    if let Some(remaining) = remaining {
        let increment = increment.unwrap_or(Duration::ZERO);
        limits.move_time = Some(budget_from_clock(remaining, increment, movestogo));
    }

    limits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_minute_clock_gets_a_sane_slice() {
        let budget = budget_from_clock(Duration::from_secs(300), Duration::ZERO, None);
        assert!(budget.as_millis() > 5_000, "budget={budget:?}");
        assert!(budget.as_millis() < 15_000, "budget={budget:?}");
    }

    #[test]
    fn increment_extends_the_budget() {
        let plain = budget_from_clock(Duration::from_secs(60), Duration::ZERO, None);
        let inc = budget_from_clock(Duration::from_secs(60), Duration::from_secs(2), None);
        assert!(inc > plain);
    }

    #[test]
    fn budget_never_exceeds_half_the_clock() {
        let budget = budget_from_clock(Duration::from_millis(400), Duration::from_secs(10), None);
        assert!(budget.as_millis() <= 200);
    }

    #[test]
    fn scraps_of_time_move_instantly() {
        let budget = budget_from_clock(Duration::from_millis(15), Duration::ZERO, None);
        assert_eq!(budget, Duration::from_millis(1));
    }

    #[test]
    fn movestogo_divides_the_clock() {
        let few = budget_from_clock(Duration::from_secs(60), Duration::ZERO, Some(5));
        let many = budget_from_clock(Duration::from_secs(60), Duration::ZERO, Some(40));
        assert!(few > many);
    }

    #[test]
    fn infinite_go_has_no_deadline() {
        let limits = limits_from_go(
            Some(Duration::from_secs(1)),
            None,
            None,
            None,
            None,
            None,
            None,
            None,
            true,
            Color::White,
        );
        assert!(limits.move_time.is_none());
    }

    #[test]
    fn movetime_is_used_verbatim() {
        let limits = limits_from_go(
            None,
            None,
            None,
            None,
            None,
            None,
            Some(Duration::from_secs(5)),
            None,
            false,
            Color::White,
        );
        assert_eq!(limits.move_time, Some(Duration::from_secs(5)));
    }

    #[test]
    fn side_to_move_selects_the_clock() {
        let limits = limits_from_go(
            Some(Duration::from_secs(600)),
            Some(Duration::from_secs(6)),
            None,
            None,
            None,
            None,
            None,
            None,
            false,
            Color::Black,
        );
        // Black has six seconds, so the budget must be well under a second
        assert!(limits.move_time.unwrap().as_millis() < 1_000);
    }

    #[test]
    fn depth_only_leaves_the_clock_alone() {
        let limits = limits_from_go(
            None, None, None, None, None,
            Some(9), None, None, false, Color::White,
        );
        assert_eq!(limits.depth, 9);
        assert!(limits.move_time.is_none());
    }

    #[test]
    fn node_budget_is_forwarded() {
        let limits = limits_from_go(
            None, None, None, None, None,
            None, None, Some(50_000), false, Color::White,
        );
        assert_eq!(limits.max_nodes, Some(50_000));
    }
}
