//! Eviction Strategy
//!
//! Bounds how many stale registrations a sweep may expire, so an
//! unreachable network doesn't get mistaken for a mass die-off. See
//! spec.md §4.B for the derivation ("self-preservation").

/// How many entries a sweep is allowed to evict.
///
/// `allowed_drop_ratio` is the configured tolerance as a fraction in
/// `[0, 1]`; `expected` and `actual` are registration counts (`expected`
/// typically a moving average of recent counts, `actual` the live count).
///
/// Truncation toward zero throughout is intentional — all three inputs and
/// the result are treated as integers.
pub fn allowed_to_evict(expected: i64, actual: i64, allowed_drop_ratio: f64) -> i64 {
    let max_allowed = (allowed_drop_ratio * expected as f64).floor() as i64;
    let current_deficit = expected - actual;
    let delta = max_allowed - current_deficit;
    delta.max(0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lenient_scenario() {
        assert_eq!(allowed_to_evict(100, 90, 0.20), 10);
    }

    #[test]
    fn paused_scenario() {
        assert_eq!(allowed_to_evict(100, 70, 0.20), 0);
    }

    #[test]
    fn eviction_law_holds_for_grid() {
        for expected in [0i64, 1, 5, 50, 100, 1000] {
            for actual in 0..=expected {
                for pct in 0..=100 {
                    let ratio = pct as f64 / 100.0;
                    let allowed = allowed_to_evict(expected, actual, ratio);
                    assert!(allowed >= 0);
                    let max_allowed = (ratio * expected as f64).floor() as i64;
                    assert!((expected - actual) + allowed <= max_allowed);
                }
            }
        }
    }

    #[test]
    fn full_actual_allows_full_tolerance() {
        // actual == expected: no deficit, so the full tolerated fraction
        // may be evicted this sweep.
        assert_eq!(allowed_to_evict(100, 100, 0.20), 20);
    }
}
