//! Rate Limiting
//!
//! A lock-free token bucket, plus the [`Gate`](gate::Gate) that consults it
//! on behalf of the registry's read endpoints.
//!
//! ## Implementation notes
//!
//! Unlike river's own rate limiter (an LRU cache of [`leaky_bucket`][lb]
//! instances keyed by client/URI, built for a proxy fronting many distinct
//! keys), this bucket is the exact two-atomic CAS design the registry uses:
//! one bucket per (caller-chosen) dimension, no cache, no async waiting. A
//! request either gets a token now or it doesn't; there is no queueing.
//!
//! [lb]: https://docs.rs/leaky-bucket

use std::sync::atomic::{AtomicI64, Ordering};

pub mod gate;

/// The unit `averageRate` is expressed in, fixed when a [`TokenBucket`] is
/// constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Seconds,
    Minutes,
}

impl RateUnit {
    fn millis_per_unit(self) -> i64 {
        match self {
            RateUnit::Seconds => 1_000,
            RateUnit::Minutes => 60_000,
        }
    }
}

/// A lock-free token bucket.
///
/// `consumed` and `last_refill_at` are the only two atoms of state; both
/// `burstSize` and `averageRate` are supplied per call rather than stored,
/// so the same bucket can be reused across callers that agree on an
/// (evolving) rate.
#[derive(Debug)]
pub struct TokenBucket {
    consumed: AtomicI64,
    last_refill_at: AtomicI64,
    unit: RateUnit,
}

impl TokenBucket {
    pub fn new(unit: RateUnit) -> Self {
        Self {
            consumed: AtomicI64::new(0),
            last_refill_at: AtomicI64::new(0),
            unit,
        }
    }

    /// Attempt to claim one token. `now_millis` is a monotonic millisecond
    /// clock, left to the caller so tests can drive it directly.
    ///
    /// If either `burst_size` or `average_rate` is `<= 0`, the call always
    /// admits (treated as "rate limiting disabled for this dimension").
    pub fn acquire(&self, burst_size: i64, average_rate: i64, now_millis: i64) -> bool {
        if burst_size <= 0 || average_rate <= 0 {
            return true;
        }
        self.refill(burst_size, average_rate, now_millis);
        self.consume(burst_size)
    }

    fn refill(&self, burst_size: i64, average_rate: i64, now_millis: i64) {
        let last_refill_at = self.last_refill_at.load(Ordering::Acquire);
        let ms_per_unit = self.unit.millis_per_unit();
        let new_tokens = (now_millis - last_refill_at) * average_rate / ms_per_unit;
        if new_tokens <= 0 {
            return;
        }

        let new_refill_at = if last_refill_at == 0 {
            now_millis
        } else {
            last_refill_at + new_tokens * ms_per_unit / average_rate
        };

        // Only the CAS winner replenishes. Losers proceed to `consume` using
        // whatever `consumed` they observe; the elapsed quantum is claimed
        // exactly once. See DESIGN.md for the rationale.
        let won = self
            .last_refill_at
            .compare_exchange(
                last_refill_at,
                new_refill_at,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !won {
            return;
        }

        loop {
            let cur = self.consumed.load(Ordering::Acquire);
            let adjusted = cur.min(burst_size);
            let next = (adjusted - new_tokens).max(0);
            if self
                .consumed
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                tracing::trace!(new_tokens, next, "rate limiter refilled");
                break;
            }
        }
    }

    fn consume(&self, burst_size: i64) -> bool {
        loop {
            let cur = self.consumed.load(Ordering::Acquire);
            if cur >= burst_size {
                return false;
            }
            if self
                .consumed
                .compare_exchange_weak(cur, cur + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Zero both atoms.
    pub fn reset(&self) {
        self.consumed.store(0, Ordering::Release);
        self.last_refill_at.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disabled_when_non_positive() {
        let bucket = TokenBucket::new(RateUnit::Seconds);
        assert!(bucket.acquire(0, 10, 0));
        assert!(bucket.acquire(10, 0, 0));
        assert!(bucket.acquire(-1, 10, 0));
    }

    #[test]
    fn bucket_quantum_scenario() {
        // Burst 10, rate 10/s, unit SECONDS: 10 calls admit at t=0, the
        // 11th is declined, and one call at t=1000 succeeds again.
        let bucket = TokenBucket::new(RateUnit::Seconds);
        for _ in 0..10 {
            assert!(bucket.acquire(10, 10, 0));
        }
        assert!(!bucket.acquire(10, 10, 0));
        assert!(bucket.acquire(10, 10, 1000));
    }

    #[test]
    fn idle_recovers_full_burst() {
        // Bucket monotonicity: under no load, after >= B/R seconds idle,
        // the next B calls all succeed immediately.
        let bucket = TokenBucket::new(RateUnit::Seconds);
        for _ in 0..5 {
            assert!(bucket.acquire(5, 5, 0));
        }
        assert!(!bucket.acquire(5, 5, 0));
        // B/R = 1 second idle
        for _ in 0..5 {
            assert!(bucket.acquire(5, 5, 1_000));
        }
    }

    #[test]
    fn reset_clears_state() {
        let bucket = TokenBucket::new(RateUnit::Seconds);
        for _ in 0..3 {
            assert!(bucket.acquire(3, 3, 0));
        }
        assert!(!bucket.acquire(3, 3, 0));
        bucket.reset();
        assert!(bucket.acquire(3, 3, 0));
    }

    #[test]
    fn ceiling_over_window() {
        // Bucket ceiling: successes over any window <= B + R * window_secs.
        let bucket = TokenBucket::new(RateUnit::Seconds);
        let burst = 4i64;
        let rate = 2i64;
        let mut successes = 0;
        for t in 0..20_000 {
            if bucket.acquire(burst, rate, t) {
                successes += 1;
            }
        }
        let window_secs = 20.0;
        let allowed = burst as f64 + rate as f64 * window_secs;
        assert!(successes as f64 <= allowed + 1.0);
    }
}
