//! Per-account write rate limiter using the token bucket algorithm.
//!
//! Each account gets a bucket holding up to `max_writes` tokens that refills at
//! `max_writes` per window. A write consumes one token; an empty bucket means
//! the account has exceeded its allowance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bftb_types::PublicKey;

use crate::ThrottleConfig;

/// Tokens are tracked in thousandths so slow refill rates do not round to zero.
const SCALE: u128 = 1000;

struct Bucket {
    tokens: u128,
    last_refill: Instant,
}

pub struct WriteThrottle {
    max_writes: u64,
    window: Duration,
    buckets: HashMap<PublicKey, Bucket>,
}

impl WriteThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            max_writes: config.max_writes,
            window: config.window(),
            buckets: HashMap::new(),
        }
    }

    fn capacity(&self) -> u128 {
        u128::from(self.max_writes) * SCALE
    }

    /// Try to spend one write for `key` at time `now`.
    ///
    /// Returns `true` if allowed (and consumes the token).
    pub fn try_acquire(&mut self, key: &PublicKey, now: Instant) -> bool {
        let capacity = self.capacity();
        let window_ms = self.window.as_millis().max(1);
        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed_ms = now.saturating_duration_since(bucket.last_refill).as_millis();
        let refill = elapsed_ms * capacity / window_ms;
        if refill > 0 {
            bucket.tokens = (bucket.tokens + refill).min(capacity);
            bucket.last_refill = now;
        }

        if bucket.tokens >= SCALE {
            bucket.tokens -= SCALE;
            true
        } else {
            false
        }
    }

    /// Accounts currently tracked.
    pub fn tracked_accounts(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(max_writes: u64, window_secs: u64) -> WriteThrottle {
        WriteThrottle::new(ThrottleConfig {
            max_writes,
            window_secs,
        })
    }

    #[test]
    fn allows_burst_up_to_limit() {
        let mut t = throttle(10, 4);
        let key = PublicKey([1; 32]);
        let now = Instant::now();
        for _ in 0..10 {
            assert!(t.try_acquire(&key, now));
        }
        assert!(!t.try_acquire(&key, now));
    }

    #[test]
    fn refills_over_the_window() {
        let mut t = throttle(2, 4);
        let key = PublicKey([1; 32]);
        let start = Instant::now();
        assert!(t.try_acquire(&key, start));
        assert!(t.try_acquire(&key, start));
        assert!(!t.try_acquire(&key, start + Duration::from_secs(1)));
        assert!(t.try_acquire(&key, start + Duration::from_secs(2)));
        assert!(t.try_acquire(&key, start + Duration::from_secs(4)));
        assert!(!t.try_acquire(&key, start + Duration::from_secs(4)));
    }

    #[test]
    fn accounts_are_limited_independently() {
        let mut t = throttle(1, 60);
        let now = Instant::now();
        assert!(t.try_acquire(&PublicKey([1; 32]), now));
        assert!(!t.try_acquire(&PublicKey([1; 32]), now));
        assert!(t.try_acquire(&PublicKey([2; 32]), now));
        assert_eq!(t.tracked_accounts(), 2);
    }
}
