// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-client token-bucket admission control.
//!
//! Buckets refill lazily at request time; refill-then-consume happens under
//! one lock so a burst of concurrent requests cannot over-admit. The
//! identity table is capped — when full, the identities seen longest ago
//! are evicted.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Admitted,
    /// Denied; `retry_after` is the wait until one token is available.
    Limited { retry_after: Duration },
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter keyed by client identity.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    capacity: f64,
    refill_per_sec: f64,
    max_clients: usize,
}

impl RateLimiter {
    /// `capacity` is the burst size, `refill_per_sec` the sustained rate,
    /// `max_clients` the cap on tracked identities.
    pub fn new(capacity: u32, refill_per_sec: f64, max_clients: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity: f64::from(capacity.max(1)),
            refill_per_sec: refill_per_sec.max(f64::MIN_POSITIVE),
            max_clients: max_clients.max(1),
        }
    }

    /// Refill the client's bucket for the elapsed time, then try to consume
    /// one token.
    pub fn check(&self, client: &str) -> Decision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        if !buckets.contains_key(client) && buckets.len() >= self.max_clients {
            evict_oldest(&mut buckets, self.max_clients);
        }

        let bucket = buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Decision::Admitted
        } else {
            let deficit = 1.0 - bucket.tokens;
            Decision::Limited {
                retry_after: Duration::from_secs_f64(deficit / self.refill_per_sec),
            }
        }
    }

    /// Number of tracked client identities.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Drop the least-recently-refilled identities until one slot is free.
fn evict_oldest(buckets: &mut HashMap<String, Bucket>, max_clients: usize) {
    let excess = buckets.len() + 1 - max_clients;
    let mut by_age: Vec<(String, Instant)> = buckets
        .iter()
        .map(|(k, b)| (k.clone(), b.last_refill))
        .collect();
    by_age.sort_by_key(|(_, t)| *t);
    for (key, _) in by_age.into_iter().take(excess) {
        buckets.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_limited() {
        let limiter = RateLimiter::new(3, 1.0, 16);
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        assert!(matches!(limiter.check("c1"), Decision::Limited { .. }));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, 0.001, 16);
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        assert!(matches!(limiter.check("c1"), Decision::Limited { .. }));
        assert_eq!(limiter.check("c2"), Decision::Admitted);
    }

    #[test]
    fn test_recovery_after_refill_interval() {
        // 50 tokens/sec: one token back within ~20ms.
        let limiter = RateLimiter::new(1, 50.0, 16);
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        assert!(matches!(limiter.check("c1"), Decision::Limited { .. }));
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(limiter.check("c1"), Decision::Admitted);
    }

    #[test]
    fn test_retry_after_is_positive_and_bounded() {
        let limiter = RateLimiter::new(1, 2.0, 16);
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        match limiter.check("c1") {
            Decision::Limited { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                // One token at 2/sec takes at most half a second.
                assert!(retry_after <= Duration::from_millis(600));
            }
            Decision::Admitted => panic!("expected limited"),
        }
    }

    #[test]
    fn test_refill_caps_at_capacity() {
        let limiter = RateLimiter::new(2, 1000.0, 16);
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        std::thread::sleep(Duration::from_millis(20));
        // Long idle cannot bank more than `capacity` tokens.
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        assert_eq!(limiter.check("c1"), Decision::Admitted);
        assert!(matches!(limiter.check("c1"), Decision::Limited { .. }));
    }

    #[test]
    fn test_identity_table_bounded() {
        let limiter = RateLimiter::new(1, 1.0, 4);
        for i in 0..20 {
            limiter.check(&format!("client-{i}"));
        }
        assert!(limiter.tracked_clients() <= 4);
        // The most recent identity is still tracked.
        assert!(matches!(
            limiter.check("client-19"),
            Decision::Limited { .. }
        ));
    }
}
