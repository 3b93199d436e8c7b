//! Token bucket implementation.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Rate and burst parameters for a token bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    /// Tokens added per second
    pub rate: f64,
    /// Maximum number of tokens the bucket holds
    pub capacity: f64,
}

impl Quota {
    /// A quota of `rps` requests per second with a burst of the same size.
    pub fn per_second(rps: u32) -> Self {
        Self {
            rate: rps as f64,
            capacity: rps as f64,
        }
    }

    /// Time needed to replenish a single token.
    ///
    /// Rounded up to the next nanosecond so that waiting this long always
    /// yields at least one whole token.
    pub fn replenish_interval(&self) -> Duration {
        if self.rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_nanos((1e9 / self.rate).ceil() as u64)
    }
}

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// A token bucket rate limiter for a single caller.
///
/// The bucket starts full. Replenishment is computed lazily from the time
/// elapsed since the last update, so no background task is needed. The
/// state sits behind its own lock, independent of whatever registry holds
/// the bucket.
pub struct TokenBucket {
    quota: Quota,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(quota: Quota) -> Self {
        Self::new_at(quota, Instant::now())
    }

    /// Create a full bucket whose clock starts at `now`.
    pub fn new_at(quota: Quota, now: Instant) -> Self {
        Self {
            quota,
            state: Mutex::new(BucketState {
                tokens: quota.capacity,
                last_update: now,
            }),
        }
    }

    /// Take one token if available.
    ///
    /// Returns `true` if a token was consumed, `false` if the bucket is empty.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Same as [`allow`](Self::allow), evaluated at `now`.
    pub fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state, now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        // An earlier `now` than the last update counts as no elapsed time.
        let elapsed = now.saturating_duration_since(state.last_update);
        if elapsed.is_zero() {
            return;
        }

        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.quota.rate).min(self.quota.capacity);
        state.last_update = now;
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenBucket")
            .field("quota", &self.quota)
            .field("tokens", &state.tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_at(bucket: &TokenBucket, now: Instant) -> f64 {
        let mut state = bucket.state.lock();
        bucket.refill(&mut state, now);
        state.tokens
    }

    #[test]
    fn test_quota_per_second() {
        let quota = Quota::per_second(5);
        assert_eq!(quota.rate, 5.0);
        assert_eq!(quota.capacity, 5.0);
        assert_eq!(quota.replenish_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(Quota::per_second(10));
        assert_eq!(tokens_at(&bucket, Instant::now()), 10.0);
    }

    #[test]
    fn test_burst_then_reject() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(Quota::per_second(5), start);

        for _ in 0..5 {
            assert!(bucket.allow_at(start));
        }

        // The 6th request in the same instant should be rejected
        assert!(!bucket.allow_at(start));
        assert_eq!(tokens_at(&bucket, start), 0.0);
    }

    #[test]
    fn test_single_token_replenished() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(Quota::per_second(4), start);

        for _ in 0..4 {
            assert!(bucket.allow_at(start));
        }
        assert!(!bucket.allow_at(start));

        let later = start + Duration::from_millis(250);
        assert!(bucket.allow_at(later));
        assert!(!bucket.allow_at(later));
    }

    #[test]
    fn test_replenish_interval_yields_one_token() {
        for rps in [1, 3, 4, 5, 6, 7, 9, 11, 13, 1000] {
            let quota = Quota::per_second(rps);
            let start = Instant::now();
            let bucket = TokenBucket::new_at(quota, start);

            for _ in 0..rps {
                assert!(bucket.allow_at(start));
            }
            assert!(!bucket.allow_at(start), "rps={} burst exceeded", rps);

            let later = start + quota.replenish_interval();
            assert!(bucket.allow_at(later), "rps={} no token after interval", rps);
            assert!(!bucket.allow_at(later), "rps={} more than one token", rps);
        }
    }

    #[test]
    fn test_full_second_refills_to_capacity() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(Quota::per_second(5), start);

        for _ in 0..5 {
            assert!(bucket.allow_at(start));
        }

        let later = start + Duration::from_secs(1);
        for _ in 0..5 {
            assert!(bucket.allow_at(later));
        }
        assert!(!bucket.allow_at(later));
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(Quota::per_second(3), start);

        assert!(bucket.allow_at(start));
        assert_eq!(tokens_at(&bucket, start + Duration::from_secs(60)), 3.0);
    }

    #[test]
    fn test_clock_going_backwards() {
        let start = Instant::now() + Duration::from_secs(5);
        let bucket = TokenBucket::new_at(Quota::per_second(2), start);

        assert!(bucket.allow_at(start));
        assert!(bucket.allow_at(start));

        // Never negative and never refilled by an earlier timestamp
        let earlier = start - Duration::from_secs(1);
        assert!(!bucket.allow_at(earlier));
        assert_eq!(tokens_at(&bucket, earlier), 0.0);
    }

    #[test]
    fn test_partial_tokens_accumulate() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(Quota::per_second(4), start);

        for _ in 0..4 {
            assert!(bucket.allow_at(start));
        }

        // Half a token is not enough to admit a request
        assert!(!bucket.allow_at(start + Duration::from_millis(125)));
        assert!(bucket.allow_at(start + Duration::from_millis(250)));
    }
}
