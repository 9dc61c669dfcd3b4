//! Token bucket implementation.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A token bucket guarding a single client.
///
/// Refills continuously at `rate` tokens per second up to `burst` tokens.
/// Every admitted unit of work consumes one token. The mutable state sits
/// behind the bucket's own lock, so checks on different buckets never
/// contend with each other or with the registry.
#[derive(Debug)]
pub struct TokenBucket {
    /// Tokens added per second
    rate: f64,
    /// Maximum token count
    burst: u32,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant, rate: f64, burst: u32) {
        // An instant older than the last refill adds nothing and never moves the clock back.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst as f64);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self::new_at(rate, burst, Instant::now())
    }

    /// Create a full bucket whose refill clock starts at `now`.
    pub fn new_at(rate: f64, burst: u32, now: Instant) -> Self {
        debug_assert!(rate > 0.0, "token bucket rate must be positive");
        debug_assert!(burst > 0, "token bucket burst must be positive");
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: now,
            }),
        }
    }

    /// Try to take one token right now.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Try to take one token at `now`.
    ///
    /// Refill and consumption happen under one lock acquisition. A rejected
    /// call keeps the refill it just applied.
    pub fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        state.refill(now, self.rate, self.burst);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after refilling up to now.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        state.refill(Instant::now(), self.rate, self.burst);
        state.tokens
    }

    /// How long until the next token becomes available.
    pub fn retry_after(&self) -> Duration {
        let mut state = self.state.lock();
        state.refill(Instant::now(), self.rate, self.burst);

        if state.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
        }
    }

    /// Refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }
}
