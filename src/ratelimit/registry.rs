//! Per-client bucket registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::bucket::TokenBucket;
use crate::config::RateLimitingConfig;

/// A tracked client: its bucket and when it was last seen.
#[derive(Debug)]
struct ClientEntry {
    bucket: Arc<TokenBucket>,
    last_seen: Instant,
}

impl ClientEntry {
    fn touch(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }
}

/// Registry of token buckets keyed by client identity.
///
/// Buckets are created lazily on first sight of an identity and handed out
/// as shared handles. The map lock covers only map operations; token
/// accounting happens on the bucket's own lock after it is released.
#[derive(Debug)]
pub struct ClientRegistry {
    /// Refill rate given to new buckets
    rate: f64,
    /// Burst capacity given to new buckets
    burst: u32,
    clients: Mutex<HashMap<String, ClientEntry>>,
}

impl ClientRegistry {
    /// Create an empty registry handing out buckets with `rate` and `burst`.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            rate,
            burst,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry from the rate limiting configuration.
    pub fn from_config(config: &RateLimitingConfig) -> Self {
        Self::new(config.rate_per_sec, config.burst)
    }

    /// Get the bucket for `identity`, creating it if this is a new client.
    pub fn get_or_create(&self, identity: &str) -> Arc<TokenBucket> {
        self.get_or_create_at(identity, Instant::now())
    }

    /// Get or create the bucket for `identity`, recording it as seen at `now`.
    ///
    /// Lookup and insert happen under a single lock acquisition, so racing
    /// first-time callers for one identity all receive the same bucket.
    pub fn get_or_create_at(&self, identity: &str, now: Instant) -> Arc<TokenBucket> {
        let mut clients = self.clients.lock();

        if let Some(entry) = clients.get_mut(identity) {
            entry.touch(now);
            trace!(client = %identity, "Reusing client bucket");
            return Arc::clone(&entry.bucket);
        }

        debug!(
            client = %identity,
            rate = self.rate,
            burst = self.burst,
            "Creating client bucket"
        );
        let bucket = Arc::new(TokenBucket::new_at(self.rate, self.burst, now));
        clients.insert(
            identity.to_owned(),
            ClientEntry {
                bucket: Arc::clone(&bucket),
                last_seen: now,
            },
        );
        bucket
    }

    /// Remove every client not seen since `now - expiration`.
    ///
    /// Returns the number of evicted clients. A client evicted while still
    /// active simply gets a fresh, full bucket on its next request.
    pub fn sweep(&self, now: Instant, expiration: Duration) -> usize {
        let Some(cutoff) = now.checked_sub(expiration) else {
            // Nothing can be older than the start of the monotonic clock
            return 0;
        };

        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|_, entry| entry.last_seen >= cutoff);
        before - clients.len()
    }

    /// Whether a bucket is currently tracked for `identity`.
    pub fn contains(&self, identity: &str) -> bool {
        self.clients.lock().contains_key(identity)
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether no clients are tracked.
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}
