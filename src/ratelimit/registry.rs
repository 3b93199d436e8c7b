//! Per-identity limiter registry.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::bucket::{Quota, TokenBucket};
use crate::identity::Identity;

/// Registry of token buckets keyed by caller identity.
///
/// Buckets are created on the first request from an identity and kept for
/// the life of the registry. The map's entry lock guards only the
/// lookup-or-insert step; token accounting happens on the returned bucket
/// after that lock is released.
#[derive(Default)]
pub struct LimiterRegistry {
    limiters: DashMap<Identity, Arc<TokenBucket>>,
}

impl LimiterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            limiters: DashMap::new(),
        }
    }

    /// Get the limiter for `identity`, creating it with `quota` if absent.
    ///
    /// Concurrent callers for the same new identity all receive the same
    /// instance. The quota of an existing limiter is left untouched.
    pub fn get_or_create(&self, identity: &Identity, quota: Quota) -> Arc<TokenBucket> {
        if let Some(existing) = self.limiters.get(identity) {
            return Arc::clone(existing.value());
        }

        let entry = self.limiters.entry(identity.clone()).or_insert_with(|| {
            debug!(
                identity = %identity,
                rate = quota.rate,
                capacity = quota.capacity,
                "Creating new rate limiter"
            );
            Arc::new(TokenBucket::new(quota))
        });

        Arc::clone(entry.value())
    }

    /// Consume one token from `limiter`.
    pub fn allow(&self, limiter: &TokenBucket) -> bool {
        let allowed = limiter.allow();
        trace!(allowed = allowed, "Token bucket checked");
        allowed
    }

    /// Get the limiter for an identity without creating it.
    pub fn get(&self, identity: &Identity) -> Option<Arc<TokenBucket>> {
        self.limiters.get(identity).map(|e| Arc::clone(e.value()))
    }

    /// Number of identities with a limiter.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
