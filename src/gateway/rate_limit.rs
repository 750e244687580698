//! Webhook rate limiting
//!
//! Fixed-window counters kept in a shared keyed store with TTL. The store
//! is injected so several routers (or tests) can share or isolate it.

use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests allowed per key inside one window
    pub max_requests: u64,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 600,
            window_secs: 60,
        }
    }
}

/// Keyed counter store with per-entry expiry
pub trait RateLimitStore: Send + Sync {
    /// Count one hit on `key`. A missing or expired entry restarts at 1
    /// and lives for `ttl`. Returns the count inside the live window.
    fn hit(&self, key: &str, ttl: Duration, now: Instant) -> u64;

    /// Drop expired entries; returns how many were removed
    fn purge_expired(&self, now: Instant) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Window {
    expires_at: Instant,
    count: u64,
}

/// In-process `RateLimitStore` on a DashMap
#[derive(Default)]
pub struct DashMapRateLimitStore {
    entries: DashMap<String, Window>,
}

impl DashMapRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for DashMapRateLimitStore {
    fn hit(&self, key: &str, ttl: Duration, now: Instant) -> u64 {
        let mut entry = self.entries.entry(key.to_string()).or_insert(Window {
            expires_at: now + ttl,
            count: 0,
        });
        if entry.expires_at <= now {
            entry.expires_at = now + ttl;
            entry.count = 0;
        }
        entry.count += 1;
        entry.count
    }

    fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, w| w.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// `true` when the request may proceed
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        if !self.config.enabled {
            return true;
        }
        let window = Duration::from_secs(self.config.window_secs.max(1));
        self.store.hit(key, window, now) <= self.config.max_requests
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(DashMapRateLimitStore::new()),
            RateLimitConfig {
                enabled: true,
                max_requests,
                window_secs: 60,
            },
        )
    }

    #[test]
    fn test_limit_per_key() {
        let limiter = limiter(2);
        let t0 = Instant::now();
        assert!(limiter.check_at("webhook:pix-bank", t0));
        assert!(limiter.check_at("webhook:pix-bank", t0));
        assert!(!limiter.check_at("webhook:pix-bank", t0));
        // other providers have their own window
        assert!(limiter.check_at("webhook:pix-acquirer", t0));
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let limiter = limiter(1);
        let t0 = Instant::now();
        assert!(limiter.check_at("k", t0));
        assert!(!limiter.check_at("k", t0 + Duration::from_secs(59)));
        assert!(limiter.check_at("k", t0 + Duration::from_secs(61)));
    }

    #[test]
    fn test_purge_expired() {
        let store = DashMapRateLimitStore::new();
        let t0 = Instant::now();
        store.hit("a", Duration::from_secs(1), t0);
        store.hit("b", Duration::from_secs(10), t0);
        assert_eq!(store.purge_expired(t0 + Duration::from_secs(2)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_disabled_never_limits() {
        let limiter = RateLimiter::new(
            Arc::new(DashMapRateLimitStore::new()),
            RateLimitConfig {
                enabled: false,
                max_requests: 0,
                window_secs: 60,
            },
        );
        assert!(limiter.check("k"));
    }
}
