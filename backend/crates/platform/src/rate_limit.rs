//! Rate Limiting Infrastructure
//!
//! In-process attempt counter with a fixed window and a lockout period,
//! keyed by client identifier (usually the peer IP).
//!
//! ## Policy
//! - Attempts inside `window` accumulate; reaching `max_attempts` blocks the client
//! - A blocked client is refused until `block_duration` has elapsed
//! - When the window or block expires the counter restarts at one

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Attempts allowed within one window
    pub max_attempts: u32,
    /// Window over which attempts are counted
    pub window: Duration,
    /// Lockout applied once the limit is hit
    pub block_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
            block_duration: Duration::from_secs(15 * 60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_attempts: u32, window_secs: u64, block_secs: u64) -> Self {
        Self {
            max_attempts,
            window: Duration::from_secs(window_secs),
            block_duration: Duration::from_secs(block_secs),
        }
    }
}

/// Per-client counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRate {
    pub attempts: u32,
    pub last_attempt: Instant,
    pub blocked_until: Option<Instant>,
}

impl ClientRate {
    fn first(now: Instant) -> Self {
        Self {
            attempts: 1,
            last_attempt: now,
            blocked_until: None,
        }
    }

    fn is_blocked_at(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// Snapshot of limiter occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    pub total_clients: usize,
    pub blocked_clients: usize,
    pub active_clients: usize,
}

/// Thread-safe attempt limiter
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: RwLock<HashMap<String, ClientRate>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record an attempt by `client` and report whether it may proceed
    pub fn is_allowed(&self, client: &str) -> bool {
        self.is_allowed_at(client, Instant::now())
    }

    pub fn is_allowed_at(&self, client: &str, now: Instant) -> bool {
        let mut clients = self.clients.write();

        let Some(rate) = clients.get_mut(client) else {
            clients.insert(client.to_string(), ClientRate::first(now));
            return true;
        };

        if let Some(until) = rate.blocked_until {
            if now < until {
                tracing::debug!(client, "Rate limited client still blocked");
                return false;
            }
            *rate = ClientRate::first(now);
            return true;
        }

        if now.saturating_duration_since(rate.last_attempt) >= self.config.window {
            *rate = ClientRate::first(now);
            return true;
        }

        rate.attempts += 1;
        rate.last_attempt = now;

        if rate.attempts > self.config.max_attempts {
            rate.blocked_until = Some(now + self.config.block_duration);
            tracing::warn!(
                client,
                attempts = rate.attempts,
                block_secs = self.config.block_duration.as_secs(),
                "Client blocked after too many attempts"
            );
            return false;
        }

        true
    }

    /// Current counters for `client`, if it has been seen
    pub fn client_info(&self, client: &str) -> Option<ClientRate> {
        self.clients.read().get(client).copied()
    }

    /// Drop clients whose window and block have both lapsed
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    pub fn cleanup_at(&self, now: Instant) -> usize {
        let window = self.config.window;
        let mut clients = self.clients.write();
        let before = clients.len();

        clients.retain(|_, rate| {
            rate.is_blocked_at(now) || now.saturating_duration_since(rate.last_attempt) < window
        });

        let removed = before - clients.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = clients.len(), "Rate limiter cleanup");
        }
        removed
    }

    /// Forget everything known about `client`
    pub fn reset(&self, client: &str) {
        self.clients.write().remove(client);
    }

    pub fn stats(&self) -> RateLimitStats {
        self.stats_at(Instant::now())
    }

    pub fn stats_at(&self, now: Instant) -> RateLimitStats {
        let clients = self.clients.read();
        let blocked = clients.values().filter(|r| r.is_blocked_at(now)).count();
        let active = clients
            .values()
            .filter(|r| now.saturating_duration_since(r.last_attempt) < self.config.window)
            .count();

        RateLimitStats {
            total_clients: clients.len(),
            blocked_clients: blocked,
            active_clients: active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(3, 60, 120))
    }

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.window, Duration::from_secs(900));
        assert_eq!(config.block_duration, Duration::from_secs(900));
    }

    #[test]
    fn test_blocks_after_max_attempts() {
        let limiter = limiter();
        let now = Instant::now();

        for i in 0..3 {
            assert!(limiter.is_allowed_at("10.0.0.1", now + Duration::from_secs(i)));
        }
        assert!(!limiter.is_allowed_at("10.0.0.1", now + Duration::from_secs(3)));
        assert!(!limiter.is_allowed_at("10.0.0.1", now + Duration::from_secs(60)));

        // other clients are unaffected
        assert!(limiter.is_allowed_at("10.0.0.2", now));
    }

    #[test]
    fn test_allowed_again_after_block_expires() {
        let limiter = limiter();
        let now = Instant::now();

        for _ in 0..4 {
            limiter.is_allowed_at("c", now);
        }
        assert!(limiter.client_info("c").unwrap().blocked_until.is_some());

        let later = now + Duration::from_secs(121);
        assert!(limiter.is_allowed_at("c", later));
        let info = limiter.client_info("c").unwrap();
        assert_eq!(info.attempts, 1);
        assert_eq!(info.blocked_until, None);
    }

    #[test]
    fn test_window_expiry_resets_counter() {
        let limiter = limiter();
        let now = Instant::now();

        limiter.is_allowed_at("c", now);
        limiter.is_allowed_at("c", now);
        assert_eq!(limiter.client_info("c").unwrap().attempts, 2);

        assert!(limiter.is_allowed_at("c", now + Duration::from_secs(61)));
        assert_eq!(limiter.client_info("c").unwrap().attempts, 1);
    }

    #[test]
    fn test_cleanup_and_stats() {
        let limiter = limiter();
        let now = Instant::now();

        limiter.is_allowed_at("idle", now);
        for _ in 0..4 {
            limiter.is_allowed_at("blocked", now + Duration::from_secs(100));
        }

        let stats = limiter.stats_at(now + Duration::from_secs(100));
        assert_eq!(
            stats,
            RateLimitStats {
                total_clients: 2,
                blocked_clients: 1,
                active_clients: 1,
            }
        );

        // idle is past its window, blocked is still inside its block
        assert_eq!(limiter.cleanup_at(now + Duration::from_secs(150)), 1);
        assert!(limiter.client_info("idle").is_none());
        assert!(limiter.client_info("blocked").is_some());
    }

    #[test]
    fn test_window_boundary_resets_counter() {
        let limiter = limiter();
        let now = Instant::now();

        limiter.is_allowed_at("c", now);
        assert!(limiter.is_allowed_at("c", now + Duration::from_secs(60)));
        assert_eq!(limiter.client_info("c").unwrap().attempts, 1);
    }

    #[test]
    fn test_cleanup_evicts_unblocked_client_after_window() {
        // block outlasts the window
        let limiter = limiter();
        let now = Instant::now();

        limiter.is_allowed_at("c", now);
        assert_eq!(limiter.cleanup_at(now + Duration::from_secs(90)), 1);
        assert!(limiter.client_info("c").is_none());
    }

    #[test]
    fn test_active_clients_counts_recent_attempts() {
        let limiter = limiter();
        let now = Instant::now();

        limiter.is_allowed_at("old", now);
        limiter.is_allowed_at("recent", now + Duration::from_secs(100));

        assert_eq!(
            limiter.stats_at(now + Duration::from_secs(100)),
            RateLimitStats {
                total_clients: 2,
                blocked_clients: 0,
                active_clients: 1,
            }
        );
    }

    #[test]
    fn test_reset() {
        let limiter = limiter();
        for _ in 0..4 {
            limiter.is_allowed("c");
        }
        assert!(!limiter.is_allowed("c"));
        limiter.reset("c");
        assert!(limiter.client_info("c").is_none());
        assert!(limiter.is_allowed("c"));
    }
}
