//! Per-client submission rate limiting.
//!
//! A sliding window of request instants per source IP. Expired entries are
//! pruned every `cleanup_interval` checks so spoofed addresses cannot grow
//! the table without bound.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use domains::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum submissions allowed in the window.
    pub max_requests: u32,
    pub window: Duration,
    /// Run cleanup every N checks.
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window: Duration::from_secs(60),
            cleanup_interval: 100,
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    state: RwLock<HashMap<IpAddr, Vec<Instant>>>,
    request_count: AtomicU64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: RwLock::new(HashMap::new()),
            request_count: AtomicU64::new(0),
        }
    }

    /// Records a submission from `ip`, or rejects it with `RateLimited`.
    pub fn check(&self, ip: IpAddr) -> Result<(), DomainError> {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.config.window).unwrap_or(now);

        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % self.config.cleanup_interval.max(1) == 0 {
            tracing::debug!(request_count = count, "running periodic rate limiter cleanup");
            self.cleanup();
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let timestamps = state.entry(ip).or_default();
        timestamps.retain(|&t| t > cutoff);

        if timestamps.len() >= self.config.max_requests as usize {
            tracing::warn!(
                ip = %ip,
                requests = timestamps.len(),
                max = self.config.max_requests,
                "submission rate limit exceeded"
            );
            return Err(DomainError::RateLimited);
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drops every IP with no request inside the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.config.window).unwrap_or(now);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.retain(|_, timestamps| {
            timestamps.retain(|&t| t > cutoff);
            !timestamps.is_empty()
        });
    }

    #[must_use]
    pub fn tracked_ips(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
