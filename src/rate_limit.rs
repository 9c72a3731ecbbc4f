use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::metrics::RATE_LIMIT_ENTRIES;

/// Longest accepted window (one year). Longer windows are clamped to it.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;
const MAX_WINDOW: Duration = Duration::from_secs(MAX_WINDOW_SECS);

// end of a window starting at `now`, never overflowing Instant
fn window_end(now: Instant, window: Duration) -> Instant {
    now.checked_add(window.min(MAX_WINDOW)).unwrap_or(now)
}

// Rate limit entry - tracks requests per client key
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Time until the current window closes.
    pub retry_after: Duration,
}

/// Fixed-window request counter keyed by client identifier.
///
/// State lives in this process only. Running several gateway instances
/// behind a load balancer gives each its own budget; a shared store would
/// be needed for a global limit.
#[derive(Default)]
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, max_requests: u32, window: Duration) -> RateLimitDecision {
        self.check_at(key, max_requests, window, Instant::now())
    }

    pub fn check_at(
        &self,
        key: &str,
        max_requests: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let window = window.min(MAX_WINDOW);
        if max_requests == 0 {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after: window,
            };
        }

        // entry() holds the shard lock, so check-and-increment is atomic per key
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_at: window_end(now, window),
            });

        // new client or window expired? start a fresh one
        if entry.count == 0 || now > entry.reset_at {
            entry.count = 1;
            entry.reset_at = window_end(now, window);
            return RateLimitDecision {
                allowed: true,
                remaining: max_requests - 1,
                retry_after: window,
            };
        }

        let retry_after = entry.reset_at.saturating_duration_since(now);

        if entry.count >= max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: max_requests - entry.count,
            retry_after,
        }
    }

    /// Drops every entry whose window has closed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now <= entry.reset_at);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Background task that sweeps the limiter; aborted on shutdown or drop.
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub fn spawn(limiter: Arc<RateLimiter>, every: Duration) -> Self {
        // interval() panics on a zero period
        let every = every.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = interval(every);
            info!(interval = ?every, "rate limit sweeper started");

            loop {
                interval.tick().await;
                let removed = limiter.sweep();
                RATE_LIMIT_ENTRIES.set(limiter.len() as f64);
                if removed > 0 {
                    debug!(removed, live = limiter.len(), "swept expired rate limit entries");
                }
            }
        });

        Self { handle }
    }

    pub fn shutdown(self) {
        self.handle.abort();
        info!("rate limit sweeper stopped");
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
