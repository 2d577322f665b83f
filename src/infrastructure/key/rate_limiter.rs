//! Sliding-window rate limiter keyed by key id

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::domain::key::RateLimitConfig;

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    pub limit: u32,
    /// Time until the oldest request in the window falls out of it
    pub reset_in: Duration,
}

#[derive(Debug)]
struct KeyWindow {
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl KeyWindow {
    fn evict_before(&mut self, cutoff: Instant) {
        while self.timestamps.front().is_some_and(|t| *t < cutoff) {
            self.timestamps.pop_front();
        }
    }
}

/// In-process sliding-window limiter
///
/// State is local to the process and lost on restart.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, KeyWindow>>>,
    cleanup_interval: Duration,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            cleanup_interval: Duration::from_secs(300),
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    /// Check the limit and, when allowed, count this request
    pub async fn check_and_record(&self, key_id: &str, config: &RateLimitConfig) -> RateLimitResult {
        self.maybe_cleanup().await;

        let now = Instant::now();
        let window = config.window();
        let cutoff = now.checked_sub(window).unwrap_or(now);

        let mut windows = self.windows.write().await;
        let entry = windows
            .entry(key_id.to_string())
            .or_insert_with(|| KeyWindow {
                window,
                timestamps: VecDeque::new(),
            });
        entry.window = window;
        entry.evict_before(cutoff);

        let used = entry.timestamps.len() as u32;
        let reset_in = entry
            .timestamps
            .front()
            .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(window);

        if used >= config.limit {
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                limit: config.limit,
                reset_in,
            };
        }

        entry.timestamps.push_back(now);

        RateLimitResult {
            allowed: true,
            remaining: config.limit - used - 1,
            limit: config.limit,
            reset_in,
        }
    }

    /// Check the limit without counting a request
    pub async fn check(&self, key_id: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now = Instant::now();
        let window = config.window();
        let cutoff = now.checked_sub(window).unwrap_or(now);

        let windows = self.windows.read().await;
        let live: Vec<Instant> = windows
            .get(key_id)
            .map(|entry| {
                entry
                    .timestamps
                    .iter()
                    .copied()
                    .filter(|t| *t >= cutoff)
                    .collect()
            })
            .unwrap_or_default();

        let used = live.len() as u32;
        let reset_in = live
            .first()
            .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(window);

        RateLimitResult {
            allowed: used < config.limit,
            remaining: config.limit.saturating_sub(used),
            limit: config.limit,
            reset_in,
        }
    }

    /// Forget all recorded requests for a key
    pub async fn reset(&self, key_id: &str) {
        self.windows.write().await.remove(key_id);
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }

    async fn maybe_cleanup(&self) {
        let should_cleanup = {
            let last = self.last_cleanup.read().await;
            last.elapsed() >= self.cleanup_interval
        };

        if should_cleanup {
            let mut last = self.last_cleanup.write().await;
            *last = Instant::now();

            let now = Instant::now();
            let mut windows = self.windows.write().await;

            for entry in windows.values_mut() {
                let cutoff = now.checked_sub(entry.window).unwrap_or(now);
                entry.evict_before(cutoff);
            }

            windows.retain(|_, entry| !entry.timestamps.is_empty());
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
