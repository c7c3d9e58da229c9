//! Per-client token-bucket rate limiting.
//!
//! One bucket per client IP, all held in a single mutex-guarded registry.
//! Buckets start full, refill continuously at `rps` tokens per second up to
//! `burst`, and each admitted request spends one token. A background sweeper
//! evicts clients not seen for `idle_timeout`.
//!
//! The registry lock is never held across an `.await`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Sustained requests per second per client.
    pub rps: f64,
    /// Bucket capacity.
    pub burst: u32,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 2.0,
            burst: 4,
            idle_timeout: Duration::from_secs(180),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    pub fn full(rate: f64, burst: u32, now: Instant) -> Self {
        let burst = f64::from(burst);
        Self {
            rate,
            burst,
            tokens: burst,
            last: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        // Clock readings that go backwards do not move `last`
        if now > self.last {
            self.last = now;
        }
    }

    /// Spend one token if at least one is available.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn available(&self) -> f64 {
        self.tokens
    }
}

#[derive(Debug)]
struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct ClientRateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<String, ClientEntry>>,
}

impl ClientRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientEntry>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    /// Admit or reject one request from `client` at `now`.
    ///
    /// `last_seen` is refreshed whether or not the request is admitted.
    pub fn allow_at(&self, client: &str, now: Instant) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut clients = self.lock();
        let entry = clients
            .entry(client.to_string())
            .or_insert_with(|| ClientEntry {
                bucket: TokenBucket::full(self.config.rps, self.config.burst, now),
                last_seen: now,
            });

        entry.last_seen = now;
        entry.bucket.try_take(now)
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Evict clients idle for longer than `idle_timeout`. Returns how many were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let idle = self.config.idle_timeout;
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= idle);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Start the perpetual idle sweeper. The caller aborts the handle at shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = limiter.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let evicted = limiter.sweep();
                if evicted > 0 {
                    debug!(
                        evicted,
                        remaining = limiter.tracked_clients(),
                        "Evicted idle rate limit entries"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rps: f64, burst: u32) -> ClientRateLimiter {
        ClientRateLimiter::new(RateLimitConfig {
            rps,
            burst,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn burst_then_reject() {
        let limiter = limiter(2.0, 4);
        let now = Instant::now();

        for _ in 0..4 {
            assert!(limiter.allow_at("10.0.0.1", now));
        }
        assert!(!limiter.allow_at("10.0.0.1", now));
    }

    #[test]
    fn zero_rate_never_refills() {
        let limiter = limiter(0.0, 3);
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.allow_at("10.0.0.1", start));
        }
        assert!(!limiter.allow_at("10.0.0.1", start));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(3600)));
    }

    #[test]
    fn refill_is_continuous() {
        let limiter = limiter(4.0, 4);
        let start = Instant::now();

        for _ in 0..4 {
            assert!(limiter.allow_at("10.0.0.1", start));
        }
        assert!(!limiter.allow_at("10.0.0.1", start));

        // 250ms at 4 rps is exactly one token
        let later = start + Duration::from_millis(250);
        assert!(limiter.allow_at("10.0.0.1", later));
        assert!(!limiter.allow_at("10.0.0.1", later));
    }

    #[test]
    fn refill_caps_at_burst() {
        let mut bucket = TokenBucket::full(2.0, 4, Instant::now());
        let start = Instant::now();
        assert!(bucket.try_take(start));

        bucket.try_take(start + Duration::from_secs(3600));
        assert!(bucket.available() <= 3.0);
    }

    #[test]
    fn clients_are_isolated() {
        let limiter = limiter(1.0, 1);
        let now = Instant::now();

        assert!(limiter.allow_at("10.0.0.1", now));
        assert!(!limiter.allow_at("10.0.0.1", now));
        assert!(limiter.allow_at("10.0.0.2", now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn disabled_limiter_admits_everything_and_tracks_nothing() {
        let limiter = ClientRateLimiter::new(RateLimitConfig {
            enabled: false,
            burst: 1,
            ..RateLimitConfig::default()
        });
        let now = Instant::now();

        for _ in 0..100 {
            assert!(limiter.allow_at("10.0.0.1", now));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn sweep_evicts_only_idle_clients() {
        let limiter = limiter(2.0, 4);
        let start = Instant::now();

        limiter.allow_at("idle", start);
        limiter.allow_at("busy", start);
        limiter.allow_at("busy", start + Duration::from_secs(170));

        let evicted = limiter.sweep_at(start + Duration::from_secs(181));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);

        // An evicted client comes back with a full bucket
        let back = start + Duration::from_secs(182);
        for _ in 0..4 {
            assert!(limiter.allow_at("idle", back));
        }
    }

    #[test]
    fn rejected_requests_still_refresh_last_seen() {
        let limiter = limiter(0.001, 1);
        let start = Instant::now();

        assert!(limiter.allow_at("10.0.0.1", start));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(170)));

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(200)), 0);
    }
}
