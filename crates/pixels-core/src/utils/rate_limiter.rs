//! Rate limiting for canvas updates
//!
//! One token bucket per source address. Buckets refill continuously and are
//! charged on access, so nothing runs in the background. The limiter is
//! owned by the hub task and is never shared, so it takes `&mut self` and
//! holds no locks.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum burst size (bucket capacity)
    pub capacity: u32,
    /// Time to earn back one token
    pub refill_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            refill_interval: Duration::from_secs(1),
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limit config
    #[must_use]
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            refill_interval,
        }
    }

    /// Bucket of `capacity` tokens refilled at one token per second
    #[must_use]
    pub fn per_second(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(1))
    }

    /// Tokens earned per second
    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        let secs = self.refill_interval.as_secs_f64();
        if secs <= 0.0 {
            f64::INFINITY
        } else {
            1.0 / secs
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitResult {
    /// Whether the action is allowed
    pub allowed: bool,
    /// Whole tokens left after this check
    pub remaining: u32,
    /// Time until the next token is available (zero when allowed)
    pub retry_after: Duration,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
        }
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_secs_f64() * config.refill_rate();
        self.tokens = (self.tokens + earned).min(f64::from(config.capacity));
        self.last_refill = now;
    }

    fn is_full(&self, config: &RateLimitConfig) -> bool {
        self.tokens >= f64::from(config.capacity)
    }
}

/// Per-address token bucket limiter
#[derive(Debug)]
pub struct AddressRateLimiter {
    config: RateLimitConfig,
    buckets: HashMap<IpAddr, TokenBucket>,
}

impl AddressRateLimiter {
    /// Create a new rate limiter
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
        }
    }

    /// Create a full bucket for `addr` unless one exists.
    ///
    /// Returns `true` if a bucket was created.
    pub fn ensure(&mut self, addr: IpAddr) -> bool {
        if self.buckets.contains_key(&addr) {
            return false;
        }
        self.buckets
            .insert(addr, TokenBucket::full(self.config.capacity, Instant::now()));
        true
    }

    /// Refill, then try to take one token
    pub fn acquire(&mut self, addr: IpAddr) -> RateLimitResult {
        let now = Instant::now();
        let config = &self.config;
        let bucket = self
            .buckets
            .entry(addr)
            .or_insert_with(|| TokenBucket::full(config.capacity, now));

        bucket.refill(config, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitResult {
                allowed: true,
                remaining: bucket.tokens.floor() as u32,
                retry_after: Duration::ZERO,
            }
        } else {
            let missing = 1.0 - bucket.tokens;
            RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after: Duration::from_secs_f64(missing / config.refill_rate()),
            }
        }
    }

    /// Whether one more action is allowed for `addr` (consumes a token)
    pub fn allow(&mut self, addr: IpAddr) -> bool {
        self.acquire(addr).allowed
    }

    /// Current token count for `addr`, refilled to now
    pub fn tokens(&mut self, addr: IpAddr) -> Option<f64> {
        let now = Instant::now();
        let config = &self.config;
        self.buckets.get_mut(&addr).map(|bucket| {
            bucket.refill(config, now);
            bucket.tokens
        })
    }

    /// Whether a bucket exists for `addr`
    #[must_use]
    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.buckets.contains_key(addr)
    }

    /// Number of tracked addresses
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no address is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Remove buckets that have refilled to capacity and whose address is
    /// not retained by `keep`. A full bucket is identical to a fresh one, so
    /// dropping it loses no state.
    ///
    /// Returns the number of removed entries.
    pub fn sweep<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&IpAddr) -> bool,
    {
        let now = Instant::now();
        let config = &self.config;
        let initial_count = self.buckets.len();

        self.buckets.retain(|addr, bucket| {
            if keep(addr) {
                return true;
            }
            bucket.refill(config, now);
            !bucket.is_full(config)
        });

        initial_count - self.buckets.len()
    }
}
