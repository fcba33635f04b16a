//! Utility modules for pixels-core
//!
//! - rate_limiter: Per-address token buckets for canvas updates

mod rate_limiter;

pub use rate_limiter::{AddressRateLimiter, RateLimitConfig, RateLimitResult};
