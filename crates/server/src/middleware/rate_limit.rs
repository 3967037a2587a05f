//! Global rate limiting middleware
//!
//! A single in-process token bucket shared across all clients. Enabled and
//! sized from `rate_limit` config; disabled limiters are simply not layered
//! into the router.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::QuantaClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tenon_common::errors::AppError;

/// Shared rate limiter handle
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, QuantaClock>>;

/// Create a rate limiter allowing `requests_per_second` sustained with
/// `burst` headroom
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> GlobalRateLimiter {
    let per_second =
        NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(50).unwrap());
    let burst = NonZeroU32::new(burst).unwrap_or(per_second);

    Arc::new(RateLimiter::direct(
        Quota::per_second(per_second).allow_burst(burst),
    ))
}

/// Reject requests once the bucket is drained
pub async fn rate_limit(
    request: Request,
    next: Next,
    limiter: GlobalRateLimiter,
    limit: u32,
) -> Result<Response, AppError> {
    if limiter.check().is_err() {
        return Err(AppError::RateLimited { limit });
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_allows_burst_then_denies() {
        let limiter = create_rate_limiter(1, 3);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_zero_config_falls_back() {
        // Misconfigured zero values must not panic
        let limiter = create_rate_limiter(0, 0);
        assert!(limiter.check().is_ok());
    }
}
