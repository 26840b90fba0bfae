//! Client-side self-throttling
//!
//! Two independent brakes apply to every API call:
//! - a token bucket caps how often calls may start
//! - a minimum response latency stretches fast calls so a burst of cache
//!   misses never hammers the upstream service

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;

pub struct RequestThrottle {
    min_latency: Duration,
    rate_limiter: DefaultDirectRateLimiter,
}

impl RequestThrottle {
    pub fn new(min_latency: Duration, max_requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(max_requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            min_latency,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }
    }

    /// Run `call` under both brakes
    pub async fn run<F>(&self, call: F) -> F::Output
    where
        F: Future,
    {
        self.rate_limiter.until_ready().await;

        let started = Instant::now();
        let output = call.await;

        let elapsed = started.elapsed();
        if elapsed < self.min_latency {
            let wait_time = self.min_latency - elapsed;
            tracing::trace!("Throttling: padding response by {:?}", wait_time);
            tokio::time::sleep(wait_time).await;
        }

        output
    }
}
