//! Per-endpoint request throttling shared across call sites.
//!
//! One [`RateLimiter`] exists per distinct endpoint URL, held in a
//! [`LimiterRegistry`] owned by the caller and injected into every client
//! that talks to those endpoints. Requests against the same endpoint are
//! therefore throttled through the same limiter regardless of which
//! reconciliation run issued them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The bucket never accumulates more than one token, so back-to-back
/// requests are spaced at the configured rate with no burst allowance.
const BUCKET_CAPACITY: f64 = 1.0;

/// Error returned when the caller cancels while waiting for a permit.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cancelled while waiting for a rate-limit permit")]
pub struct RateLimitCancelled;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
}

impl TokenBucket {
    fn new(rate: f64) -> Self {
        Self {
            tokens: BUCKET_CAPACITY,
            last_refill: Instant::now(),
            rate,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(BUCKET_CAPACITY);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn wait_time(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Token-bucket limiter for one endpoint.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Mutex<TokenBucket>>,
}

impl RateLimiter {
    /// Construct a limiter granting `requests_per_hour` permits.
    ///
    /// Non-finite or non-positive rates disable throttling entirely.
    #[must_use]
    pub fn new(requests_per_hour: f64) -> Self {
        let bucket = (requests_per_hour.is_finite() && requests_per_hour > 0.0)
            .then(|| Mutex::new(TokenBucket::new(requests_per_hour / 3600.0)));
        Self { bucket }
    }

    /// Block until a permit is granted, returning the time spent waiting.
    ///
    /// Cancellation aborts the wait immediately with [`RateLimitCancelled`];
    /// the permit is not consumed in that case.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Duration, RateLimitCancelled> {
        let Some(bucket) = &self.bucket else {
            return Ok(Duration::ZERO);
        };
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitCancelled);
            }
            let wait = {
                let mut bucket = bucket.lock().expect("rate limiter mutex poisoned");
                if bucket.try_consume() {
                    return Ok(started.elapsed());
                }
                bucket.wait_time()
            };
            tokio::select! {
                () = cancel.cancelled() => return Err(RateLimitCancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}

/// Thread-safe registry mapping endpoint URLs to their shared limiter.
#[derive(Debug, Default)]
pub struct LimiterRegistry {
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl LimiterRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the limiter for `base_url`, creating it on first use.
    ///
    /// The first creation fixes the endpoint's rate for the lifetime of the
    /// registry; later callers share the existing instance regardless of the
    /// rate they pass.
    pub fn get_or_create(&self, base_url: &str, requests_per_hour: f64) -> Arc<RateLimiter> {
        let mut limiters = self
            .limiters
            .lock()
            .expect("limiter registry mutex poisoned");
        Arc::clone(
            limiters
                .entry(base_url.to_owned())
                .or_insert_with(|| Arc::new(RateLimiter::new(requests_per_hour))),
        )
    }
}
