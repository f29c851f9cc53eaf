// ABOUTME: Exponential backoff with jitter for rate-limited vendor requests
// ABOUTME: Retries only RateLimitExceeded and honours the vendor's Retry-After when shorter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::errors::{DriverError, DriverResult};
use crate::constants::http;

/// Backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound of the random jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: http::RATE_LIMIT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(http::RATE_LIMIT_BASE_DELAY_MS),
            max_jitter: Duration::from_millis(http::RATE_LIMIT_MAX_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after_secs: u64) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)));
        let jitter_ms = if self.max_jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..=u64::try_from(self.max_jitter.as_millis()).unwrap_or(0))
        };
        let backoff = exponential + Duration::from_millis(jitter_ms);
        let vendor_hint = Duration::from_secs(retry_after_secs);
        if vendor_hint.is_zero() {
            backoff
        } else {
            backoff.min(vendor_hint)
        }
    }
}

/// Run `operation`, retrying while it reports `RateLimitExceeded`
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or the first
/// non-rate-limit error immediately
pub async fn with_rate_limit_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> DriverResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(DriverError::RateLimitExceeded {
                vendor,
                retry_after_secs,
            }) if attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt, retry_after_secs);
                warn!(
                    vendor = %vendor,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Vendor rate limit hit, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VendorType;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limit_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_rate_limit_retry(&RetryPolicy::default(), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DriverError::RateLimitExceeded {
                    vendor: VendorType::Whoop,
                    retry_after_secs: 1,
                })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.ok(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: DriverResult<()> = with_rate_limit_retry(&RetryPolicy::default(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DriverError::RateLimitExceeded {
                vendor: VendorType::Whoop,
                retry_after_secs: 0,
            })
        })
        .await;

        assert!(matches!(result, Err(DriverError::RateLimitExceeded { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), http::RATE_LIMIT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for(1, 0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3, 0), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3, 0).min(Duration::from_secs(60)), policy.delay_for(3, 60));
    }
}
