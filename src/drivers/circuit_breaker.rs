// ABOUTME: Circuit breaker guarding calls to a wearable vendor's cloud API
// ABOUTME: Fails fast while a vendor is down so one failing device does not stall its syncs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::errors::{DriverError, DriverResult};
use crate::constants::circuit_breaker as defaults;
use crate::models::VendorType;

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted
    Closed,
    /// Calls are rejected until the cooldown elapses
    Open,
    /// One probe at a time is let through
    HalfOpen,
}

/// Thresholds for a breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before probing
    pub cooldown: Duration,
    /// Successful probes that close the circuit again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(defaults::COOLDOWN_SECS),
            success_threshold: defaults::SUCCESS_THRESHOLD,
        }
    }
}

#[derive(Debug)]
enum Inner {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32, probe_in_flight: bool },
}

/// Per-vendor circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    vendor: VendorType,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Breaker with default thresholds
    #[must_use]
    pub fn new(vendor: VendorType) -> Self {
        Self::with_config(vendor, CircuitBreakerConfig::default())
    }

    /// Breaker with custom thresholds
    #[must_use]
    pub const fn with_config(vendor: VendorType, config: CircuitBreakerConfig) -> Self {
        Self {
            vendor,
            config,
            inner: Mutex::new(Inner::Closed { failures: 0 }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        match *self.lock() {
            Inner::Closed { .. } => CircuitState::Closed,
            Inner::Open { .. } => CircuitState::Open,
            Inner::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Admit a call or reject it with `CircuitBreakerOpen`
    ///
    /// # Errors
    ///
    /// Returns `DriverError::CircuitBreakerOpen` while the circuit is open or a
    /// half-open probe is already in flight
    pub fn check(&self) -> DriverResult<()> {
        let mut inner = self.lock();
        match *inner {
            Inner::Closed { .. } => Ok(()),
            Inner::Open { since } => {
                let elapsed = since.elapsed();
                if elapsed >= self.config.cooldown {
                    info!(vendor = %self.vendor, "Circuit breaker half-open, probing vendor");
                    *inner = Inner::HalfOpen {
                        successes: 0,
                        probe_in_flight: true,
                    };
                    Ok(())
                } else {
                    Err(self.open_error(self.config.cooldown.saturating_sub(elapsed)))
                }
            }
            Inner::HalfOpen {
                successes,
                probe_in_flight,
            } => {
                if probe_in_flight {
                    Err(self.open_error(Duration::from_secs(1)))
                } else {
                    *inner = Inner::HalfOpen {
                        successes,
                        probe_in_flight: true,
                    };
                    Ok(())
                }
            }
        }
    }

    fn open_error(&self, remaining: Duration) -> DriverError {
        DriverError::CircuitBreakerOpen {
            vendor: self.vendor,
            retry_after_secs: remaining.as_secs().max(1),
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match *inner {
            Inner::Closed { .. } => *inner = Inner::Closed { failures: 0 },
            Inner::HalfOpen { successes, .. } => {
                let successes = successes + 1;
                if successes >= self.config.success_threshold {
                    info!(vendor = %self.vendor, "Circuit breaker closed, vendor recovered");
                    *inner = Inner::Closed { failures: 0 };
                } else {
                    *inner = Inner::HalfOpen {
                        successes,
                        probe_in_flight: false,
                    };
                }
            }
            Inner::Open { .. } => {}
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match *inner {
            Inner::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    warn!(
                        vendor = %self.vendor,
                        failures,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "Circuit breaker opened, vendor failing"
                    );
                    *inner = Inner::Open {
                        since: Instant::now(),
                    };
                } else {
                    *inner = Inner::Closed { failures };
                }
            }
            Inner::HalfOpen { .. } => {
                warn!(vendor = %self.vendor, "Circuit breaker re-opened, probe failed");
                *inner = Inner::Open {
                    since: Instant::now(),
                };
            }
            Inner::Open { .. } => {
                *inner = Inner::Open {
                    since: Instant::now(),
                };
            }
        }
    }

    /// Force the circuit closed
    pub fn reset(&self) {
        *self.lock() = Inner::Closed { failures: 0 };
    }

    /// Run an operation under the breaker
    ///
    /// Only failures that say something about vendor health
    /// ([`DriverError::trips_circuit`]) are counted.
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerOpen` when rejected, otherwise the operation's error
    pub async fn call<T, F>(&self, operation: F) -> DriverResult<T>
    where
        F: Future<Output = DriverResult<T>>,
    {
        self.check()?;
        match operation.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                if error.trips_circuit() {
                    self.record_failure();
                } else {
                    self.release_probe();
                }
                Err(error)
            }
        }
    }

    /// Let the next probe through after a probe ended without a verdict
    fn release_probe(&self) {
        let mut inner = self.lock();
        if let Inner::HalfOpen { successes, .. } = *inner {
            *inner = Inner::HalfOpen {
                successes,
                probe_in_flight: false,
            };
        }
    }
}
