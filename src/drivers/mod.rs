// ABOUTME: Wearable device drivers, one per vendor, behind a common trait
// ABOUTME: Includes resilience helpers (circuit breaker, rate-limit retry) and the vendor factory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Device Drivers
//!
//! Each vendor gets one [`DeviceDriver`] implementation:
//!
//! - [`health_store::HealthStoreDriver`]: the on-device health store, reached through
//!   the [`health_store::HealthStore`] platform boundary
//! - [`whoop::WhoopDriver`]: WHOOP cloud API over OAuth 2.0
//! - [`unimplemented::UnimplementedDriver`]: Garmin, Fitbit and Google Fit, which
//!   implement the full interface but report "not implemented"
//!
//! [`DefaultDriverFactory`] maps a [`crate::models::VendorType`] to its driver.

/// Circuit breaker for vendor APIs
pub mod circuit_breaker;
/// Driver trait and shared driver types
pub mod core;
/// Driver error taxonomy
pub mod errors;
/// Vendor to driver mapping
pub mod factory;
/// On-device health store driver
pub mod health_store;
/// Rate-limit retry with backoff
pub mod retry;
/// Stub driver for vendors without an integration
pub mod unimplemented;
/// WHOOP cloud driver
pub mod whoop;

pub use self::core::{ConnectOptions, DeviceDriver, DeviceInfo, PermissionModel, PermissionRecord};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use errors::{DriverError, DriverResult};
pub use factory::{DefaultDriverFactory, DriverFactory};
pub use retry::{with_rate_limit_retry, RetryPolicy};
