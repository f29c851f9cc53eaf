// ABOUTME: Structured error types for device driver operations
// ABOUTME: Carries retry information and maps each failure onto a sync error classification
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use thiserror::Error;

use crate::models::{SyncError, SyncErrorKind, VendorType};

/// Errors raised by a device driver
///
/// A driver error is always scoped to one device and one operation. The manager
/// converts it into a failed [`crate::models::SyncResult`] or an
/// [`crate::errors::AppError`] at its boundary.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The user denied access to the requested data
    #[error("{vendor} permission denied: {reason}")]
    PermissionDenied {
        /// Vendor
        vendor: VendorType,
        /// What was denied
        reason: String,
    },

    /// Authorization expired and a refresh did not recover it
    #[error("{vendor} authentication failed: {reason}")]
    AuthenticationFailed {
        /// Vendor
        vendor: VendorType,
        /// Failure detail
        reason: String,
    },

    /// The vendor integration is not wired up
    #[error("{vendor} integration is not implemented")]
    NotImplemented {
        /// Vendor
        vendor: VendorType,
    },

    /// The driver holds no session
    #[error("{vendor} is not connected")]
    NotConnected {
        /// Vendor
        vendor: VendorType,
    },

    /// Platform or vendor service unavailable
    #[error("{vendor} is unavailable: {reason}")]
    Unavailable {
        /// Vendor
        vendor: VendorType,
        /// Failure detail
        reason: String,
    },

    /// Transport failure
    #[error("{vendor} network error: {message}")]
    NetworkError {
        /// Vendor
        vendor: VendorType,
        /// Failure detail
        message: String,
    },

    /// Non-success HTTP status
    #[error("{vendor} API error ({status_code}): {message}")]
    ApiError {
        /// Vendor
        vendor: VendorType,
        /// HTTP status
        status_code: u16,
        /// Response excerpt
        message: String,
        /// Whether retrying may succeed
        retryable: bool,
    },

    /// Vendor rate limit hit
    #[error("{vendor} rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded {
        /// Vendor
        vendor: VendorType,
        /// Seconds until the limit resets
        retry_after_secs: u64,
    },

    /// Circuit breaker rejected the call
    #[error("{vendor} circuit breaker open, retry after {retry_after_secs}s")]
    CircuitBreakerOpen {
        /// Vendor
        vendor: VendorType,
        /// Seconds until a probe is allowed
        retry_after_secs: u64,
    },

    /// Vendor payload could not be mapped
    #[error("{vendor} returned unparseable {field}: {reason}")]
    ParseError {
        /// Vendor
        vendor: VendorType,
        /// Payload field or resource
        field: String,
        /// Failure detail
        reason: String,
    },

    /// Driver misconfigured
    #[error("{vendor} configuration error: {details}")]
    ConfigurationError {
        /// Vendor
        vendor: VendorType,
        /// What is missing or wrong
        details: String,
    },

    /// Optional operation not supported by this vendor
    #[error("{vendor} does not support {feature}")]
    UnsupportedFeature {
        /// Vendor
        vendor: VendorType,
        /// Operation name
        feature: String,
    },

    /// Conflicting values withheld for a manual decision
    #[error("{vendor} values for {fields} conflict with other devices")]
    ConflictUnresolved {
        /// Vendor
        vendor: VendorType,
        /// Conflicting field names
        fields: String,
    },
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

impl DriverError {
    /// Vendor the error is scoped to
    #[must_use]
    pub const fn vendor(&self) -> VendorType {
        match self {
            Self::PermissionDenied { vendor, .. }
            | Self::AuthenticationFailed { vendor, .. }
            | Self::NotImplemented { vendor }
            | Self::NotConnected { vendor }
            | Self::Unavailable { vendor, .. }
            | Self::NetworkError { vendor, .. }
            | Self::ApiError { vendor, .. }
            | Self::RateLimitExceeded { vendor, .. }
            | Self::CircuitBreakerOpen { vendor, .. }
            | Self::ParseError { vendor, .. }
            | Self::ConfigurationError { vendor, .. }
            | Self::UnsupportedFeature { vendor, .. }
            | Self::ConflictUnresolved { vendor, .. } => *vendor,
        }
    }

    /// Whether retrying the same operation may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { .. }
            | Self::RateLimitExceeded { .. }
            | Self::CircuitBreakerOpen { .. }
            | Self::Unavailable { .. } => true,
            Self::ApiError { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Whether the failure should count against the circuit breaker
    ///
    /// Auth and permission failures say nothing about vendor health.
    #[must_use]
    pub const fn trips_circuit(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Unavailable { .. } | Self::ApiError { retryable: true, .. }
        )
    }

    /// Sync error classification
    #[must_use]
    pub const fn kind(&self) -> SyncErrorKind {
        match self {
            Self::PermissionDenied { .. } => SyncErrorKind::PermissionDenied,
            Self::AuthenticationFailed { .. } => SyncErrorKind::AuthExpired,
            Self::NotImplemented { .. } => SyncErrorKind::NotImplemented,
            Self::NotConnected { .. } => SyncErrorKind::NotConnected,
            Self::RateLimitExceeded { .. } => SyncErrorKind::RateLimited,
            Self::ConflictUnresolved { .. } => SyncErrorKind::ConflictUnresolved,
            Self::ParseError { .. } => SyncErrorKind::InvalidData,
            Self::Unavailable { .. }
            | Self::NetworkError { .. }
            | Self::ApiError { .. }
            | Self::CircuitBreakerOpen { .. }
            | Self::ConfigurationError { .. }
            | Self::UnsupportedFeature { .. } => SyncErrorKind::NetworkFailure,
        }
    }

    /// Sync error carrying this error's classification and message
    #[must_use]
    pub fn to_sync_error(&self) -> SyncError {
        SyncError::new(self.kind(), self.to_string())
    }

    /// Unsupported optional operation
    pub fn unsupported(vendor: VendorType, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            vendor,
            feature: feature.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let vendor = VendorType::Whoop;
        assert!(DriverError::NetworkError {
            vendor,
            message: "reset".into()
        }
        .is_retryable());
        assert!(!DriverError::ApiError {
            vendor,
            status_code: 404,
            message: "missing".into(),
            retryable: false
        }
        .is_retryable());
        assert!(!DriverError::NotImplemented { vendor }.is_retryable());
    }

    #[test]
    fn test_auth_failure_does_not_trip_circuit() {
        let error = DriverError::AuthenticationFailed {
            vendor: VendorType::Whoop,
            reason: "refresh rejected".into(),
        };
        assert!(!error.trips_circuit());
        assert_eq!(error.kind(), SyncErrorKind::AuthExpired);
    }
}
