// ABOUTME: Holds one vendor account's OAuth tokens and refreshes them single-flight
// ABOUTME: Concurrent callers that find a stale token share a single refresh round-trip
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{OAuth2Credentials, TokenExchange};
use crate::drivers::errors::{DriverError, DriverResult};
use crate::models::VendorType;

/// Token holder with single-flight refresh
pub struct TokenManager {
    vendor: VendorType,
    exchange: Arc<dyn TokenExchange>,
    credentials: RwLock<Option<OAuth2Credentials>>,
    refresh_lock: Mutex<()>,
    refresh_threshold: Duration,
    refresh_count: AtomicU64,
}

impl TokenManager {
    /// Create an empty manager
    #[must_use]
    pub fn new(vendor: VendorType, exchange: Arc<dyn TokenExchange>, refresh_threshold_secs: i64) -> Self {
        Self {
            vendor,
            exchange,
            credentials: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_threshold: Duration::seconds(refresh_threshold_secs),
            refresh_count: AtomicU64::new(0),
        }
    }

    /// Token exchange backing this manager
    #[must_use]
    pub fn exchange(&self) -> &Arc<dyn TokenExchange> {
        &self.exchange
    }

    /// Replace the held tokens
    pub async fn set_credentials(&self, credentials: OAuth2Credentials) {
        *self.credentials.write().await = Some(credentials);
    }

    /// Drop the held tokens, returning them
    pub async fn clear(&self) -> Option<OAuth2Credentials> {
        self.credentials.write().await.take()
    }

    /// Snapshot of the held tokens
    pub async fn credentials(&self) -> Option<OAuth2Credentials> {
        self.credentials.read().await.clone()
    }

    /// Number of refresh round-trips performed
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Current access token, refreshed first if it expires within the threshold
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without tokens, or `AuthenticationFailed` if the refresh fails
    pub async fn access_token(&self) -> DriverResult<String> {
        let current = self
            .credentials
            .read()
            .await
            .clone()
            .ok_or(DriverError::NotConnected { vendor: self.vendor })?;

        if current.expires_within(self.refresh_threshold, Utc::now()) {
            debug!(vendor = %self.vendor, "Access token near expiry, refreshing");
            return self.refresh_if_stale(Some(&current.access_token)).await;
        }
        Ok(current.access_token)
    }

    /// Refresh after the vendor rejected `rejected` with a 401
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailed` if the refresh fails
    pub async fn force_refresh(&self, rejected: &str) -> DriverResult<String> {
        self.refresh_if_stale(Some(rejected)).await
    }

    /// Refresh unless another caller already replaced `stale` while we waited
    async fn refresh_if_stale(&self, stale: Option<&str>) -> DriverResult<String> {
        let _guard = self.refresh_lock.lock().await;

        let current = self
            .credentials
            .read()
            .await
            .clone()
            .ok_or(DriverError::NotConnected { vendor: self.vendor })?;

        let replaced = stale.is_some_and(|token| token != current.access_token);
        if replaced && !current.expires_within(self.refresh_threshold, Utc::now()) {
            debug!(vendor = %self.vendor, "Token already refreshed by a concurrent caller");
            return Ok(current.access_token);
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            warn!(vendor = %self.vendor, "Access token stale and no refresh token held");
            return Err(DriverError::AuthenticationFailed {
                vendor: self.vendor,
                reason: "no refresh token available".to_owned(),
            });
        };

        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        let grant = self.exchange.refresh(refresh_token).await.map_err(|e| match e {
            DriverError::AuthenticationFailed { .. } => e,
            other => DriverError::AuthenticationFailed {
                vendor: self.vendor,
                reason: other.to_string(),
            },
        })?;

        let next = current.refreshed(grant, Utc::now());
        let token = next.access_token.clone();
        *self.credentials.write().await = Some(next);
        info!(vendor = %self.vendor, "Access token refreshed");
        Ok(token)
    }
}
