// ABOUTME: OAuth 2.0 client module for cloud wearable vendors
// ABOUTME: Credentials, the token exchange boundary, single-flight refresh and the authorized HTTP decorator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OAuth 2.0 Client
//!
//! Every outbound call of an OAuth driver goes through [`AuthorizedClient`], which
//! asks the [`TokenManager`] for a token (refreshing it when it expires within the
//! configured threshold) and retries exactly once after a 401.

/// Authorized HTTP client decorator
pub mod authorized;
/// Reqwest implementation of the token endpoint exchange
pub mod client;
/// Single-flight token refresh
pub mod token_manager;

pub use authorized::{with_auth_retry, AuthorizedClient};
pub use client::{OAuthClient, OAuthClientConfig};
pub use token_manager::TokenManager;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::drivers::errors::DriverResult;

/// Tokens held for one vendor account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Credentials {
    /// Current access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes
    pub scopes: Vec<String>,
}

impl OAuth2Credentials {
    /// Whether the token expires within `threshold` of `now`
    #[must_use]
    pub fn expires_within(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now + threshold)
    }

    /// Merge a token grant, keeping the refresh token and scopes when the grant omits them
    #[must_use]
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let mut next = grant.into_credentials(now);
        if next.refresh_token.is_none() {
            next.refresh_token.clone_from(&self.refresh_token);
        }
        if next.scopes.is_empty() {
            next.scopes.clone_from(&self.scopes);
        }
        next
    }
}

/// Token endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Issued access token
    pub access_token: String,
    /// Issued refresh token
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: Option<i64>,
    /// Space-separated granted scopes
    pub scope: Option<String>,
}

impl TokenGrant {
    /// Convert into credentials anchored at `now`
    #[must_use]
    pub fn into_credentials(self, now: DateTime<Utc>) -> OAuth2Credentials {
        OAuth2Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            scopes: self
                .scope
                .map(|scope| scope.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default(),
        }
    }
}

/// Boundary to a vendor's OAuth token endpoint
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange a refresh token for new tokens
    async fn refresh(&self, refresh_token: &str) -> DriverResult<TokenGrant>;

    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> DriverResult<TokenGrant>;

    /// Revoke an access token
    async fn revoke(&self, access_token: &str) -> DriverResult<()>;
}
