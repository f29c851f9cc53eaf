// ABOUTME: HTTP client decorator that attaches bearer tokens and recovers from 401 once
// ABOUTME: Maps vendor HTTP statuses onto driver errors for every authorized request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::sync::Arc;

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::TokenManager;
use crate::constants::http;
use crate::drivers::errors::{DriverError, DriverResult};
use crate::models::VendorType;

/// Run `operation` with a valid token, refreshing and retrying exactly once on 401
///
/// # Errors
///
/// Returns the operation's error, or `AuthenticationFailed` if the retry is rejected too
pub async fn with_auth_retry<T, F, Fut>(tokens: &TokenManager, mut operation: F) -> DriverResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = DriverResult<T>>,
{
    let token = tokens.access_token().await?;
    match operation(token.clone()).await {
        Err(DriverError::AuthenticationFailed { vendor, .. }) => {
            debug!(vendor = %vendor, "Vendor rejected token, refreshing once");
            let refreshed = tokens.force_refresh(&token).await?;
            operation(refreshed).await
        }
        other => other,
    }
}

/// Authorized JSON client for one vendor account
#[derive(Clone)]
pub struct AuthorizedClient {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    vendor: VendorType,
}

impl AuthorizedClient {
    /// Wrap a shared HTTP client
    #[must_use]
    pub const fn new(http: reqwest::Client, tokens: Arc<TokenManager>, vendor: VendorType) -> Self {
        Self { http, tokens, vendor }
    }

    /// Token manager behind this client
    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Authorized GET decoding a JSON body
    ///
    /// # Errors
    ///
    /// Returns a driver error classified from the transport failure or HTTP status
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> DriverResult<T> {
        let response = with_auth_retry(&self.tokens, |token| async move {
            let response = self
                .http
                .get(url)
                .bearer_auth(token)
                .query(query)
                .send()
                .await
                .map_err(|e| DriverError::NetworkError {
                    vendor: self.vendor,
                    message: e.to_string(),
                })?;
            self.check_status(response).await
        })
        .await?;

        response.json::<T>().await.map_err(|e| DriverError::ParseError {
            vendor: self.vendor,
            field: url.to_owned(),
            reason: e.to_string(),
        })
    }

    async fn check_status(&self, response: Response) -> DriverResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(DriverError::AuthenticationFailed {
                vendor: self.vendor,
                reason: "access token rejected".to_owned(),
            }),
            StatusCode::FORBIDDEN => Err(DriverError::PermissionDenied {
                vendor: self.vendor,
                reason: "scope not granted for this resource".to_owned(),
            }),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(http::DEFAULT_RETRY_AFTER_SECS);
                warn!(vendor = %self.vendor, retry_after_secs, "Vendor rate limit response");
                Err(DriverError::RateLimitExceeded {
                    vendor: self.vendor,
                    retry_after_secs,
                })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(DriverError::ApiError {
                    vendor: self.vendor,
                    status_code: status.as_u16(),
                    message: body.chars().take(200).collect(),
                    retryable: status.is_server_error(),
                })
            }
        }
    }
}
