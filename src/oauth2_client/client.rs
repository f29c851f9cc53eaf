// ABOUTME: Reqwest-backed OAuth 2.0 client for vendor token endpoints
// ABOUTME: Builds authorization URLs and performs code exchange, refresh and revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{TokenExchange, TokenGrant};
use crate::config::WhoopSettings;
use crate::drivers::errors::{DriverError, DriverResult};
use crate::models::VendorType;

/// OAuth application settings for one vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    /// Vendor
    pub vendor: VendorType,
    /// Client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Revoke endpoint
    pub revoke_url: Option<String>,
    /// Redirect URI
    pub redirect_uri: String,
    /// Requested scopes
    pub scopes: Vec<String>,
}

impl OAuthClientConfig {
    /// WHOOP settings; missing client credentials surface as errors on first use
    #[must_use]
    pub fn whoop(settings: &WhoopSettings) -> Self {
        Self {
            vendor: VendorType::Whoop,
            client_id: settings.client_id.clone().unwrap_or_default(),
            client_secret: settings.client_secret.clone().unwrap_or_default(),
            auth_url: settings.auth_url.clone(),
            token_url: settings.token_url.clone(),
            revoke_url: Some(settings.revoke_url.clone()),
            redirect_uri: settings.redirect_uri.clone(),
            scopes: settings.scopes.clone(),
        }
    }

    /// Whether client credentials are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// OAuth 2.0 client for one vendor
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthClientConfig,
    http: reqwest::Client,
}

/// Raw token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

impl OAuthClient {
    /// Create a client sharing the given HTTP connection pool
    #[must_use]
    pub const fn new(config: OAuthClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Client configuration
    #[must_use]
    pub const fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    /// Authorization URL the user is sent to
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if client credentials are missing or the auth URL is malformed
    pub fn authorization_url(&self, state: &str) -> DriverResult<Url> {
        self.ensure_configured()?;
        let mut url = Url::parse(&self.config.auth_url).map_err(|e| {
            DriverError::ConfigurationError {
                vendor: self.config.vendor,
                details: format!("Invalid auth URL: {e}"),
            }
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);

        Ok(url)
    }

    fn ensure_configured(&self) -> DriverResult<()> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(DriverError::ConfigurationError {
                vendor: self.config.vendor,
                details: "OAuth client id and secret are not configured".to_owned(),
            })
        }
    }

    async fn post_token_form(&self, params: &[(&str, &str)]) -> DriverResult<TokenGrant> {
        self.ensure_configured()?;
        let vendor = self.config.vendor;
        let response = self
            .http
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| DriverError::NetworkError {
                vendor,
                message: format!("Token request failed: {e}"),
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            warn!(vendor = %vendor, status = status.as_u16(), "Token endpoint rejected request");
            return Err(DriverError::AuthenticationFailed {
                vendor,
                reason: format!("token endpoint returned {status}: {body}"),
            });
        }
        if !status.is_success() {
            return Err(DriverError::ApiError {
                vendor,
                status_code: status.as_u16(),
                message: "token endpoint failure".to_owned(),
                retryable: status.is_server_error(),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| DriverError::ParseError {
            vendor,
            field: "token_response".to_owned(),
            reason: e.to_string(),
        })?;

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }
}

#[async_trait]
impl TokenExchange for OAuthClient {
    #[instrument(skip_all, fields(vendor = %self.config.vendor))]
    async fn refresh(&self, refresh_token: &str) -> DriverResult<TokenGrant> {
        debug!("Refreshing access token");
        self.post_token_form(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("scope", "offline"),
        ])
        .await
    }

    #[instrument(skip_all, fields(vendor = %self.config.vendor))]
    async fn exchange_code(&self, code: &str) -> DriverResult<TokenGrant> {
        debug!("Exchanging authorization code");
        self.post_token_form(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    #[instrument(skip_all, fields(vendor = %self.config.vendor))]
    async fn revoke(&self, access_token: &str) -> DriverResult<()> {
        let Some(revoke_url) = self.config.revoke_url.as_deref() else {
            return Ok(());
        };
        let response = self
            .http
            .post(revoke_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| DriverError::NetworkError {
                vendor: self.config.vendor,
                message: format!("Revoke request failed: {e}"),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DriverError::ApiError {
                vendor: self.config.vendor,
                status_code: response.status().as_u16(),
                message: "token revocation failed".to_owned(),
                retryable: false,
            })
        }
    }
}
