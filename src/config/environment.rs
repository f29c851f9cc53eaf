// ABOUTME: Environment-based configuration for the wearables layer
// ABOUTME: Typed defaults for sync timing, realtime polling, HTTP timeouts, WHOOP OAuth and storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{http, oauth, realtime, service, sync};
use crate::errors::{AppError, AppResult, ErrorCode};

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Test runs
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// HTTP client timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: http::DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: http::DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl HttpClientConfig {
    /// Build the HTTP client every OAuth driver shares
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized
    pub fn build_client(&self) -> AppResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .user_agent(concat!("pierre-wearables/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))
    }
}

/// WHOOP OAuth application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoopSettings {
    /// OAuth client id
    pub client_id: Option<String>,
    /// OAuth client secret
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    /// Redirect URI registered with WHOOP
    pub redirect_uri: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Revoke endpoint
    pub revoke_url: String,
    /// Developer API base
    pub api_base_url: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Webhook signing secret
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
}

impl Default for WhoopSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: oauth::DEFAULT_REDIRECT_URI.to_owned(),
            auth_url: oauth::WHOOP_AUTH_URL.to_owned(),
            token_url: oauth::WHOOP_TOKEN_URL.to_owned(),
            revoke_url: oauth::WHOOP_REVOKE_URL.to_owned(),
            api_base_url: oauth::WHOOP_API_BASE_URL.to_owned(),
            scopes: parse_scopes(oauth::WHOOP_DEFAULT_SCOPES),
            webhook_secret: None,
        }
    }
}

impl WhoopSettings {
    /// Whether client credentials are present
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Real-time polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Idle poll interval
    pub poll_interval: Duration,
    /// Poll interval during a workout session
    pub workout_poll_interval: Duration,
    /// Per-subscriber channel capacity
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(realtime::POLL_INTERVAL_SECS),
            workout_poll_interval: Duration::from_secs(realtime::WORKOUT_POLL_INTERVAL_SECS),
            channel_capacity: realtime::SUBSCRIBER_CHANNEL_CAPACITY,
        }
    }
}

/// Sync orchestration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Lookback for never-synced devices
    pub default_lookback_days: i64,
    /// Unified snapshot TTL
    pub snapshot_ttl: Duration,
    /// Bundles older than this are ignored by the aggregator
    pub max_bundle_age_days: i64,
    /// Auto-sync scheduler tick
    pub auto_sync_tick: Duration,
    /// Refresh tokens that expire within this many seconds
    pub token_refresh_threshold_secs: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            default_lookback_days: sync::DEFAULT_LOOKBACK_DAYS,
            snapshot_ttl: Duration::from_secs(sync::SNAPSHOT_TTL_SECS),
            max_bundle_age_days: sync::MAX_BUNDLE_AGE_DAYS,
            auto_sync_tick: Duration::from_secs(sync::AUTO_SYNC_TICK_SECS),
            token_refresh_threshold_secs: oauth::TOKEN_REFRESH_THRESHOLD_SECS,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WearablesConfig {
    /// Deployment environment
    pub environment: Environment,
    /// HTTP client timeouts
    pub http: HttpClientConfig,
    /// Sync orchestration
    pub sync: SyncSettings,
    /// Real-time polling
    pub realtime: RealtimeConfig,
    /// WHOOP OAuth
    pub whoop: WhoopSettings,
    /// Directory of the file-backed device registry
    pub storage_dir: PathBuf,
}

impl Default for WearablesConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            http: HttpClientConfig::default(),
            sync: SyncSettings::default(),
            realtime: RealtimeConfig::default(),
            whoop: WhoopSettings::default(),
            storage_dir: default_storage_dir(),
        }
    }
}

impl WearablesConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error when a variable is set but cannot be parsed
    pub fn from_env() -> AppResult<Self> {
        info!("Loading wearables configuration from environment variables");
        let defaults = Self::default();

        let config = Self {
            environment: Environment::from_str_or_default(
                &env::var("ENVIRONMENT").unwrap_or_default(),
            ),
            http: HttpClientConfig {
                timeout_secs: env_parse("WEARABLES_HTTP_TIMEOUT_SECS", defaults.http.timeout_secs)?,
                connect_timeout_secs: env_parse(
                    "WEARABLES_HTTP_CONNECT_TIMEOUT_SECS",
                    defaults.http.connect_timeout_secs,
                )?,
            },
            sync: SyncSettings {
                default_lookback_days: env_parse(
                    "WEARABLES_SYNC_LOOKBACK_DAYS",
                    defaults.sync.default_lookback_days,
                )?,
                snapshot_ttl: Duration::from_secs(env_parse(
                    "WEARABLES_CACHE_TTL_SECS",
                    defaults.sync.snapshot_ttl.as_secs(),
                )?),
                max_bundle_age_days: env_parse(
                    "WEARABLES_MAX_BUNDLE_AGE_DAYS",
                    defaults.sync.max_bundle_age_days,
                )?,
                auto_sync_tick: Duration::from_secs(env_parse(
                    "WEARABLES_AUTO_SYNC_TICK_SECS",
                    defaults.sync.auto_sync_tick.as_secs(),
                )?),
                token_refresh_threshold_secs: env_parse(
                    "WEARABLES_TOKEN_REFRESH_THRESHOLD_SECS",
                    defaults.sync.token_refresh_threshold_secs,
                )?,
            },
            realtime: RealtimeConfig {
                poll_interval: Duration::from_millis(env_parse(
                    "WEARABLES_POLL_INTERVAL_MS",
                    duration_millis(defaults.realtime.poll_interval),
                )?),
                workout_poll_interval: Duration::from_millis(env_parse(
                    "WEARABLES_WORKOUT_POLL_INTERVAL_MS",
                    duration_millis(defaults.realtime.workout_poll_interval),
                )?),
                channel_capacity: env_parse(
                    "WEARABLES_CHANNEL_CAPACITY",
                    defaults.realtime.channel_capacity,
                )?,
            },
            whoop: WhoopSettings {
                client_id: env::var("WHOOP_CLIENT_ID").ok(),
                client_secret: env::var("WHOOP_CLIENT_SECRET").ok(),
                redirect_uri: env_var_or("WHOOP_REDIRECT_URI", &defaults.whoop.redirect_uri),
                auth_url: env_var_or("WHOOP_AUTH_URL", &defaults.whoop.auth_url),
                token_url: env_var_or("WHOOP_TOKEN_URL", &defaults.whoop.token_url),
                revoke_url: env_var_or("WHOOP_REVOKE_URL", &defaults.whoop.revoke_url),
                api_base_url: env_var_or("WHOOP_API_BASE_URL", &defaults.whoop.api_base_url),
                scopes: env::var("WHOOP_SCOPES")
                    .map_or(defaults.whoop.scopes, |value| parse_scopes(&value)),
                webhook_secret: env::var("WHOOP_WEBHOOK_SECRET").ok(),
            },
            storage_dir: env::var("WEARABLES_STORAGE_DIR")
                .map_or(defaults.storage_dir, PathBuf::from),
        };

        config.validate()?;
        info!("Wearables configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error for values the layer cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.realtime.channel_capacity == 0 {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                "WEARABLES_CHANNEL_CAPACITY must be greater than zero",
            ));
        }
        if self.realtime.poll_interval.is_zero() || self.realtime.workout_poll_interval.is_zero() {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                "Real-time poll intervals must be greater than zero",
            ));
        }
        if self.sync.default_lookback_days <= 0 {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                "WEARABLES_SYNC_LOOKBACK_DAYS must be positive",
            ));
        }
        if !self.whoop.is_configured() {
            warn!("WHOOP OAuth is missing client_id or client_secret; WHOOP devices cannot connect");
        }
        Ok(())
    }

    /// Summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Pierre Wearables Configuration:\n\
             - Environment: {}\n\
             - Snapshot TTL: {}s\n\
             - Default Lookback: {} days\n\
             - Poll Interval: {}ms (workout {}ms)\n\
             - WHOOP OAuth: {}\n\
             - Storage: {}",
            self.environment,
            self.sync.snapshot_ttl.as_secs(),
            self.sync.default_lookback_days,
            self.realtime.poll_interval.as_millis(),
            self.realtime.workout_poll_interval.as_millis(),
            if self.whoop.is_configured() {
                "Configured"
            } else {
                "Not Configured"
            },
            self.storage_dir.display(),
        )
    }
}

/// Default directory for the file-backed device registry
#[must_use]
pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join(service::DATA_DIR_NAME)
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back to a default when unset
fn env_parse<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            AppError::new(ErrorCode::ConfigInvalid, format!("Invalid {key} value: {e}"))
        }),
        Err(_) => Ok(default),
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Parse space- or comma-separated scopes
fn parse_scopes(scopes: &str) -> Vec<String> {
    scopes
        .split([' ', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scopes() {
        let scopes = parse_scopes("read:recovery, read:sleep offline");
        assert_eq!(scopes, vec!["read:recovery", "read:sleep", "offline"]);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from_str_or_default("prod"), Environment::Production);
        assert_eq!(Environment::from_str_or_default("TEST"), Environment::Testing);
        assert_eq!(Environment::from_str_or_default("other"), Environment::Development);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(WearablesConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = WearablesConfig::default();
        config.realtime.channel_capacity = 0;
        let error = config.validate().err();
        assert_eq!(error.map(|e| e.code), Some(ErrorCode::ConfigInvalid));
    }
}
