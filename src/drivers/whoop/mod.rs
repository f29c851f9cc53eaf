// ABOUTME: WHOOP cloud driver over the developer API with OAuth 2.0, circuit breaking and 429 backoff
// ABOUTME: Maps cycles, recoveries, sleeps and workouts onto a partial bundle and resolves webhook pushes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # WHOOP Driver
//!
//! Every request runs through three layers, outermost first:
//!
//! 1. the vendor [`CircuitBreaker`], so a failing API fails fast;
//! 2. [`with_rate_limit_retry`] for HTTP 429;
//! 3. [`AuthorizedClient`], which refreshes near-expiry tokens and retries a 401 once.
//!
//! WHOOP scores recovery, strain and sleep once per physiological cycle, so a sync
//! looks back far enough to carry the current day's values even when the requested
//! window is short. Training load always reads the trailing 28 days of cycles.

/// API response types
pub mod api;
/// Webhook payloads and signature validation
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use self::api::{WhoopCycle, WhoopPage, WhoopRecovery, WhoopSleep, WhoopUserProfile, WhoopWorkout};
use self::webhook::WhoopEventType;
use super::circuit_breaker::CircuitBreaker;
use super::core::{ConnectOptions, DeviceDriver, DeviceInfo, PermissionModel, PermissionRecord};
use super::errors::{DriverError, DriverResult};
use super::retry::{with_rate_limit_retry, RetryPolicy};
use crate::constants::http::{MAX_PAGES, PAGE_LIMIT};
use crate::constants::training_load::{ACUTE_WINDOW_DAYS, CHRONIC_WINDOW_DAYS};
use crate::intelligence::hrv::summarize_readings;
use crate::intelligence::training_load::compute_training_load;
use crate::models::{
    HeartRateMetrics, PartialMetricBundle, PushEvent, RealtimeMetric, RealtimeSample,
    SampleOrigin, SyncResult, VendorRecovery, VendorType, Workout,
};
use crate::oauth2_client::{AuthorizedClient, OAuth2Credentials, TokenManager};
use crate::utils::physiology::{mean, valid_heart_rate};

const VENDOR: VendorType = VendorType::Whoop;

/// Timestamp format WHOOP expects for `start` / `end`
const WHOOP_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

fn whoop_time(at: DateTime<Utc>) -> String {
    at.format(WHOOP_TIME_FORMAT).to_string()
}

/// Driver for one WHOOP account
pub struct WhoopDriver {
    device_id: String,
    api_base_url: String,
    scopes: Vec<String>,
    client: AuthorizedClient,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    profile: RwLock<Option<WhoopUserProfile>>,
}

impl WhoopDriver {
    /// Create a driver; tokens are supplied at [`DeviceDriver::connect`]
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        api_base_url: impl Into<String>,
        scopes: Vec<String>,
        http: reqwest::Client,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            api_base_url: api_base_url.into(),
            scopes,
            client: AuthorizedClient::new(http, tokens, VENDOR),
            breaker: CircuitBreaker::new(VENDOR),
            retry: RetryPolicy::default(),
            profile: RwLock::new(None),
        }
    }

    /// Replace the circuit breaker
    #[must_use]
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    /// Replace the 429 retry policy
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Circuit breaker guarding this account's requests
    #[must_use]
    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn tokens(&self) -> &Arc<TokenManager> {
        self.client.tokens()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> DriverResult<T> {
        let url = self.url(path);
        let url = url.as_str();
        let client = &self.client;
        self.breaker
            .call(with_rate_limit_retry(&self.retry, || client.get_json(url, query)))
            .await
    }

    /// Follow `nextToken` until exhausted or the page cap is reached
    #[instrument(skip(self), fields(vendor = "whoop", device_id = %self.device_id))]
    async fn collect<T: DeserializeOwned>(
        &self,
        path: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DriverResult<Vec<T>> {
        let mut records = Vec::new();
        let mut next_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("start", whoop_time(start)),
                ("end", whoop_time(end)),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(token) = &next_token {
                query.push(("nextToken", token.clone()));
            }
            let page: WhoopPage<T> = self.get(path, &query).await?;
            records.extend(page.records);
            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => return Ok(records),
            }
        }
        warn!(path, pages = MAX_PAGES, "WHOOP pagination cap reached, results truncated");
        Ok(records)
    }

    /// Skip a category WHOOP refuses or returns garbage for; anything else fails the sync
    fn optional<T>(category: &str, result: DriverResult<Vec<T>>) -> DriverResult<Vec<T>> {
        match result {
            Err(DriverError::PermissionDenied { reason, .. }) => {
                warn!(category, %reason, "WHOOP scope missing, skipping category");
                Ok(Vec::new())
            }
            Err(DriverError::ParseError { reason, .. }) => {
                warn!(category, %reason, "WHOOP payload unreadable, skipping category");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn build_bundle(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DriverResult<(PartialMetricBundle, usize)> {
        let mut bundle = PartialMetricBundle::new(VENDOR, self.device_id.clone(), start, end);

        let load_start = start.min(end - Duration::days(CHRONIC_WINDOW_DAYS));
        let cycles: Vec<WhoopCycle> =
            Self::optional("cycle", self.collect("cycle", load_start, end).await)?;

        let baseline_start = start.min(end - Duration::days(ACUTE_WINDOW_DAYS));
        let recoveries: Vec<WhoopRecovery> =
            Self::optional("recovery", self.collect("recovery", baseline_start, end).await)?;

        let daily_start = start.min(end - Duration::days(1));
        let sleeps: Vec<WhoopSleep> =
            Self::optional("sleep", self.collect("activity/sleep", daily_start, end).await)?;

        let workouts: Vec<WhoopWorkout> =
            Self::optional("workout", self.collect("activity/workout", start, end).await)?;

        let items = cycles.len() + recoveries.len() + sleeps.len() + workouts.len();

        let strain_series: Vec<(DateTime<Utc>, f64)> = cycles
            .iter()
            .filter_map(|cycle| cycle.strain().map(|strain| (cycle.start, strain)))
            .collect();
        bundle.training_load = compute_training_load(&strain_series, end);

        let current: Vec<&WhoopCycle> = cycles
            .iter()
            .filter(|c| c.start < end && c.end.is_none_or(|e| e > daily_start))
            .collect();
        bundle.strain = current
            .iter()
            .filter(|c| c.strain().is_some())
            .max_by_key(|c| c.start)
            .and_then(|c| c.strain());
        let energy: Vec<f64> = current.iter().filter_map(|c| c.energy_kcal()).collect();
        bundle.calories_kcal = (!energy.is_empty()).then(|| energy.iter().sum());

        let scored: Vec<VendorRecovery> = recoveries
            .iter()
            .filter_map(WhoopRecovery::to_vendor_recovery)
            .collect();
        let latest_recovery = scored.iter().max_by_key(|r| r.measured_at).cloned();

        let hrv_readings: Vec<(DateTime<Utc>, f64)> = scored
            .iter()
            .filter_map(|r| r.hrv_ms.map(|ms| (r.measured_at, ms)))
            .collect();
        bundle.hrv = summarize_readings(&hrv_readings);

        bundle.heart_rate = Self::heart_rate(&current, latest_recovery.as_ref());
        bundle.recovery = latest_recovery;

        let nights: Vec<&WhoopSleep> = sleeps.iter().filter(|s| !s.nap && s.score.is_some()).collect();
        bundle.sleep = nights
            .iter()
            .max_by_key(|s| s.end)
            .map(|s| s.to_sleep_metrics(nights.len()));

        bundle.workouts = workouts.iter().map(WhoopWorkout::to_summary).collect();

        Ok((bundle, items))
    }

    fn heart_rate(cycles: &[&WhoopCycle], recovery: Option<&VendorRecovery>) -> Option<HeartRateMetrics> {
        let averages: Vec<f64> = cycles
            .iter()
            .filter_map(|c| c.score.as_ref().and_then(|s| s.average_heart_rate))
            .filter_map(valid_heart_rate)
            .collect();
        let max_bpm = cycles
            .iter()
            .filter_map(|c| c.score.as_ref().and_then(|s| s.max_heart_rate))
            .filter_map(valid_heart_rate)
            .reduce(f64::max);
        let resting_bpm = recovery.and_then(|r| r.resting_heart_rate).and_then(valid_heart_rate);

        let average_bpm = mean(&averages).or(resting_bpm)?;
        Some(HeartRateMetrics {
            average_bpm,
            min_bpm: None,
            max_bpm,
            resting_bpm,
            latest_bpm: None,
            zones: None,
            sample_count: averages.len(),
        })
    }

    fn sample(&self, metric: RealtimeMetric, value: f64, recorded_at: DateTime<Utc>) -> RealtimeSample {
        RealtimeSample {
            device_id: self.device_id.clone(),
            vendor: VENDOR,
            metric,
            value,
            recorded_at,
            origin: SampleOrigin::Webhook,
        }
    }

    fn granted_scopes(&self, credentials_scopes: &[String]) -> Vec<String> {
        if credentials_scopes.is_empty() {
            self.scopes.clone()
        } else {
            credentials_scopes.to_vec()
        }
    }
}

#[async_trait]
impl DeviceDriver for WhoopDriver {
    fn vendor(&self) -> VendorType {
        VENDOR
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    #[instrument(skip(self, options), fields(vendor = "whoop", device_id = %self.device_id))]
    async fn connect(&self, options: &ConnectOptions) -> DriverResult<bool> {
        if let Some(credentials) = &options.credentials {
            self.tokens().set_credentials(credentials.clone()).await;
        } else if let Some(code) = &options.authorization_code {
            let grant = self.tokens().exchange().exchange_code(code).await?;
            self.tokens()
                .set_credentials(grant.into_credentials(Utc::now()))
                .await;
        } else if self.tokens().credentials().await.is_none() {
            return Err(DriverError::AuthenticationFailed {
                vendor: VENDOR,
                reason: "no stored tokens or authorization code".to_owned(),
            });
        }

        match self.get::<WhoopUserProfile>("user/profile/basic", &[]).await {
            Ok(profile) => {
                info!(whoop_user_id = profile.user_id, "WHOOP account connected");
                *self.profile.write().await = Some(profile);
                Ok(true)
            }
            Err(error) => {
                self.tokens().clear().await;
                Err(error)
            }
        }
    }

    async fn disconnect(&self) -> DriverResult<()> {
        *self.profile.write().await = None;
        if let Some(credentials) = self.tokens().clear().await {
            if let Err(error) = self.tokens().exchange().revoke(&credentials.access_token).await {
                warn!(device_id = %self.device_id, %error, "WHOOP token revocation failed");
            }
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.tokens().credentials().await.is_some()
    }

    async fn request_permissions(&self) -> DriverResult<PermissionRecord> {
        self.check_permissions().await
    }

    async fn check_permissions(&self) -> DriverResult<PermissionRecord> {
        let Some(credentials) = self.tokens().credentials().await else {
            return Ok(PermissionRecord::denied(
                PermissionModel::OAuthScopes,
                Vec::new(),
                self.scopes.clone(),
            ));
        };
        let granted = self.granted_scopes(&credentials.scopes);
        let missing: Vec<String> = self
            .scopes
            .iter()
            .filter(|scope| !granted.contains(scope))
            .cloned()
            .collect();
        let mut record = PermissionRecord::granted(PermissionModel::OAuthScopes, granted);
        record.missing = missing;
        Ok(record)
    }

    #[instrument(skip(self), fields(vendor = "whoop", device_id = %self.device_id))]
    async fn sync_data(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SyncResult {
        if !self.is_connected().await {
            let error = DriverError::NotConnected { vendor: VENDOR };
            return SyncResult::failed(self.device_id.clone(), VENDOR, start, end, error.to_sync_error());
        }

        match self.build_bundle(start, end).await {
            Ok((bundle, items)) => {
                debug!(items, fields = ?bundle.populated_fields(), "WHOOP sync mapped");
                SyncResult::succeeded(bundle, items)
            }
            Err(error) => {
                warn!(%error, "WHOOP sync failed");
                SyncResult::failed(self.device_id.clone(), VENDOR, start, end, error.to_sync_error())
            }
        }
    }

    async fn export_workout(&self, _workout: &Workout) -> DriverResult<bool> {
        Ok(false)
    }

    async fn device_info(&self) -> DriverResult<DeviceInfo> {
        let mut info = DeviceInfo::for_vendor(VENDOR);
        if let Some(profile) = self.profile.read().await.as_ref() {
            info.account_id = Some(profile.user_id.to_string());
            let name = [profile.first_name.as_deref(), profile.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if !name.is_empty() {
                info.name = format!("WHOOP ({name})");
            }
        }
        Ok(info)
    }

    async fn credentials(&self) -> Option<OAuth2Credentials> {
        self.client.tokens().credentials().await
    }

    #[instrument(skip(self), fields(vendor = "whoop", device_id = %self.device_id))]
    async fn recovery_metrics(&self) -> DriverResult<VendorRecovery> {
        let page: WhoopPage<WhoopRecovery> =
            self.get("recovery", &[("limit", "1".to_owned())]).await?;
        page.records
            .iter()
            .find_map(WhoopRecovery::to_vendor_recovery)
            .ok_or_else(|| DriverError::ParseError {
                vendor: VENDOR,
                field: "recovery".to_owned(),
                reason: "no scored recovery available".to_owned(),
            })
    }

    #[instrument(skip(self, event), fields(vendor = "whoop", event_type = %event.event_type))]
    async fn resolve_push_event(&self, event: &PushEvent) -> DriverResult<Option<RealtimeSample>> {
        if event.vendor != VENDOR {
            return Ok(None);
        }
        let Some(event_type) = WhoopEventType::parse(&event.event_type) else {
            return Ok(None);
        };

        let sample = match event_type {
            WhoopEventType::RecoveryUpdated => match self.recovery_metrics().await {
                Ok(recovery) => Some(self.sample(
                    RealtimeMetric::Recovery,
                    recovery.score,
                    recovery.measured_at,
                )),
                Err(DriverError::ParseError { .. }) => None,
                Err(error) => return Err(error),
            },
            WhoopEventType::StrainUpdated => {
                let page: WhoopPage<WhoopCycle> =
                    self.get("cycle", &[("limit", "1".to_owned())]).await?;
                page.records.first().and_then(|cycle| {
                    cycle.strain().map(|strain| {
                        self.sample(RealtimeMetric::Strain, strain, cycle.end.unwrap_or_else(Utc::now))
                    })
                })
            }
            WhoopEventType::SleepUpdated => {
                let sleep: WhoopSleep = self
                    .get(&format!("activity/sleep/{}", event.resource_id), &[])
                    .await?;
                sleep
                    .performance()
                    .map(|score| self.sample(RealtimeMetric::Sleep, score, sleep.end))
            }
            WhoopEventType::WorkoutCreated | WhoopEventType::WorkoutUpdated => {
                let workout: WhoopWorkout = self
                    .get(&format!("activity/workout/{}", event.resource_id), &[])
                    .await?;
                workout
                    .strain()
                    .map(|strain| self.sample(RealtimeMetric::Workout, strain, workout.end))
            }
        };
        Ok(sample)
    }
}
