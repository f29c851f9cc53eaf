// ABOUTME: Core DeviceDriver trait every wearable vendor implements
// ABOUTME: Connection lifecycle, permissions, windowed sync, export and optional live sampling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Device Driver Interface
//!
//! One implementation per vendor, selected by a [`super::DriverFactory`] keyed on
//! [`VendorType`]. The manager never looks past this trait.
//!
//! ## Contract
//!
//! - [`DeviceDriver::capabilities`] is static per vendor and a driver never reports a
//!   bundle field outside it.
//! - [`DeviceDriver::sync_data`] never fails for partial data; missing categories are
//!   absent fields. Only connectivity and auth failures produce a failed result.
//! - Optional operations default to [`DriverError::UnsupportedFeature`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{DriverError, DriverResult};
use crate::models::{
    DeviceCapabilities, PushEvent, RealtimeSample, SyncResult, VendorRecovery, VendorType,
    Workout, WorkoutActivity,
};
use crate::oauth2_client::OAuth2Credentials;

/// Inputs for establishing a vendor session
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Previously issued tokens
    pub credentials: Option<OAuth2Credentials>,
    /// Authorization code returned by the vendor's consent screen
    pub authorization_code: Option<String>,
}

impl ConnectOptions {
    /// Connect with stored tokens
    #[must_use]
    pub const fn with_credentials(credentials: OAuth2Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            authorization_code: None,
        }
    }

    /// Connect by exchanging an authorization code
    #[must_use]
    pub fn with_authorization_code(code: impl Into<String>) -> Self {
        Self {
            credentials: None,
            authorization_code: Some(code.into()),
        }
    }
}

/// How permissions were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionModel {
    /// Platform prompt for a fixed read/write scope
    PlatformPrompt,
    /// Implied by the OAuth scopes granted at connect
    OAuthScopes,
    /// Not applicable (unimplemented vendor)
    None,
}

/// Outcome of a permission request or check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Whether the driver may read data
    pub granted: bool,
    /// How permissions were obtained
    pub model: PermissionModel,
    /// Scopes or data types covered
    pub scopes: Vec<String>,
    /// Scopes requested but missing
    pub missing: Vec<String>,
    /// When the record was produced
    pub checked_at: DateTime<Utc>,
}

impl PermissionRecord {
    /// Granted record
    #[must_use]
    pub fn granted(model: PermissionModel, scopes: Vec<String>) -> Self {
        Self {
            granted: true,
            model,
            scopes,
            missing: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    /// Denied record
    #[must_use]
    pub fn denied(model: PermissionModel, scopes: Vec<String>, missing: Vec<String>) -> Self {
        Self {
            granted: false,
            model,
            scopes,
            missing,
            checked_at: Utc::now(),
        }
    }
}

/// Display metadata for a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Display name
    pub name: String,
    /// Manufacturer
    pub manufacturer: String,
    /// Hardware model
    pub model: Option<String>,
    /// Firmware version
    pub firmware_version: Option<String>,
    /// Battery percentage
    pub battery_level: Option<u8>,
    /// Vendor account id
    pub account_id: Option<String>,
}

impl DeviceInfo {
    /// Minimal info for a vendor
    #[must_use]
    pub fn for_vendor(vendor: VendorType) -> Self {
        Self {
            name: vendor.display_name().to_owned(),
            manufacturer: vendor.display_name().to_owned(),
            model: None,
            firmware_version: None,
            battery_level: None,
            account_id: None,
        }
    }
}

/// Core wearable driver trait
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Vendor this driver talks to
    fn vendor(&self) -> VendorType;

    /// Registry id of the device this driver serves
    fn device_id(&self) -> &str;

    /// Static capability set
    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities::for_vendor(self.vendor())
    }

    /// Establish a vendor session; idempotent
    async fn connect(&self, options: &ConnectOptions) -> DriverResult<bool>;

    /// Drop the vendor session
    async fn disconnect(&self) -> DriverResult<()>;

    /// Whether a session is held
    async fn is_connected(&self) -> bool;

    /// Ask the user for access
    async fn request_permissions(&self) -> DriverResult<PermissionRecord>;

    /// Re-read the current permission state
    async fn check_permissions(&self) -> DriverResult<PermissionRecord>;

    /// Fetch and map samples for `[start, end)`
    async fn sync_data(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SyncResult;

    /// Write a workout back; `false` when the vendor cannot accept it
    async fn export_workout(&self, workout: &Workout) -> DriverResult<bool>;

    /// Display metadata
    async fn device_info(&self) -> DriverResult<DeviceInfo>;

    /// Latest vendor recovery reading
    async fn recovery_metrics(&self) -> DriverResult<VendorRecovery> {
        Err(DriverError::unsupported(self.vendor(), "recovery_metrics"))
    }

    /// Start a live workout session
    async fn start_workout_session(&self, activity: WorkoutActivity) -> DriverResult<()> {
        let _ = activity;
        Err(DriverError::unsupported(self.vendor(), "workout_sessions"))
    }

    /// End the live workout session, returning the recorded workout
    async fn end_workout_session(&self) -> DriverResult<Option<Workout>> {
        Err(DriverError::unsupported(self.vendor(), "workout_sessions"))
    }

    /// Poll interval for live sampling, `None` if the driver cannot be polled
    fn realtime_interval(&self) -> Option<Duration> {
        None
    }

    /// Most recent live sample
    async fn latest_sample(&self) -> DriverResult<Option<RealtimeSample>> {
        Err(DriverError::unsupported(self.vendor(), "realtime_sampling"))
    }

    /// Tokens to persist so the device reconnects after a restart
    async fn credentials(&self) -> Option<OAuth2Credentials> {
        None
    }

    /// Resolve a vendor push notification into a live sample
    async fn resolve_push_event(&self, event: &PushEvent) -> DriverResult<Option<RealtimeSample>> {
        let _ = event;
        Err(DriverError::unsupported(self.vendor(), "push_events"))
    }
}
