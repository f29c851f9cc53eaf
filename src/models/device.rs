// ABOUTME: Device identity, connection state, sync configuration and live status
// ABOUTME: A Device is created when a vendor account is linked and mutated on every sync
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capabilities::DeviceCapabilities;
use crate::constants::{quality, sync, vendors};
use crate::errors::AppError;

/// Supported wearable vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorType {
    /// On-device platform health store
    HealthStore,
    /// WHOOP cloud API
    Whoop,
    /// Garmin Connect
    Garmin,
    /// Fitbit Web API
    Fitbit,
    /// Google Fit
    GoogleFit,
}

impl VendorType {
    /// Every supported vendor
    pub const ALL: [Self; 5] = [
        Self::HealthStore,
        Self::Whoop,
        Self::Garmin,
        Self::Fitbit,
        Self::GoogleFit,
    ];

    /// Stable identifier used in logs and persisted records
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HealthStore => vendors::HEALTH_STORE,
            Self::Whoop => vendors::WHOOP,
            Self::Garmin => vendors::GARMIN,
            Self::Fitbit => vendors::FITBIT,
            Self::GoogleFit => vendors::GOOGLE_FIT,
        }
    }

    /// Human-readable vendor name
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::HealthStore => "Apple Health",
            Self::Whoop => "WHOOP",
            Self::Garmin => "Garmin",
            Self::Fitbit => "Fitbit",
            Self::GoogleFit => "Google Fit",
        }
    }

    /// Whether the vendor authenticates through OAuth
    #[must_use]
    pub const fn uses_oauth(self) -> bool {
        !matches!(self, Self::HealthStore)
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "apple_health" | "health_store" | "healthkit" => Ok(Self::HealthStore),
            "whoop" => Ok(Self::Whoop),
            "garmin" => Ok(Self::Garmin),
            "fitbit" => Ok(Self::Fitbit),
            "google_fit" | "googlefit" => Ok(Self::GoogleFit),
            other => Err(AppError::invalid_input(format!("Unknown vendor: {other}"))),
        }
    }
}

/// Connection lifecycle of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Connected and usable
    Connected,
    /// Last operation left the device unusable (auth or permission failure)
    Error,
}

/// Data-quality grade derived from the share of expected fields the last sync populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataQuality {
    /// 90 % or more
    A,
    /// 75 % or more
    B,
    /// 50 % or more
    C,
    /// 25 % or more
    D,
    /// Below 25 %
    F,
    /// Never synced
    #[default]
    Unknown,
}

impl DataQuality {
    /// Grade a coverage fraction in [0, 1]
    #[must_use]
    pub fn from_coverage(coverage: f64) -> Self {
        if coverage >= quality::GRADE_A {
            Self::A
        } else if coverage >= quality::GRADE_B {
            Self::B
        } else if coverage >= quality::GRADE_C {
            Self::C
        } else if coverage >= quality::GRADE_D {
            Self::D
        } else {
            Self::F
        }
    }
}

/// How often a device should be synced automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncFrequency {
    /// Every 15 minutes
    Realtime,
    /// Every hour
    #[default]
    Hourly,
    /// Once a day
    Daily,
    /// Only on explicit request
    Manual,
}

impl SyncFrequency {
    /// Interval between automatic syncs, `None` for manual
    #[must_use]
    pub fn interval(self) -> Option<chrono::Duration> {
        match self {
            Self::Realtime => Some(chrono::Duration::seconds(sync::REALTIME_TIER_SECS)),
            Self::Hourly => Some(chrono::Duration::seconds(sync::HOURLY_TIER_SECS)),
            Self::Daily => Some(chrono::Duration::seconds(sync::DAILY_TIER_SECS)),
            Self::Manual => None,
        }
    }
}

/// Network conditions under which automatic syncs may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetworkConstraint {
    /// Any connection
    #[default]
    Any,
    /// Only on unmetered (Wi-Fi) connections
    UnmeteredOnly,
}

/// What to do when a device disagrees with values already held from other devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPreference {
    /// Let the priority rules decide
    #[default]
    PreferDevice,
    /// Keep the values already held, drop this device's conflicting fields
    PreferLocal,
    /// Withhold conflicting fields until the user decides
    Manual,
}

bitflags! {
    /// Data categories a device is asked to pull
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DataCategories: u16 {
        /// Heart rate and HRV
        const HEART = 1 << 0;
        /// Sleep
        const SLEEP = 1 << 1;
        /// Steps, distance, calories, active minutes
        const ACTIVITY = 1 << 2;
        /// Recovery, readiness, strain, training load
        const RECOVERY = 1 << 3;
        /// Workout sessions
        const WORKOUTS = 1 << 4;
    }
}

impl Default for DataCategories {
    fn default() -> Self {
        Self::all()
    }
}

/// Per-device sync policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether the scheduler syncs this device automatically
    pub auto_sync: bool,
    /// Frequency tier for automatic syncs
    pub frequency: SyncFrequency,
    /// Network constraint for automatic syncs
    pub network: NetworkConstraint,
    /// Categories to pull
    pub categories: DataCategories,
    /// Conflict resolution preference
    pub conflict_preference: ConflictPreference,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            frequency: SyncFrequency::default(),
            network: NetworkConstraint::default(),
            categories: DataCategories::all(),
            conflict_preference: ConflictPreference::default(),
        }
    }
}

/// Live status of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceStatus {
    /// Whether the driver currently holds a session
    pub connected: bool,
    /// Whether a sync is outstanding
    pub syncing: bool,
    /// Message of the last failed operation
    pub last_error: Option<String>,
    /// Fields withheld pending a manual conflict decision
    pub pending_items: usize,
    /// Data-quality grade of the last successful sync
    pub data_quality: DataQuality,
}

/// A linked wearable source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique identifier within the registry
    pub id: String,
    /// Vendor
    pub vendor: VendorType,
    /// Display name
    pub name: String,
    /// Hardware model if the vendor reports one
    pub model: Option<String>,
    /// Connection lifecycle
    pub connection_state: ConnectionState,
    /// Start of the last sync attempt
    pub last_sync_attempt: Option<DateTime<Utc>>,
    /// End of the window covered by the last successful sync
    pub last_successful_sync: Option<DateTime<Utc>>,
    /// Battery percentage if reported
    pub battery_level: Option<u8>,
    /// Static vendor capabilities
    pub capabilities: DeviceCapabilities,
    /// Sync policy
    pub sync_config: SyncConfig,
    /// Live status
    pub status: DeviceStatus,
    /// When the device was linked
    pub added_at: DateTime<Utc>,
}

impl Device {
    /// Whether the scheduler should sync this device now
    #[must_use]
    pub fn auto_sync_due(&self, now: DateTime<Utc>, on_metered_network: bool) -> bool {
        if !self.sync_config.auto_sync || self.connection_state != ConnectionState::Connected {
            return false;
        }
        if on_metered_network && self.sync_config.network == NetworkConstraint::UnmeteredOnly {
            return false;
        }
        let Some(interval) = self.sync_config.frequency.interval() else {
            return false;
        };
        self.last_sync_attempt
            .is_none_or(|last| now - last >= interval)
    }
}

/// Convert a `std` duration to a chrono duration, saturating on overflow
#[must_use]
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(3650))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_round_trips_through_str() {
        for vendor in VendorType::ALL {
            assert_eq!(vendor.as_str().parse::<VendorType>().ok(), Some(vendor));
        }
        assert!("polar".parse::<VendorType>().is_err());
    }

    #[test]
    fn test_data_quality_grades() {
        assert_eq!(DataQuality::from_coverage(1.0), DataQuality::A);
        assert_eq!(DataQuality::from_coverage(0.8), DataQuality::B);
        assert_eq!(DataQuality::from_coverage(0.5), DataQuality::C);
        assert_eq!(DataQuality::from_coverage(0.3), DataQuality::D);
        assert_eq!(DataQuality::from_coverage(0.0), DataQuality::F);
    }

    #[test]
    fn test_manual_frequency_never_due() {
        assert!(SyncFrequency::Manual.interval().is_none());
        assert_eq!(
            SyncFrequency::Realtime.interval(),
            Some(chrono::Duration::minutes(15))
        );
    }
}
