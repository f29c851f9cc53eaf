// ABOUTME: Boundary to the vendor-managed on-device health store
// ABOUTME: Data types, the fixed read/write scope bundle, sample shapes and the query trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Workout;

/// Data types the health store exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthDataType {
    /// Workout sessions
    Workouts,
    /// Step count
    Steps,
    /// Walking and running distance in meters
    DistanceWalkingRunning,
    /// Active energy in kcal
    ActiveEnergyBurned,
    /// Basal energy in kcal
    BasalEnergyBurned,
    /// Heart rate in bpm
    HeartRate,
    /// Resting heart rate in bpm
    RestingHeartRate,
    /// HRV (SDNN) in ms
    HeartRateVariability,
    /// Sleep analysis categories
    SleepAnalysis,
    /// Exercise minutes
    ExerciseTime,
    /// Body mass in kg
    BodyMass,
    /// Body fat percentage
    BodyFatPercentage,
    /// Height in meters
    Height,
    /// Dietary energy in kcal
    DietaryEnergy,
    /// Dietary protein in grams
    DietaryProtein,
    /// Water in liters
    DietaryWater,
}

impl HealthDataType {
    /// Platform identifier
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::Workouts => "workout",
            Self::Steps => "step_count",
            Self::DistanceWalkingRunning => "distance_walking_running",
            Self::ActiveEnergyBurned => "active_energy_burned",
            Self::BasalEnergyBurned => "basal_energy_burned",
            Self::HeartRate => "heart_rate",
            Self::RestingHeartRate => "resting_heart_rate",
            Self::HeartRateVariability => "heart_rate_variability_sdnn",
            Self::SleepAnalysis => "sleep_analysis",
            Self::ExerciseTime => "apple_exercise_time",
            Self::BodyMass => "body_mass",
            Self::BodyFatPercentage => "body_fat_percentage",
            Self::Height => "height",
            Self::DietaryEnergy => "dietary_energy_consumed",
            Self::DietaryProtein => "dietary_protein",
            Self::DietaryWater => "dietary_water",
        }
    }
}

/// Types requested for reading in the single permission prompt
pub const READ_SCOPE: [HealthDataType; 16] = [
    HealthDataType::Workouts,
    HealthDataType::Steps,
    HealthDataType::DistanceWalkingRunning,
    HealthDataType::ActiveEnergyBurned,
    HealthDataType::BasalEnergyBurned,
    HealthDataType::HeartRate,
    HealthDataType::RestingHeartRate,
    HealthDataType::HeartRateVariability,
    HealthDataType::SleepAnalysis,
    HealthDataType::ExerciseTime,
    HealthDataType::BodyMass,
    HealthDataType::BodyFatPercentage,
    HealthDataType::Height,
    HealthDataType::DietaryEnergy,
    HealthDataType::DietaryProtein,
    HealthDataType::DietaryWater,
];

/// Types requested for writing in the single permission prompt
pub const WRITE_SCOPE: [HealthDataType; 5] = [
    HealthDataType::Workouts,
    HealthDataType::ActiveEnergyBurned,
    HealthDataType::DistanceWalkingRunning,
    HealthDataType::HeartRate,
    HealthDataType::BodyMass,
];

/// Per-type authorization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked
    NotDetermined,
    /// Access granted
    Authorized,
    /// Access denied
    Denied,
}

/// One numeric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitySample {
    /// Data type
    pub data_type: HealthDataType,
    /// Value in the type's canonical unit
    pub value: f64,
    /// Sample start
    pub start: DateTime<Utc>,
    /// Sample end
    pub end: DateTime<Utc>,
    /// Recording app or device
    pub source_name: Option<String>,
}

/// Sleep analysis category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepValue {
    /// In bed, sleep state unknown
    InBed,
    /// Asleep, stage unknown
    Asleep,
    /// Core (light) sleep
    Core,
    /// Deep sleep
    Deep,
    /// REM sleep
    Rem,
    /// Awake
    Awake,
}

impl SleepValue {
    /// Whether the category counts as sleep
    #[must_use]
    pub const fn is_asleep(self) -> bool {
        matches!(self, Self::Asleep | Self::Core | Self::Deep | Self::Rem)
    }
}

/// One sleep analysis sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSample {
    /// Category
    pub value: SleepValue,
    /// Sample start
    pub start: DateTime<Utc>,
    /// Sample end
    pub end: DateTime<Utc>,
}

/// Health store query failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HealthStoreError {
    /// Health data is not available on this device
    #[error("health data is not available on this device")]
    Unavailable,
    /// The user has not authorized the type
    #[error("not authorized to access {}", .0.identifier())]
    NotAuthorized(HealthDataType),
    /// The platform rejected the query
    #[error("health store query failed: {0}")]
    Query(String),
}

/// Platform health store
#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Whether health data exists on this device at all
    fn is_available(&self) -> bool;

    /// Present the permission prompt for the given scopes; `false` if dismissed
    async fn request_authorization(
        &self,
        read: &[HealthDataType],
        write: &[HealthDataType],
    ) -> Result<bool, HealthStoreError>;

    /// Authorization state of one type
    async fn authorization_status(&self, data_type: HealthDataType) -> AuthorizationStatus;

    /// Numeric samples overlapping `[start, end)`, oldest first
    async fn quantity_samples(
        &self,
        data_type: HealthDataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<QuantitySample>, HealthStoreError>;

    /// Sleep samples overlapping `[start, end)`, oldest first
    async fn sleep_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SleepSample>, HealthStoreError>;

    /// Workouts starting in `[start, end)`
    async fn workouts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Workout>, HealthStoreError>;

    /// Save a workout session
    async fn save_workout(&self, workout: &Workout) -> Result<(), HealthStoreError>;

    /// Most recent sample of a type
    async fn latest_quantity(
        &self,
        data_type: HealthDataType,
    ) -> Result<Option<QuantitySample>, HealthStoreError>;
}

/// Store used on hosts without health data
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableHealthStore;

#[async_trait]
impl HealthStore for UnavailableHealthStore {
    fn is_available(&self) -> bool {
        false
    }

    async fn request_authorization(
        &self,
        _read: &[HealthDataType],
        _write: &[HealthDataType],
    ) -> Result<bool, HealthStoreError> {
        Err(HealthStoreError::Unavailable)
    }

    async fn authorization_status(&self, _data_type: HealthDataType) -> AuthorizationStatus {
        AuthorizationStatus::NotDetermined
    }

    async fn quantity_samples(
        &self,
        _data_type: HealthDataType,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: Option<usize>,
    ) -> Result<Vec<QuantitySample>, HealthStoreError> {
        Err(HealthStoreError::Unavailable)
    }

    async fn sleep_samples(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<SleepSample>, HealthStoreError> {
        Err(HealthStoreError::Unavailable)
    }

    async fn workouts(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Workout>, HealthStoreError> {
        Err(HealthStoreError::Unavailable)
    }

    async fn save_workout(&self, _workout: &Workout) -> Result<(), HealthStoreError> {
        Err(HealthStoreError::Unavailable)
    }

    async fn latest_quantity(
        &self,
        _data_type: HealthDataType,
    ) -> Result<Option<QuantitySample>, HealthStoreError> {
        Err(HealthStoreError::Unavailable)
    }
}
