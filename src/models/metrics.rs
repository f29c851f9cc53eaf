// ABOUTME: Vendor-neutral metric value types and the sparse per-driver partial bundle
// ABOUTME: Every driver fills a subset of PartialMetricBundle; absent fields mean no data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capabilities::DeviceCapabilities;
use super::device::{DataCategories, VendorType};
use super::workout::WorkoutSummary;

/// Heart rate summary for a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateMetrics {
    /// Mean heart rate
    pub average_bpm: f64,
    /// Lowest observed heart rate
    pub min_bpm: Option<f64>,
    /// Highest observed heart rate
    pub max_bpm: Option<f64>,
    /// Resting heart rate
    pub resting_bpm: Option<f64>,
    /// Most recent observation
    pub latest_bpm: Option<f64>,
    /// Zones derived from the observed max
    pub zones: Option<HeartRateZones>,
    /// Number of samples summarized
    pub sample_count: usize,
}

/// Five heart rate zones with their lower bounds and sample distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateZones {
    /// Max heart rate the zones are derived from
    pub max_heart_rate: f64,
    /// Lower bound of each zone in bpm
    pub lower_bounds_bpm: [f64; 5],
    /// Samples that fell in each zone
    pub samples_in_zone: [usize; 5],
}

/// Direction of HRV relative to its recent baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HrvTrend {
    /// More than 5 % above baseline
    Improving,
    /// Within 5 % of baseline
    Stable,
    /// More than 5 % below baseline
    Declining,
}

/// Heart rate variability summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    /// Mean HRV over the window in milliseconds
    pub average_ms: f64,
    /// Most recent HRV reading
    pub latest_ms: f64,
    /// Trend of the latest reading against the window mean
    pub trend: Option<HrvTrend>,
    /// Number of readings summarized
    pub sample_count: usize,
}

/// Minutes per sleep stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SleepStages {
    /// Deep (slow wave) sleep
    pub deep_minutes: f64,
    /// Light (core) sleep
    pub light_minutes: f64,
    /// REM sleep
    pub rem_minutes: f64,
    /// Awake while in bed
    pub awake_minutes: f64,
}

/// Summary of the most recent night in the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepMetrics {
    /// Night start
    pub start: DateTime<Utc>,
    /// Night end
    pub end: DateTime<Utc>,
    /// Minutes asleep
    pub total_sleep_minutes: f64,
    /// Minutes in bed
    pub time_in_bed_minutes: f64,
    /// Asleep / in bed, in percent
    pub efficiency_percent: f64,
    /// 0-100 sleep score
    pub score: Option<f64>,
    /// Stage breakdown
    pub stages: Option<SleepStages>,
    /// Nights observed in the window
    pub nights_in_window: usize,
}

impl SleepMetrics {
    /// Hours asleep
    #[must_use]
    pub fn total_sleep_hours(&self) -> f64 {
        self.total_sleep_minutes / 60.0
    }
}

/// A vendor's own recovery reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRecovery {
    /// 0-100 recovery score
    pub score: f64,
    /// Resting heart rate behind the score
    pub resting_heart_rate: Option<f64>,
    /// HRV behind the score
    pub hrv_ms: Option<f64>,
    /// Skin temperature
    pub skin_temp_celsius: Option<f64>,
    /// Blood oxygen saturation
    pub spo2_percent: Option<f64>,
    /// When the vendor scored it
    pub measured_at: DateTime<Utc>,
}

/// Acute:chronic training-load classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingLoadStatus {
    /// Ratio above 1.5
    Overreaching,
    /// Ratio above 1.2
    Productive,
    /// Ratio above 0.8
    Maintaining,
    /// Ratio above 0.5
    Recovery,
    /// Ratio at or below 0.5
    Detraining,
}

/// Acute:chronic training load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingLoad {
    /// Trailing 7-day mean strain
    pub acute: f64,
    /// Trailing 28-day mean strain
    pub chronic: f64,
    /// Acute / chronic
    pub ratio: f64,
    /// Classification of the ratio
    pub status: TrainingLoadStatus,
    /// Fixed guidance for the status
    pub recommendation: String,
}

/// Every field a bundle may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    /// Heart rate summary
    HeartRate,
    /// HRV summary
    Hrv,
    /// Sleep summary
    Sleep,
    /// Energy expenditure
    Calories,
    /// Steps
    Steps,
    /// Distance
    Distance,
    /// Active minutes
    ActiveMinutes,
    /// Vendor recovery
    Recovery,
    /// Vendor readiness
    Readiness,
    /// Vendor strain
    Strain,
    /// Training load
    TrainingLoad,
    /// Workout sessions
    Workouts,
}

impl MetricField {
    /// Every field
    pub const ALL: [Self; 12] = [
        Self::HeartRate,
        Self::Hrv,
        Self::Sleep,
        Self::Calories,
        Self::Steps,
        Self::Distance,
        Self::ActiveMinutes,
        Self::Recovery,
        Self::Readiness,
        Self::Strain,
        Self::TrainingLoad,
        Self::Workouts,
    ];

    /// Field name used in logs and conflicts
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate",
            Self::Hrv => "hrv",
            Self::Sleep => "sleep",
            Self::Calories => "calories",
            Self::Steps => "steps",
            Self::Distance => "distance",
            Self::ActiveMinutes => "active_minutes",
            Self::Recovery => "recovery",
            Self::Readiness => "readiness",
            Self::Strain => "strain",
            Self::TrainingLoad => "training_load",
            Self::Workouts => "workouts",
        }
    }

    /// Capability a driver must declare to contribute this field
    #[must_use]
    pub const fn required_capability(self) -> DeviceCapabilities {
        match self {
            Self::HeartRate => DeviceCapabilities::HEART_RATE,
            Self::Hrv => DeviceCapabilities::HRV,
            Self::Sleep => DeviceCapabilities::SLEEP,
            Self::Calories => DeviceCapabilities::CALORIES,
            Self::Steps => DeviceCapabilities::STEPS,
            Self::Distance => DeviceCapabilities::DISTANCE,
            Self::ActiveMinutes => DeviceCapabilities::ACTIVE_MINUTES,
            Self::Recovery => DeviceCapabilities::RECOVERY,
            Self::Readiness => DeviceCapabilities::READINESS,
            Self::Strain => DeviceCapabilities::STRAIN,
            Self::TrainingLoad => DeviceCapabilities::TRAINING_LOAD,
            Self::Workouts => DeviceCapabilities::WORKOUTS,
        }
    }

    /// Data category the field belongs to
    #[must_use]
    pub const fn category(self) -> DataCategories {
        match self {
            Self::HeartRate | Self::Hrv => DataCategories::HEART,
            Self::Sleep => DataCategories::SLEEP,
            Self::Calories | Self::Steps | Self::Distance | Self::ActiveMinutes => {
                DataCategories::ACTIVITY
            }
            Self::Recovery | Self::Readiness | Self::Strain | Self::TrainingLoad => {
                DataCategories::RECOVERY
            }
            Self::Workouts => DataCategories::WORKOUTS,
        }
    }

    /// Fields combined by taking the maximum across devices
    #[must_use]
    pub const fn is_cumulative(self) -> bool {
        matches!(
            self,
            Self::Steps | Self::Distance | Self::Calories | Self::ActiveMinutes
        )
    }
}

/// Output of one driver's sync call for one window
///
/// Sparse: only fields the vendor returned are `Some`. Tagged with the
/// contributing vendor and device so the aggregator can attribute every value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialMetricBundle {
    /// Contributing vendor
    pub vendor: VendorType,
    /// Contributing device
    pub device_id: String,
    /// Window start
    pub window_start: DateTime<Utc>,
    /// Window end
    pub window_end: DateTime<Utc>,
    /// Heart rate
    pub heart_rate: Option<HeartRateMetrics>,
    /// HRV
    pub hrv: Option<HrvMetrics>,
    /// Sleep
    pub sleep: Option<SleepMetrics>,
    /// Energy expenditure in kcal
    pub calories_kcal: Option<f64>,
    /// Steps
    pub steps: Option<u64>,
    /// Distance in meters
    pub distance_meters: Option<f64>,
    /// Active minutes
    pub active_minutes: Option<f64>,
    /// Vendor recovery
    pub recovery: Option<VendorRecovery>,
    /// Vendor readiness (0-100)
    pub readiness: Option<f64>,
    /// Vendor strain
    pub strain: Option<f64>,
    /// Training load
    pub training_load: Option<TrainingLoad>,
    /// Workouts recorded in the window
    pub workouts: Vec<WorkoutSummary>,
}

impl PartialMetricBundle {
    /// Empty bundle for a window
    #[must_use]
    pub fn new(
        vendor: VendorType,
        device_id: impl Into<String>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Self {
        Self {
            vendor,
            device_id: device_id.into(),
            window_start,
            window_end,
            heart_rate: None,
            hrv: None,
            sleep: None,
            calories_kcal: None,
            steps: None,
            distance_meters: None,
            active_minutes: None,
            recovery: None,
            readiness: None,
            strain: None,
            training_load: None,
            workouts: Vec::new(),
        }
    }

    /// Whether the field holds a value
    #[must_use]
    pub fn has(&self, field: MetricField) -> bool {
        match field {
            MetricField::HeartRate => self.heart_rate.is_some(),
            MetricField::Hrv => self.hrv.is_some(),
            MetricField::Sleep => self.sleep.is_some(),
            MetricField::Calories => self.calories_kcal.is_some(),
            MetricField::Steps => self.steps.is_some(),
            MetricField::Distance => self.distance_meters.is_some(),
            MetricField::ActiveMinutes => self.active_minutes.is_some(),
            MetricField::Recovery => self.recovery.is_some(),
            MetricField::Readiness => self.readiness.is_some(),
            MetricField::Strain => self.strain.is_some(),
            MetricField::TrainingLoad => self.training_load.is_some(),
            MetricField::Workouts => !self.workouts.is_empty(),
        }
    }

    /// Fields holding a value
    #[must_use]
    pub fn populated_fields(&self) -> Vec<MetricField> {
        MetricField::ALL
            .into_iter()
            .filter(|field| self.has(*field))
            .collect()
    }

    /// Whether no field holds a value
    #[must_use]
    pub fn is_empty(&self) -> bool {
        MetricField::ALL.iter().all(|field| !self.has(*field))
    }

    /// Remove a field's value
    pub fn clear(&mut self, field: MetricField) {
        match field {
            MetricField::HeartRate => self.heart_rate = None,
            MetricField::Hrv => self.hrv = None,
            MetricField::Sleep => self.sleep = None,
            MetricField::Calories => self.calories_kcal = None,
            MetricField::Steps => self.steps = None,
            MetricField::Distance => self.distance_meters = None,
            MetricField::ActiveMinutes => self.active_minutes = None,
            MetricField::Recovery => self.recovery = None,
            MetricField::Readiness => self.readiness = None,
            MetricField::Strain => self.strain = None,
            MetricField::TrainingLoad => self.training_load = None,
            MetricField::Workouts => self.workouts.clear(),
        }
    }

    /// Copy one field's value from another bundle
    pub fn copy_field_from(&mut self, other: &Self, field: MetricField) {
        match field {
            MetricField::HeartRate => self.heart_rate.clone_from(&other.heart_rate),
            MetricField::Hrv => self.hrv.clone_from(&other.hrv),
            MetricField::Sleep => self.sleep.clone_from(&other.sleep),
            MetricField::Calories => self.calories_kcal = other.calories_kcal,
            MetricField::Steps => self.steps = other.steps,
            MetricField::Distance => self.distance_meters = other.distance_meters,
            MetricField::ActiveMinutes => self.active_minutes = other.active_minutes,
            MetricField::Recovery => self.recovery.clone_from(&other.recovery),
            MetricField::Readiness => self.readiness = other.readiness,
            MetricField::Strain => self.strain = other.strain,
            MetricField::TrainingLoad => self.training_load.clone_from(&other.training_load),
            MetricField::Workouts => self.workouts.clone_from(&other.workouts),
        }
    }

    /// Single comparable number for a field, used for conflict detection
    #[must_use]
    pub fn scalar(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::HeartRate => self
                .heart_rate
                .as_ref()
                .map(|hr| hr.resting_bpm.unwrap_or(hr.average_bpm)),
            MetricField::Hrv => self.hrv.as_ref().map(|hrv| hrv.average_ms),
            MetricField::Sleep => self.sleep.as_ref().map(|sleep| sleep.total_sleep_minutes),
            MetricField::Calories => self.calories_kcal,
            MetricField::Steps => self.steps.map(|steps| steps as f64),
            MetricField::Distance => self.distance_meters,
            MetricField::ActiveMinutes => self.active_minutes,
            MetricField::Recovery => self.recovery.as_ref().map(|recovery| recovery.score),
            MetricField::Readiness => self.readiness,
            MetricField::Strain => self.strain,
            MetricField::TrainingLoad => self.training_load.as_ref().map(|load| load.ratio),
            MetricField::Workouts => None,
        }
    }
}
