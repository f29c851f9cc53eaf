// ABOUTME: Unified metrics snapshot and derived recovery / recommendation types
// ABOUTME: Every snapshot field is attributed to exactly one winning source and timestamped
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::VendorType;
use super::metrics::{HeartRateMetrics, HrvMetrics, HrvTrend, SleepMetrics, TrainingLoad};
use super::sync::DataConflict;

/// Attribution of a snapshot value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricSource {
    /// Taken from one device
    Device {
        /// Device id
        device_id: String,
        /// Vendor
        vendor: VendorType,
    },
    /// Combined from several devices (maximum or weighted blend)
    Combined {
        /// Contributing vendors, in registration order
        vendors: Vec<VendorType>,
    },
}

/// A snapshot value with its attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    /// Value
    pub value: T,
    /// Where it came from
    pub source: MetricSource,
    /// End of the window the value describes
    pub timestamp: DateTime<Utc>,
}

/// Readiness bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessBand {
    /// 80 and above
    Excellent,
    /// 60 and above
    Good,
    /// 40 and above
    Fair,
    /// Below 40
    Poor,
}

impl ReadinessBand {
    /// Fixed guidance for the band
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent - ready for high intensity training",
            Self::Good => "Good - moderate to high intensity is appropriate",
            Self::Fair => "Fair - keep intensity light to moderate",
            Self::Poor => "Poor - prioritize rest and recovery",
        }
    }
}

/// Recommendation priority, highest first when sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    /// Act today
    High,
    /// Worth attention
    Medium,
    /// Informational
    Low,
}

/// Area a recommendation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    /// Recovery score
    Recovery,
    /// Training intensity
    Intensity,
    /// Sleep duration or quality
    Sleep,
    /// HRV trend
    Hrv,
    /// Acute:chronic load
    TrainingLoad,
}

/// One ranked recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecommendation {
    /// Area
    pub category: RecommendationCategory,
    /// Priority
    pub priority: RecommendationPriority,
    /// Short headline
    pub title: String,
    /// Why it was raised
    pub justification: String,
}

/// Derived recovery state for the current snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAssessment {
    /// Combined 0-100 recovery score
    pub recovery_score: Option<f64>,
    /// 0-100 readiness score
    pub readiness_score: Option<f64>,
    /// Readiness band
    pub readiness: Option<ReadinessBand>,
    /// Band guidance
    pub readiness_message: Option<String>,
    /// HRV trend
    pub hrv_trend: Option<HrvTrend>,
    /// Vendors whose recovery readings were blended
    pub contributors: Vec<VendorType>,
}

/// Dense merged view of every connected device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedMetrics {
    /// When the snapshot was built
    pub generated_at: DateTime<Utc>,
    /// Heart rate
    pub heart_rate: Option<Sourced<HeartRateMetrics>>,
    /// HRV
    pub hrv: Option<Sourced<HrvMetrics>>,
    /// Sleep
    pub sleep: Option<Sourced<SleepMetrics>>,
    /// Energy expenditure in kcal
    pub calories_kcal: Option<Sourced<f64>>,
    /// Steps
    pub steps: Option<Sourced<u64>>,
    /// Distance in meters
    pub distance_meters: Option<Sourced<f64>>,
    /// Active minutes
    pub active_minutes: Option<Sourced<f64>>,
    /// Recovery score (vendor-weighted blend)
    pub recovery: Option<Sourced<f64>>,
    /// Readiness score
    pub readiness: Option<Sourced<f64>>,
    /// Strain
    pub strain: Option<Sourced<f64>>,
    /// Training load
    pub training_load: Option<Sourced<TrainingLoad>>,
    /// Derived recovery state
    pub recovery_assessment: Option<RecoveryAssessment>,
    /// Ranked recommendations
    pub recommendations: Vec<TrainingRecommendation>,
    /// Conflicts unresolved at build time
    pub pending_conflicts: Vec<DataConflict>,
    /// Devices whose bundles were aggregated, in registration order
    pub contributing_devices: Vec<String>,
}

impl UnifiedMetrics {
    /// Snapshot with no data
    #[must_use]
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
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
            recovery_assessment: None,
            recommendations: Vec::new(),
            pending_conflicts: Vec::new(),
            contributing_devices: Vec::new(),
        }
    }
}
