// ABOUTME: WHOOP developer API response structures and their mapping onto canonical metrics
// ABOUTME: Cycles carry strain and energy, recoveries carry recovery/HRV/RHR, sleeps carry stage summaries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{SleepMetrics, SleepStages, VendorRecovery, WorkoutActivity, WorkoutSummary};
use crate::utils::physiology::{clamp_percentage, clamp_score, kilojoules_to_kcal, sleep_score};

/// WHOOP resource id (integer in v1, UUID string in v2)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WhoopId {
    /// Numeric id
    Numeric(i64),
    /// String id
    Text(String),
}

impl fmt::Display for WhoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Pagination wrapper
#[derive(Debug, Deserialize)]
pub struct WhoopPage<T> {
    /// Records on this page
    pub records: Vec<T>,
    /// Token for the next page
    pub next_token: Option<String>,
}

/// Basic user profile
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopUserProfile {
    /// User id
    pub user_id: i64,
    /// Email
    pub email: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
}

/// Physiological cycle (roughly one day)
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopCycle {
    /// Cycle id
    pub id: WhoopId,
    /// Cycle start
    pub start: DateTime<Utc>,
    /// Cycle end, absent for the current cycle
    pub end: Option<DateTime<Utc>>,
    /// Score, absent until scored
    pub score: Option<WhoopCycleScore>,
}

/// Cycle score
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopCycleScore {
    /// Day strain (0-21)
    pub strain: Option<f64>,
    /// Energy in kilojoules
    pub kilojoule: Option<f64>,
    /// Average heart rate
    pub average_heart_rate: Option<f64>,
    /// Max heart rate
    pub max_heart_rate: Option<f64>,
}

/// Recovery record
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopRecovery {
    /// Cycle the recovery belongs to
    pub cycle_id: WhoopId,
    /// When it was created
    pub created_at: DateTime<Utc>,
    /// Score, absent until scored
    pub score: Option<WhoopRecoveryScore>,
}

/// Recovery score
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopRecoveryScore {
    /// Recovery percentage
    pub recovery_score: Option<f64>,
    /// Resting heart rate
    pub resting_heart_rate: Option<f64>,
    /// HRV RMSSD in ms
    pub hrv_rmssd_milli: Option<f64>,
    /// SpO2 percentage
    pub spo2_percentage: Option<f64>,
    /// Skin temperature
    pub skin_temp_celsius: Option<f64>,
}

/// Sleep activity
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopSleep {
    /// Sleep id
    pub id: WhoopId,
    /// Start
    pub start: DateTime<Utc>,
    /// End
    pub end: DateTime<Utc>,
    /// Whether this was a nap
    #[serde(default)]
    pub nap: bool,
    /// Score, absent until scored
    pub score: Option<WhoopSleepScore>,
}

/// Sleep score
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopSleepScore {
    /// Stage breakdown
    pub stage_summary: Option<WhoopStageSummary>,
    /// Respiratory rate
    pub respiratory_rate: Option<f64>,
    /// Sleep performance percentage
    pub sleep_performance_percentage: Option<f64>,
    /// Sleep efficiency percentage
    pub sleep_efficiency_percentage: Option<f64>,
}

/// Sleep stage summary in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopStageSummary {
    /// Time in bed
    pub total_in_bed_time_milli: Option<i64>,
    /// Awake time
    pub total_awake_time_milli: Option<i64>,
    /// Light sleep
    pub total_light_sleep_time_milli: Option<i64>,
    /// Slow wave sleep
    pub total_slow_wave_sleep_time_milli: Option<i64>,
    /// REM sleep
    pub total_rem_sleep_time_milli: Option<i64>,
}

/// Workout
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopWorkout {
    /// Workout id
    pub id: WhoopId,
    /// Start
    pub start: DateTime<Utc>,
    /// End
    pub end: DateTime<Utc>,
    /// WHOOP sport id
    pub sport_id: i32,
    /// Score, absent until scored
    pub score: Option<WhoopWorkoutScore>,
}

/// Workout score
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopWorkoutScore {
    /// Strain
    pub strain: Option<f64>,
    /// Average heart rate
    pub average_heart_rate: Option<f64>,
    /// Max heart rate
    pub max_heart_rate: Option<f64>,
    /// Energy in kilojoules
    pub kilojoule: Option<f64>,
    /// Distance in meters
    pub distance_meter: Option<f64>,
}

fn millis_to_minutes(ms: Option<i64>) -> f64 {
    ms.map_or(0.0, |ms| ms.max(0) as f64 / 60_000.0)
}

impl WhoopCycle {
    /// Energy in kcal
    #[must_use]
    pub fn energy_kcal(&self) -> Option<f64> {
        self.score
            .as_ref()
            .and_then(|s| s.kilojoule)
            .map(kilojoules_to_kcal)
    }

    /// Day strain
    #[must_use]
    pub fn strain(&self) -> Option<f64> {
        self.score.as_ref().and_then(|s| s.strain).filter(|s| s.is_finite())
    }
}

impl WhoopRecovery {
    /// Canonical recovery reading, `None` until scored
    #[must_use]
    pub fn to_vendor_recovery(&self) -> Option<VendorRecovery> {
        let score = self.score.as_ref()?;
        Some(VendorRecovery {
            score: score.recovery_score.and_then(clamp_score)?,
            resting_heart_rate: score.resting_heart_rate,
            hrv_ms: score.hrv_rmssd_milli,
            skin_temp_celsius: score.skin_temp_celsius,
            spo2_percent: score.spo2_percentage.and_then(clamp_percentage),
            measured_at: self.created_at,
        })
    }
}

impl WhoopSleep {
    /// Sleep performance percentage
    #[must_use]
    pub fn performance(&self) -> Option<f64> {
        self.score
            .as_ref()
            .and_then(|s| s.sleep_performance_percentage)
            .and_then(clamp_score)
    }

    /// Canonical sleep summary
    #[must_use]
    pub fn to_sleep_metrics(&self, nights_in_window: usize) -> SleepMetrics {
        let score = self.score.as_ref();
        let summary = score.and_then(|s| s.stage_summary.as_ref());

        let span_minutes = (self.end - self.start).num_seconds().max(0) as f64 / 60.0;
        let in_bed = summary
            .and_then(|s| s.total_in_bed_time_milli)
            .map_or(span_minutes, |ms| millis_to_minutes(Some(ms)));
        let awake = millis_to_minutes(summary.and_then(|s| s.total_awake_time_milli));
        let asleep = (in_bed - awake).max(0.0);

        let efficiency = score
            .and_then(|s| s.sleep_efficiency_percentage)
            .and_then(clamp_percentage)
            .unwrap_or(if in_bed > 0.0 { asleep / in_bed * 100.0 } else { 0.0 });

        let stages = summary.map(|s| SleepStages {
            deep_minutes: millis_to_minutes(s.total_slow_wave_sleep_time_milli),
            light_minutes: millis_to_minutes(s.total_light_sleep_time_milli),
            rem_minutes: millis_to_minutes(s.total_rem_sleep_time_milli),
            awake_minutes: awake,
        });

        SleepMetrics {
            start: self.start,
            end: self.end,
            total_sleep_minutes: asleep,
            time_in_bed_minutes: in_bed,
            efficiency_percent: efficiency,
            score: Some(self.performance().unwrap_or_else(|| sleep_score(asleep / 60.0, efficiency))),
            stages,
            nights_in_window,
        }
    }
}

impl WhoopWorkout {
    /// Workout strain
    #[must_use]
    pub fn strain(&self) -> Option<f64> {
        self.score.as_ref().and_then(|s| s.strain)
    }

    /// Canonical workout summary
    #[must_use]
    pub fn to_summary(&self) -> WorkoutSummary {
        let score = self.score.as_ref();
        WorkoutSummary {
            id: self.id.to_string(),
            activity: WorkoutActivity::from_whoop_sport(self.sport_id),
            start: self.start,
            end: self.end,
            energy_kcal: score.and_then(|s| s.kilojoule).map(kilojoules_to_kcal),
            distance_meters: score.and_then(|s| s.distance_meter),
            average_heart_rate: score.and_then(|s| s.average_heart_rate),
            max_heart_rate: score.and_then(|s| s.max_heart_rate),
            strain: score.and_then(|s| s.strain),
        }
    }
}
