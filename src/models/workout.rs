// ABOUTME: Workout types shared by drivers for export and session tracking
// ABOUTME: Workout is what a consumer exports; WorkoutSummary is what a sync reports
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity classification for workouts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutActivity {
    /// Running
    Running,
    /// Cycling
    Cycling,
    /// Swimming
    Swimming,
    /// Walking
    Walking,
    /// Hiking
    Hiking,
    /// Rowing
    Rowing,
    /// Strength training
    StrengthTraining,
    /// Yoga
    Yoga,
    /// High intensity interval training
    Hiit,
    /// Vendor-specific activity
    Other(String),
}

impl WorkoutActivity {
    /// Map a WHOOP sport id
    #[must_use]
    pub fn from_whoop_sport(sport_id: i32) -> Self {
        match sport_id {
            0 => Self::Running,
            1 => Self::Cycling,
            33 => Self::Swimming,
            63 => Self::Walking,
            52 => Self::Hiking,
            18 => Self::Rowing,
            45 | 48 => Self::StrengthTraining,
            44 => Self::Yoga,
            96 => Self::Hiit,
            other => Self::Other(format!("whoop_sport_{other}")),
        }
    }
}

/// A completed workout, as exported to or recorded by a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    /// Identifier assigned by the recorder
    pub id: String,
    /// Activity type
    pub activity: WorkoutActivity,
    /// Start time
    pub start: DateTime<Utc>,
    /// End time
    pub end: DateTime<Utc>,
    /// Energy burned in kcal
    pub energy_kcal: Option<f64>,
    /// Distance in meters
    pub distance_meters: Option<f64>,
    /// Average heart rate
    pub average_heart_rate: Option<f64>,
    /// Metadata tags
    pub metadata: BTreeMap<String, String>,
}

impl Workout {
    /// Duration in minutes
    #[must_use]
    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_seconds().max(0) as f64 / 60.0
    }
}

/// Workout reported by a sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    /// Vendor identifier
    pub id: String,
    /// Activity type
    pub activity: WorkoutActivity,
    /// Start time
    pub start: DateTime<Utc>,
    /// End time
    pub end: DateTime<Utc>,
    /// Energy burned in kcal
    pub energy_kcal: Option<f64>,
    /// Distance in meters
    pub distance_meters: Option<f64>,
    /// Average heart rate
    pub average_heart_rate: Option<f64>,
    /// Maximum heart rate
    pub max_heart_rate: Option<f64>,
    /// Vendor strain
    pub strain: Option<f64>,
}

impl From<&Workout> for WorkoutSummary {
    fn from(workout: &Workout) -> Self {
        Self {
            id: workout.id.clone(),
            activity: workout.activity.clone(),
            start: workout.start,
            end: workout.end,
            energy_kcal: workout.energy_kcal,
            distance_meters: workout.distance_meters,
            average_heart_rate: workout.average_heart_rate,
            max_heart_rate: None,
            strain: None,
        }
    }
}

/// Result of exporting a workout to one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutExportOutcome {
    /// Target device
    pub device_id: String,
    /// Whether the device accepted the workout
    pub exported: bool,
    /// Failure message
    pub error: Option<String>,
}
