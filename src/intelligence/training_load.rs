// ABOUTME: Acute:chronic training load from daily strain and its five-band classification
// ABOUTME: Acute is the trailing 7-day mean, chronic the trailing 28-day mean
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::constants::training_load::{
    ACUTE_WINDOW_DAYS, CHRONIC_WINDOW_DAYS, MAINTAINING_RATIO, OVERREACHING_RATIO,
    PRODUCTIVE_RATIO, RECOVERY_RATIO,
};
use crate::models::{TrainingLoad, TrainingLoadStatus};

/// Calculator for acute:chronic load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingLoadCalculator {
    acute_window_days: i64,
    chronic_window_days: i64,
}

impl Default for TrainingLoadCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingLoadCalculator {
    /// Standard 7 / 28 day windows
    #[must_use]
    pub const fn new() -> Self {
        Self {
            acute_window_days: ACUTE_WINDOW_DAYS,
            chronic_window_days: CHRONIC_WINDOW_DAYS,
        }
    }

    /// Custom windows
    #[must_use]
    pub const fn with_windows(acute_days: i64, chronic_days: i64) -> Self {
        Self {
            acute_window_days: acute_days,
            chronic_window_days: chronic_days,
        }
    }

    /// Load as of `as_of` from dated strain values
    ///
    /// Values on the same calendar day are summed. Each window's mean is taken over
    /// the days that have a value. Returns `None` when the chronic mean is zero.
    #[must_use]
    pub fn calculate(&self, strain: &[(DateTime<Utc>, f64)], as_of: DateTime<Utc>) -> Option<TrainingLoad> {
        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (at, value) in strain {
            if value.is_finite() && *at <= as_of {
                *daily.entry(at.date_naive()).or_insert(0.0) += value;
            }
        }

        let acute = Self::window_mean(&daily, as_of, self.acute_window_days)?;
        let chronic = Self::window_mean(&daily, as_of, self.chronic_window_days)?;
        if chronic <= 0.0 {
            return None;
        }

        let ratio = acute / chronic;
        let status = classify(ratio);
        Some(TrainingLoad {
            acute,
            chronic,
            ratio,
            status,
            recommendation: recommendation(status).to_owned(),
        })
    }

    fn window_mean(daily: &BTreeMap<NaiveDate, f64>, as_of: DateTime<Utc>, days: i64) -> Option<f64> {
        let first = (as_of - Duration::days(days - 1)).date_naive();
        let values: Vec<f64> = daily
            .range(first..=as_of.date_naive())
            .map(|(_, value)| *value)
            .collect();
        crate::utils::physiology::mean(&values)
    }
}

/// Classify an acute:chronic ratio
///
/// Total over `f64`: every value, including NaN, lands in exactly one band.
#[must_use]
pub fn classify(ratio: f64) -> TrainingLoadStatus {
    if ratio > OVERREACHING_RATIO {
        TrainingLoadStatus::Overreaching
    } else if ratio > PRODUCTIVE_RATIO {
        TrainingLoadStatus::Productive
    } else if ratio > MAINTAINING_RATIO {
        TrainingLoadStatus::Maintaining
    } else if ratio > RECOVERY_RATIO {
        TrainingLoadStatus::Recovery
    } else {
        TrainingLoadStatus::Detraining
    }
}

/// Fixed guidance for a status
#[must_use]
pub const fn recommendation(status: TrainingLoadStatus) -> &'static str {
    match status {
        TrainingLoadStatus::Overreaching => {
            "Training load is spiking well above your baseline. Reduce volume and intensity to lower injury risk."
        }
        TrainingLoadStatus::Productive => {
            "Training load is building productively. Keep progressing while monitoring recovery."
        }
        TrainingLoadStatus::Maintaining => {
            "Training load is steady. Add intensity or volume gradually if you want to build fitness."
        }
        TrainingLoadStatus::Recovery => {
            "Training load is below your baseline. Good for recovery, increase load when ready."
        }
        TrainingLoadStatus::Detraining => {
            "Training load has dropped far below your baseline. Resume regular training to avoid losing fitness."
        }
    }
}

/// Load from dated strain with the standard windows
#[must_use]
pub fn compute_training_load(strain: &[(DateTime<Utc>, f64)], as_of: DateTime<Utc>) -> Option<TrainingLoad> {
    TrainingLoadCalculator::new().calculate(strain, as_of)
}
