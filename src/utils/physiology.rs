// ABOUTME: Free helper functions for heart rate zones, sleep scoring and value validation
// ABOUTME: Shared by every driver and by the aggregator so vendors are validated identically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::physiology;

/// Lower bound of each of the five zones for a max heart rate (50/60/70/80/90 %)
#[must_use]
pub fn heart_rate_zone_bounds(max_heart_rate: f64) -> [f64; 5] {
    physiology::HEART_RATE_ZONE_FRACTIONS.map(|fraction| max_heart_rate * fraction)
}

/// Zone index (0-4) of a heart rate, `None` below zone 1
#[must_use]
pub fn zone_index(bpm: f64, bounds: &[f64; 5]) -> Option<usize> {
    bounds.iter().rposition(|lower| bpm >= *lower)
}

/// Heart rate if physiologically plausible
#[must_use]
pub fn valid_heart_rate(bpm: f64) -> Option<f64> {
    (bpm.is_finite()
        && (physiology::MIN_HEART_RATE_BPM..=physiology::MAX_HEART_RATE_BPM).contains(&bpm))
    .then_some(bpm)
}

/// HRV if physiologically plausible
#[must_use]
pub fn valid_hrv(ms: f64) -> Option<f64> {
    (ms.is_finite() && (physiology::MIN_HRV_MS..=physiology::MAX_HRV_MS).contains(&ms))
        .then_some(ms)
}

/// Clamp a 0-100 score, rejecting non-finite values
#[must_use]
pub fn clamp_score(score: f64) -> Option<f64> {
    score.is_finite().then(|| score.clamp(0.0, 100.0))
}

/// Clamp a percentage, rejecting non-finite values
#[must_use]
pub fn clamp_percentage(value: f64) -> Option<f64> {
    clamp_score(value)
}

/// Convert kilojoules to kilocalories
#[must_use]
pub fn kilojoules_to_kcal(kilojoules: f64) -> f64 {
    kilojoules * physiology::KILOJOULES_TO_KCAL
}

/// Arithmetic mean, `None` for an empty slice
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sleep score: duration band (up to 50 points, full marks for 7-9 h) plus
/// efficiency (up to 50 points)
#[must_use]
pub fn sleep_score(asleep_hours: f64, efficiency_percent: f64) -> f64 {
    let duration_points = if asleep_hours < physiology::OPTIMAL_SLEEP_MIN_HOURS {
        physiology::SLEEP_DURATION_POINTS * (asleep_hours.max(0.0) / physiology::OPTIMAL_SLEEP_MIN_HOURS)
    } else if asleep_hours <= physiology::OPTIMAL_SLEEP_MAX_HOURS {
        physiology::SLEEP_DURATION_POINTS
    } else {
        let excess = asleep_hours - physiology::OPTIMAL_SLEEP_MAX_HOURS;
        (physiology::OVERSLEEP_PENALTY_PER_HOUR.mul_add(-excess, physiology::SLEEP_DURATION_POINTS))
            .max(0.0)
    };
    let efficiency_points =
        physiology::SLEEP_EFFICIENCY_POINTS * (efficiency_percent.clamp(0.0, 100.0) / 100.0);
    (duration_points + efficiency_points).clamp(0.0, 100.0)
}
