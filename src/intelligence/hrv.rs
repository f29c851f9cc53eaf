// ABOUTME: HRV trend analysis against a trailing seven-day baseline
// ABOUTME: More than 5 % above baseline is improving, more than 5 % below is declining
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Duration, Utc};

use crate::constants::recovery::HRV_TREND_THRESHOLD;
use crate::constants::training_load::ACUTE_WINDOW_DAYS;
use crate::models::{HrvMetrics, HrvTrend};
use crate::utils::physiology::{mean, valid_hrv};

/// Trend of `current` against `baseline`, `None` without a usable baseline
#[must_use]
pub fn determine_trend(current: f64, baseline: f64) -> Option<HrvTrend> {
    if !current.is_finite() || !baseline.is_finite() || baseline <= 0.0 {
        return None;
    }
    let change = (current - baseline) / baseline;
    Some(if change > HRV_TREND_THRESHOLD {
        HrvTrend::Improving
    } else if change < -HRV_TREND_THRESHOLD {
        HrvTrend::Declining
    } else {
        HrvTrend::Stable
    })
}

/// Summarize dated HRV readings
///
/// Implausible readings are dropped. The trend compares the latest reading with
/// the mean of the seven days up to it and needs at least two readings.
#[must_use]
pub fn summarize_readings(readings: &[(DateTime<Utc>, f64)]) -> Option<HrvMetrics> {
    let valid: Vec<(DateTime<Utc>, f64)> = readings
        .iter()
        .filter_map(|(at, ms)| valid_hrv(*ms).map(|ms| (*at, ms)))
        .collect();
    let values: Vec<f64> = valid.iter().map(|(_, ms)| *ms).collect();
    let average = mean(&values)?;
    let (latest_at, latest) = valid.iter().copied().max_by_key(|(at, _)| *at)?;

    let baseline_start = latest_at - Duration::days(ACUTE_WINDOW_DAYS);
    let baseline: Vec<f64> = valid
        .iter()
        .filter(|(at, _)| *at >= baseline_start)
        .map(|(_, ms)| *ms)
        .collect();

    let trend = if baseline.len() > 1 {
        mean(&baseline).and_then(|base| determine_trend(latest, base))
    } else {
        None
    };

    Some(HrvMetrics {
        average_ms: average,
        latest_ms: latest,
        trend,
        sample_count: values.len(),
    })
}
