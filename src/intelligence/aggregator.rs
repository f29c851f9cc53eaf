// ABOUTME: Folds per-device partial bundles into one unified snapshot using per-field vendor priorities
// ABOUTME: Cumulative activity fields take the maximum; unlisted fields fall back through registration order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Aggregator
//!
//! Selection rules, applied per field:
//!
//! 1. Steps, distance, calories and active minutes take the maximum single
//!    contribution, attributed to the device that supplied it.
//! 2. A field with a priority list takes the first vendor in that list that
//!    supplied a usable value. If no listed vendor did, the first bundle of any
//!    vendor that did wins.
//! 3. A field without a priority list is copied from the first bundle, in
//!    registration order, that supplied it.
//!
//! Bundles are expected in registration order. For the same inputs the output
//! is identical.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::constants::{aggregation, sync};
use crate::models::{
    ConflictResolution, ConflictValue, DataConflict, DeviceCapabilities, MetricField,
    MetricSource, PartialMetricBundle, Sourced, UnifiedMetrics, VendorType,
};
use crate::utils::physiology::{valid_heart_rate, valid_hrv};

/// Vendor preference per field, best first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    priorities: BTreeMap<MetricField, Vec<VendorType>>,
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self {
            priorities: BTreeMap::from([
                (MetricField::HeartRate, aggregation::HEART_RATE.to_vec()),
                (MetricField::Hrv, aggregation::HRV.to_vec()),
                (MetricField::Sleep, aggregation::SLEEP.to_vec()),
                (MetricField::Strain, aggregation::STRAIN.to_vec()),
                (MetricField::TrainingLoad, aggregation::TRAINING_LOAD.to_vec()),
            ]),
        }
    }
}

impl PriorityTable {
    /// Table with no priorities; every field follows registration order
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            priorities: BTreeMap::new(),
        }
    }

    /// Replace one field's priority list
    #[must_use]
    pub fn with_priority(mut self, field: MetricField, vendors: Vec<VendorType>) -> Self {
        self.priorities.insert(field, vendors);
        self
    }

    /// Priority list for a field, empty when unlisted
    #[must_use]
    pub fn priorities(&self, field: MetricField) -> &[VendorType] {
        self.priorities.get(&field).map_or(&[], Vec::as_slice)
    }
}

/// Inputs that shape aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationPolicy {
    /// Per-field vendor priorities
    pub priorities: PriorityTable,
    /// Bundles whose window ended longer ago than this are ignored
    pub max_bundle_age: Duration,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            priorities: PriorityTable::default(),
            max_bundle_age: Duration::days(sync::MAX_BUNDLE_AGE_DAYS),
        }
    }
}

/// Remove every field a driver has no capability for
///
/// Returns the fields that were dropped.
pub fn enforce_capabilities(
    bundle: &mut PartialMetricBundle,
    capabilities: DeviceCapabilities,
) -> Vec<MetricField> {
    let dropped: Vec<MetricField> = bundle
        .populated_fields()
        .into_iter()
        .filter(|field| !capabilities.contains(field.required_capability()))
        .collect();
    for field in &dropped {
        bundle.clear(*field);
    }
    dropped
}

/// Whether a bundle holds a usable value for a field
fn usable(bundle: &PartialMetricBundle, field: MetricField) -> bool {
    if !bundle.has(field) {
        return false;
    }
    match field {
        MetricField::HeartRate => bundle
            .heart_rate
            .as_ref()
            .is_some_and(|hr| valid_heart_rate(hr.average_bpm).is_some()),
        MetricField::Hrv => bundle
            .hrv
            .as_ref()
            .is_some_and(|hrv| valid_hrv(hrv.average_ms).is_some()),
        MetricField::Workouts => true,
        other => bundle
            .scalar(other)
            .is_some_and(|value| value.is_finite() && value >= 0.0),
    }
}

fn attribution(bundle: &PartialMetricBundle) -> MetricSource {
    MetricSource::Device {
        device_id: bundle.device_id.clone(),
        vendor: bundle.vendor,
    }
}

/// Winning bundle for a prioritized or unlisted field
fn select<'a>(
    bundles: &[&'a PartialMetricBundle],
    field: MetricField,
    priorities: &PriorityTable,
) -> Option<&'a PartialMetricBundle> {
    priorities
        .priorities(field)
        .iter()
        .find_map(|vendor| {
            bundles
                .iter()
                .find(|b| b.vendor == *vendor && usable(b, field))
        })
        .or_else(|| bundles.iter().find(|b| usable(b, field)))
        .copied()
}

/// Bundle with the largest value for a cumulative field; the earliest wins ties
fn select_max<'a>(
    bundles: &[&'a PartialMetricBundle],
    field: MetricField,
) -> Option<&'a PartialMetricBundle> {
    let mut best: Option<(&'a PartialMetricBundle, f64)> = None;
    for bundle in bundles.iter().copied().filter(|b| usable(b, field)) {
        let Some(value) = bundle.scalar(field) else {
            continue;
        };
        if best.is_none_or(|(_, current)| value > current) {
            best = Some((bundle, value));
        }
    }
    best.map(|(bundle, _)| bundle)
}

fn sourced<T>(bundle: &PartialMetricBundle, value: T) -> Sourced<T> {
    Sourced {
        value,
        source: attribution(bundle),
        timestamp: bundle.window_end,
    }
}

/// Fold bundles (in registration order) into a snapshot
///
/// Recovery, readiness derivation and recommendations are left to
/// [`super::RecoveryEngine::apply`].
#[must_use]
pub fn combine(
    bundles: &[PartialMetricBundle],
    policy: &AggregationPolicy,
    now: DateTime<Utc>,
) -> UnifiedMetrics {
    let cutoff = now - policy.max_bundle_age;
    let fresh: Vec<&PartialMetricBundle> =
        bundles.iter().filter(|b| b.window_end >= cutoff).collect();

    let pick = |field: MetricField| {
        if field.is_cumulative() {
            select_max(&fresh, field)
        } else {
            select(&fresh, field, &policy.priorities)
        }
    };

    let mut snapshot = UnifiedMetrics::empty(now);
    snapshot.heart_rate = pick(MetricField::HeartRate)
        .and_then(|b| b.heart_rate.clone().map(|v| sourced(b, v)));
    snapshot.hrv = pick(MetricField::Hrv).and_then(|b| b.hrv.clone().map(|v| sourced(b, v)));
    snapshot.sleep = pick(MetricField::Sleep).and_then(|b| b.sleep.clone().map(|v| sourced(b, v)));
    snapshot.calories_kcal =
        pick(MetricField::Calories).and_then(|b| b.calories_kcal.map(|v| sourced(b, v)));
    snapshot.steps = pick(MetricField::Steps).and_then(|b| b.steps.map(|v| sourced(b, v)));
    snapshot.distance_meters =
        pick(MetricField::Distance).and_then(|b| b.distance_meters.map(|v| sourced(b, v)));
    snapshot.active_minutes =
        pick(MetricField::ActiveMinutes).and_then(|b| b.active_minutes.map(|v| sourced(b, v)));
    snapshot.readiness =
        pick(MetricField::Readiness).and_then(|b| b.readiness.map(|v| sourced(b, v)));
    snapshot.strain = pick(MetricField::Strain).and_then(|b| b.strain.map(|v| sourced(b, v)));
    snapshot.training_load = pick(MetricField::TrainingLoad)
        .and_then(|b| b.training_load.clone().map(|v| sourced(b, v)));

    snapshot.contributing_devices = fresh.iter().map(|b| b.device_id.clone()).collect();
    snapshot
}

/// Relative difference above `tolerance`
fn disagrees(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = a.abs().max(b.abs());
    scale > 0.0 && (a - b).abs() / scale > tolerance
}

/// Fields where `incoming` disagrees with another device's bundle
///
/// Cumulative fields are combined by maximum and never conflict. Each conflict
/// starts as [`ConflictResolution::PriorityRules`].
#[must_use]
pub fn detect_conflicts(
    incoming: &PartialMetricBundle,
    existing: &[PartialMetricBundle],
    tolerance: f64,
) -> Vec<DataConflict> {
    let mut conflicts = Vec::new();
    for field in incoming.populated_fields() {
        if field.is_cumulative() || field == MetricField::Workouts {
            continue;
        }
        let Some(value) = incoming.scalar(field).filter(|v| v.is_finite()) else {
            continue;
        };
        for other in existing.iter().filter(|b| b.device_id != incoming.device_id) {
            let Some(other_value) = other.scalar(field).filter(|v| v.is_finite()) else {
                continue;
            };
            if disagrees(value, other_value, tolerance) {
                conflicts.push(DataConflict {
                    field,
                    incoming: ConflictValue {
                        device_id: incoming.device_id.clone(),
                        vendor: incoming.vendor,
                        value,
                    },
                    existing: ConflictValue {
                        device_id: other.device_id.clone(),
                        vendor: other.vendor,
                        value: other_value,
                    },
                    resolution: ConflictResolution::PriorityRules,
                });
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(vendor: VendorType, id: &str, now: DateTime<Utc>) -> PartialMetricBundle {
        PartialMetricBundle::new(vendor, id, now - Duration::days(1), now)
    }

    #[test]
    fn test_stale_bundles_are_ignored() {
        let now = Utc::now();
        let mut old = PartialMetricBundle::new(
            VendorType::Whoop,
            "old",
            now - Duration::days(30),
            now - Duration::days(20),
        );
        old.strain = Some(12.0);
        let snapshot = combine(&[old], &AggregationPolicy::default(), now);
        assert!(snapshot.strain.is_none());
        assert!(snapshot.contributing_devices.is_empty());
    }

    #[test]
    fn test_values_within_tolerance_do_not_conflict() {
        let now = Utc::now();
        let mut a = bundle(VendorType::Whoop, "a", now);
        let mut b = bundle(VendorType::Garmin, "b", now);
        a.strain = Some(10.0);
        b.strain = Some(10.4);
        assert!(detect_conflicts(&a, &[b.clone()], sync::CONFLICT_TOLERANCE).is_empty());

        b.strain = Some(12.0);
        let conflicts = detect_conflicts(&a, &[b], sync::CONFLICT_TOLERANCE);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, MetricField::Strain);
    }
}
