// ABOUTME: Integration tests for combining per-device bundles into one unified snapshot
// ABOUTME: Covers vendor priorities, cumulative maxima, validity fallbacks, capabilities and conflicts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use pierre_wearables::constants::sync::CONFLICT_TOLERANCE;
use pierre_wearables::intelligence::{
    combine, detect_conflicts, enforce_capabilities, AggregationPolicy, PriorityTable,
};
use pierre_wearables::models::{
    DeviceCapabilities, HeartRateMetrics, MetricField, MetricSource, PartialMetricBundle,
    SleepMetrics, VendorType,
};

fn bundle(vendor: VendorType, device_id: &str, now: DateTime<Utc>) -> PartialMetricBundle {
    PartialMetricBundle::new(vendor, device_id, now - Duration::days(1), now)
}

fn heart_rate(average: f64, resting: Option<f64>) -> HeartRateMetrics {
    HeartRateMetrics {
        average_bpm: average,
        min_bpm: None,
        max_bpm: None,
        resting_bpm: resting,
        latest_bpm: None,
        zones: None,
        sample_count: 10,
    }
}

fn sleep(total_minutes: f64, now: DateTime<Utc>) -> SleepMetrics {
    SleepMetrics {
        start: now - Duration::hours(9),
        end: now - Duration::hours(1),
        total_sleep_minutes: total_minutes,
        time_in_bed_minutes: total_minutes + 20.0,
        efficiency_percent: 92.0,
        score: Some(84.0),
        stages: None,
        nights_in_window: 1,
    }
}

fn device_of<T>(value: Option<&pierre_wearables::models::Sourced<T>>) -> Option<&str> {
    match &value?.source {
        MetricSource::Device { device_id, .. } => Some(device_id.as_str()),
        MetricSource::Combined { .. } => None,
    }
}

#[test]
fn test_vendor_priorities_pick_each_field() -> Result<()> {
    let now = Utc::now();
    let mut whoop = bundle(VendorType::Whoop, "whoop-1", now);
    whoop.heart_rate = Some(heart_rate(62.0, Some(50.0)));
    whoop.sleep = Some(sleep(450.0, now));
    whoop.strain = Some(13.1);

    let mut health = bundle(VendorType::HealthStore, "health-1", now);
    health.heart_rate = Some(heart_rate(71.0, Some(55.0)));
    health.sleep = Some(sleep(420.0, now));

    // Registration order puts WHOOP first; the table still decides
    let snapshot = combine(&[whoop, health], &AggregationPolicy::default(), now);

    assert_eq!(device_of(snapshot.heart_rate.as_ref()), Some("health-1"));
    assert_eq!(device_of(snapshot.sleep.as_ref()), Some("whoop-1"));
    assert_eq!(device_of(snapshot.strain.as_ref()), Some("whoop-1"));
    let sleep = snapshot.sleep.context("sleep")?;
    assert!((sleep.value.total_sleep_minutes - 450.0).abs() < f64::EPSILON);
    assert_eq!(snapshot.contributing_devices, vec!["whoop-1".to_owned(), "health-1".to_owned()]);
    Ok(())
}

#[test]
fn test_cumulative_fields_take_the_maximum() -> Result<()> {
    let now = Utc::now();
    let mut health = bundle(VendorType::HealthStore, "health-1", now);
    health.steps = Some(8_200);
    health.calories_kcal = Some(2_300.0);

    let mut garmin = bundle(VendorType::Garmin, "garmin-1", now);
    garmin.steps = Some(9_450);
    garmin.calories_kcal = Some(2_100.0);

    let snapshot = combine(&[health, garmin], &AggregationPolicy::default(), now);

    let steps = snapshot.steps.as_ref().context("steps")?;
    assert_eq!(steps.value, 9_450);
    assert_eq!(device_of(snapshot.steps.as_ref()), Some("garmin-1"));
    assert_eq!(device_of(snapshot.calories_kcal.as_ref()), Some("health-1"));
    Ok(())
}

#[test]
fn test_unlisted_field_comes_from_first_registered_bundle() {
    let now = Utc::now();
    let mut garmin = bundle(VendorType::Garmin, "garmin-1", now);
    garmin.readiness = Some(66.0);
    let mut whoop = bundle(VendorType::Whoop, "whoop-1", now);
    whoop.readiness = Some(81.0);

    let snapshot = combine(&[garmin, whoop], &AggregationPolicy::default(), now);
    assert_eq!(device_of(snapshot.readiness.as_ref()), Some("garmin-1"));
    assert!(snapshot
        .readiness
        .is_some_and(|r| (r.value - 66.0).abs() < f64::EPSILON));
}

#[test]
fn test_implausible_values_fall_through_to_next_vendor() {
    let now = Utc::now();
    let mut health = bundle(VendorType::HealthStore, "health-1", now);
    health.heart_rate = Some(heart_rate(400.0, None));
    let mut whoop = bundle(VendorType::Whoop, "whoop-1", now);
    whoop.heart_rate = Some(heart_rate(64.0, Some(51.0)));

    let snapshot = combine(&[health, whoop], &AggregationPolicy::default(), now);
    assert_eq!(device_of(snapshot.heart_rate.as_ref()), Some("whoop-1"));
}

#[test]
fn test_custom_priority_table_overrides_default() {
    let now = Utc::now();
    let mut health = bundle(VendorType::HealthStore, "health-1", now);
    health.heart_rate = Some(heart_rate(70.0, None));
    let mut garmin = bundle(VendorType::Garmin, "garmin-1", now);
    garmin.heart_rate = Some(heart_rate(68.0, None));

    let policy = AggregationPolicy {
        priorities: PriorityTable::empty()
            .with_priority(MetricField::HeartRate, vec![VendorType::Garmin]),
        ..AggregationPolicy::default()
    };
    let snapshot = combine(&[health, garmin], &policy, now);
    assert_eq!(device_of(snapshot.heart_rate.as_ref()), Some("garmin-1"));
}

#[test]
fn test_capabilities_strip_unsupported_fields() {
    let now = Utc::now();
    let mut whoop = bundle(VendorType::Whoop, "whoop-1", now);
    whoop.steps = Some(10_000);
    whoop.strain = Some(9.5);

    let dropped = enforce_capabilities(&mut whoop, DeviceCapabilities::for_vendor(VendorType::Whoop));
    assert_eq!(dropped, vec![MetricField::Steps]);
    assert!(whoop.steps.is_none());
    assert!(whoop.strain.is_some());

    let mut garmin = bundle(VendorType::Garmin, "garmin-1", now);
    garmin.strain = Some(11.0);
    garmin.steps = Some(7_000);
    let dropped = enforce_capabilities(&mut garmin, DeviceCapabilities::for_vendor(VendorType::Garmin));
    assert_eq!(dropped, vec![MetricField::Strain]);
    assert_eq!(garmin.steps, Some(7_000));
}

#[test]
fn test_conflicts_ignore_cumulative_fields_and_same_device() {
    let now = Utc::now();
    let mut incoming = bundle(VendorType::Whoop, "whoop-1", now);
    incoming.steps = Some(4_000);
    incoming.heart_rate = Some(heart_rate(60.0, Some(50.0)));

    let mut other = bundle(VendorType::HealthStore, "health-1", now);
    other.steps = Some(12_000);
    // Averages differ wildly but resting rates agree
    other.heart_rate = Some(heart_rate(85.0, Some(51.0)));

    let mut previous_self = bundle(VendorType::Whoop, "whoop-1", now - Duration::days(1));
    previous_self.heart_rate = Some(heart_rate(60.0, Some(70.0)));

    assert!(detect_conflicts(&incoming, &[other.clone(), previous_self], CONFLICT_TOLERANCE).is_empty());

    other.heart_rate = Some(heart_rate(85.0, Some(58.0)));
    let conflicts = detect_conflicts(&incoming, &[other], CONFLICT_TOLERANCE);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].field, MetricField::HeartRate);
    assert!((conflicts[0].incoming.value - 50.0).abs() < f64::EPSILON);
    assert!((conflicts[0].existing.value - 58.0).abs() < f64::EPSILON);
}

#[test]
fn test_silent_preferred_vendor_falls_back_to_supplier() {
    let now = Utc::now();
    // Health store is first for heart rate but reported none
    let mut health = bundle(VendorType::HealthStore, "health-1", now);
    health.steps = Some(5_000);
    let mut whoop = bundle(VendorType::Whoop, "whoop-1", now);
    whoop.heart_rate = Some(heart_rate(61.0, Some(49.0)));

    let snapshot = combine(&[health, whoop], &AggregationPolicy::default(), now);
    assert_eq!(device_of(snapshot.heart_rate.as_ref()), Some("whoop-1"));
    assert!(snapshot
        .heart_rate
        .is_some_and(|hr| (hr.value.average_bpm - 61.0).abs() < f64::EPSILON));
}

#[test]
fn test_combine_is_deterministic() {
    let now = Utc::now();
    let mut health = bundle(VendorType::HealthStore, "health-1", now);
    health.heart_rate = Some(heart_rate(70.0, Some(55.0)));
    health.steps = Some(8_000);
    health.sleep = Some(sleep(400.0, now));
    let mut whoop = bundle(VendorType::Whoop, "whoop-1", now);
    whoop.heart_rate = Some(heart_rate(62.0, Some(50.0)));
    whoop.sleep = Some(sleep(450.0, now));
    whoop.strain = Some(12.0);
    let mut garmin = bundle(VendorType::Garmin, "garmin-1", now);
    garmin.heart_rate = Some(heart_rate(66.0, Some(52.0)));
    garmin.steps = Some(9_000);

    let winners = |bundles: &[PartialMetricBundle]| {
        let snapshot = combine(bundles, &AggregationPolicy::default(), now);
        (
            device_of(snapshot.heart_rate.as_ref()).map(str::to_owned),
            device_of(snapshot.sleep.as_ref()).map(str::to_owned),
            device_of(snapshot.steps.as_ref()).map(str::to_owned),
            device_of(snapshot.strain.as_ref()).map(str::to_owned),
        )
    };

    let forward = [health.clone(), whoop.clone(), garmin.clone()];
    let first = winners(&forward);
    assert_eq!(first, winners(&forward));
    // Fields with a priority list or max rule ignore registration order
    assert_eq!(first, winners(&[garmin, whoop, health]));
    assert_eq!(first.0.as_deref(), Some("health-1"));
    assert_eq!(first.2.as_deref(), Some("garmin-1"));
}
