// ABOUTME: Integration tests for real-time polling and subscriber fan-out
// ABOUTME: Runs on a paused clock so poll intervals elapse instantly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use common::{create_test_manager, heart_rate_sample, init_test_logging, MockState};
use pierre_wearables::config::RealtimeConfig;
use pierre_wearables::drivers::health_store::{
    HealthDataType, HealthStoreDriver, InMemoryHealthStore, QuantitySample,
};
use pierre_wearables::drivers::unimplemented::UnimplementedDriver;
use pierre_wearables::drivers::{ConnectOptions, DeviceDriver};
use pierre_wearables::models::{
    RealtimeMetric, RealtimeSample, SampleOrigin, SyncConfig, VendorType, WorkoutActivity,
};
use pierre_wearables::realtime::RealtimeHub;
use tokio_stream::StreamExt;

fn realtime_config() -> RealtimeConfig {
    RealtimeConfig {
        poll_interval: Duration::from_secs(5),
        workout_poll_interval: Duration::from_secs(1),
        channel_capacity: 8,
    }
}

fn heart_rate(bpm: f64, minutes_ago: i64) -> QuantitySample {
    let end = Utc::now() - chrono::Duration::minutes(minutes_ago);
    QuantitySample {
        data_type: HealthDataType::HeartRate,
        value: bpm,
        start: end - chrono::Duration::seconds(5),
        end,
        source_name: Some("Watch".to_owned()),
    }
}

async fn connected_health_driver(store: Arc<InMemoryHealthStore>) -> Result<Arc<dyn DeviceDriver>> {
    let driver = HealthStoreDriver::new("health-1", store, realtime_config());
    driver.request_permissions().await?;
    driver.connect(&ConnectOptions::default()).await?;
    Ok(Arc::new(driver))
}

fn sample_for(device_id: &str, bpm: f64) -> RealtimeSample {
    RealtimeSample {
        device_id: device_id.to_owned(),
        ..heart_rate_sample(VendorType::Garmin, bpm, Utc::now())
    }
}

#[tokio::test(start_paused = true)]
async fn test_polling_publishes_each_new_sample_once() -> Result<()> {
    init_test_logging();
    let store = Arc::new(InMemoryHealthStore::new().with_quantities([heart_rate(72.0, 1)]));
    let driver = connected_health_driver(Arc::clone(&store)).await?;
    let hub = RealtimeHub::new(8);

    let mut subscription = hub.subscribe(&[Arc::clone(&driver)]);
    assert!(hub.is_polling("health-1"));

    let first = tokio::time::timeout(Duration::from_secs(60), subscription.recv())
        .await?
        .context("first sample")?;
    assert_eq!(first.device_id, "health-1");
    assert_eq!(first.metric, RealtimeMetric::HeartRate);
    assert_eq!(first.origin, SampleOrigin::Polling);
    assert!((first.value - 72.0).abs() < f64::EPSILON);

    let repeated = tokio::time::timeout(Duration::from_secs(30), subscription.recv()).await;
    assert!(repeated.is_err(), "an unchanged sample must not be republished");

    store.push_quantity(heart_rate(96.0, 0)).await;
    let second = tokio::time::timeout(Duration::from_secs(60), subscription.recv())
        .await?
        .context("second sample")?;
    assert!((second.value - 96.0).abs() < f64::EPSILON);

    let latest = hub.latest(RealtimeMetric::HeartRate).context("latest heart rate")?;
    assert!((latest.value - 96.0).abs() < f64::EPSILON);
    hub.shutdown();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_polling() -> Result<()> {
    init_test_logging();
    let store = Arc::new(InMemoryHealthStore::new().with_quantities([heart_rate(64.0, 1)]));
    let driver = connected_health_driver(store).await?;
    let hub = RealtimeHub::new(8);

    let mut subscription = hub.subscribe(&[driver]);
    assert_eq!(hub.subscriber_count(), 1);
    assert!(hub.unsubscribe(subscription.id()));

    assert!(!hub.is_polling("health-1"));
    assert_eq!(hub.subscriber_count(), 0);
    assert!(!hub.unsubscribe(subscription.id()));
    assert!(subscription.recv().await.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_releases_loop_and_subscription() -> Result<()> {
    init_test_logging();
    let store = Arc::new(InMemoryHealthStore::new().with_quantities([heart_rate(66.0, 1)]));
    let driver = connected_health_driver(store).await?;
    let hub = RealtimeHub::new(8);

    let subscription = hub.subscribe(&[driver]);
    assert!(hub.is_polling("health-1"));
    drop(subscription);
    assert_eq!(hub.subscriber_count(), 0);

    // The next tick notices nobody is listening
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!hub.is_polling("health-1"));

    let later: Arc<dyn DeviceDriver> = Arc::new(UnimplementedDriver::new(VendorType::Garmin, "garmin-1"));
    hub.attach(&later);
    assert_eq!(hub.publish(sample_for("garmin-1", 61.0)), 0);
    Ok(())
}

#[tokio::test]
async fn test_dropped_handle_is_pruned_on_publish() {
    init_test_logging();
    let hub = RealtimeHub::new(4);
    let driver: Arc<dyn DeviceDriver> = Arc::new(UnimplementedDriver::new(VendorType::Fitbit, "fitbit-1"));
    let kept = hub.subscribe(&[Arc::clone(&driver)]);
    drop(hub.subscribe(&[driver]));

    assert_eq!(hub.publish(sample_for("fitbit-1", 70.0)), 1);
    assert_eq!(hub.subscriber_count(), 1);
    assert!(hub.unsubscribe(kept.id()));
    assert_eq!(hub.subscriber_count(), 0);
}

#[tokio::test]
async fn test_workout_session_shortens_poll_interval() -> Result<()> {
    init_test_logging();
    let store = Arc::new(InMemoryHealthStore::new());
    let driver = connected_health_driver(store).await?;

    assert_eq!(driver.realtime_interval(), Some(Duration::from_secs(5)));
    driver.start_workout_session(WorkoutActivity::Running).await?;
    assert_eq!(driver.realtime_interval(), Some(Duration::from_secs(1)));
    driver.end_workout_session().await?;
    assert_eq!(driver.realtime_interval(), Some(Duration::from_secs(5)));
    Ok(())
}

#[tokio::test]
async fn test_lagging_subscriber_drops_samples() {
    init_test_logging();
    let hub = RealtimeHub::new(1);
    let driver: Arc<dyn DeviceDriver> = Arc::new(UnimplementedDriver::new(VendorType::Garmin, "garmin-1"));
    let mut subscription = hub.subscribe(&[driver]);
    assert!(!hub.is_polling("garmin-1"));

    assert_eq!(hub.publish(sample_for("garmin-1", 60.0)), 1);
    assert_eq!(hub.publish(sample_for("garmin-1", 61.0)), 0);
    assert_eq!(hub.publish(sample_for("garmin-1", 62.0)), 0);

    let delivered = subscription.try_recv().map(|s| s.value);
    assert!(delivered.is_some_and(|bpm| (bpm - 60.0).abs() < f64::EPSILON));
    assert!(subscription.try_recv().is_none());

    let latest = hub.latest(RealtimeMetric::HeartRate).map(|s| s.value);
    assert!(latest.is_some_and(|bpm| (bpm - 62.0).abs() < f64::EPSILON));
}

#[tokio::test]
async fn test_every_subscriber_receives_published_sample() {
    init_test_logging();
    let hub = RealtimeHub::new(4);
    let driver: Arc<dyn DeviceDriver> = Arc::new(UnimplementedDriver::new(VendorType::Fitbit, "fitbit-1"));
    let mut first = hub.subscribe(&[Arc::clone(&driver)]);
    let mut second = hub.subscribe(&[driver]);

    assert_eq!(hub.publish(sample_for("fitbit-1", 70.0)), 2);
    assert!(first.try_recv().is_some());
    assert!(second.try_recv().is_some());

    assert_eq!(hub.publish(sample_for("unknown", 70.0)), 0);
}

#[tokio::test]
async fn test_attach_and_detach_follow_the_registry() {
    init_test_logging();
    let hub = RealtimeHub::new(4);
    let subscription = hub.subscribe(&[]);
    let driver: Arc<dyn DeviceDriver> = Arc::new(UnimplementedDriver::new(VendorType::GoogleFit, "fit-1"));

    assert_eq!(hub.publish(sample_for("fit-1", 58.0)), 0);
    hub.attach(&driver);
    assert_eq!(hub.publish(sample_for("fit-1", 59.0)), 1);

    hub.detach("fit-1");
    assert!(hub.latest(RealtimeMetric::HeartRate).is_none());
    assert_eq!(hub.publish(sample_for("fit-1", 60.0)), 0);

    let mut stream = subscription.into_stream();
    let received = stream.next().await.map(|s| s.value);
    assert!(received.is_some_and(|bpm| (bpm - 59.0).abs() < f64::EPSILON));
}

#[tokio::test(start_paused = true)]
async fn test_manager_subscription_receives_device_samples() -> Result<()> {
    let store = MockState::new(VendorType::HealthStore);
    store.set_realtime_interval(Some(Duration::from_secs(1)));
    store.set_next_sample(Some(heart_rate_sample(VendorType::HealthStore, 81.0, Utc::now())));
    let test = create_test_manager(&[store.clone()]);

    let device = test
        .manager
        .add_device(VendorType::HealthStore, SyncConfig::default(), ConnectOptions::default())
        .await?;
    let mut subscription = test.manager.subscribe_realtime().await;

    let sample = tokio::time::timeout(Duration::from_secs(10), subscription.recv())
        .await?
        .context("live sample")?;
    assert_eq!(sample.device_id, device.id);
    let latest = test.manager.realtime_heart_rate().await.context("latest heart rate")?;
    assert!((latest.value - 81.0).abs() < f64::EPSILON);

    assert!(test.manager.unsubscribe_realtime(subscription.id()));
    assert!(!test.manager.hub().is_polling(&device.id));
    test.manager.shutdown();
    Ok(())
}
