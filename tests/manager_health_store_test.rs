// ABOUTME: Integration tests for the manager over the real health store driver and a gated archive
// ABOUTME: Covers repeated incremental syncs, live heart rate without subscribers and removal during archival
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{init_test_logging, wait_until_idle, MockFactory, MockState};
use pierre_wearables::config::{SyncSettings, WearablesConfig};
use pierre_wearables::context::WearablesContext;
use pierre_wearables::drivers::health_store::{
    HealthDataType, HealthStore, InMemoryHealthStore, QuantitySample, SleepSample, SleepValue,
};
use pierre_wearables::drivers::ConnectOptions;
use pierre_wearables::errors::AppResult;
use pierre_wearables::intelligence::{AggregationPolicy, RecoveryEngine};
use pierre_wearables::manager::{ManagerParts, WearableManager};
use pierre_wearables::models::{RealtimeMetric, SyncConfig, VendorType};
use pierre_wearables::realtime::RealtimeHub;
use pierre_wearables::storage::{
    DeviceEvent, DeviceEventKind, InMemoryDeviceStore, MetricsArchive, MetricsRecord,
};
use tokio::sync::{Mutex, Semaphore};

fn quantity(data_type: HealthDataType, value: f64, end: DateTime<Utc>) -> QuantitySample {
    QuantitySample {
        data_type,
        value,
        start: end - Duration::minutes(1),
        end,
        source_name: Some("Watch".to_owned()),
    }
}

fn night_of_sleep(now: DateTime<Utc>) -> Vec<SleepSample> {
    let bedtime = now - Duration::hours(8);
    vec![
        SleepSample {
            value: SleepValue::Core,
            start: bedtime,
            end: bedtime + Duration::hours(4),
        },
        SleepSample {
            value: SleepValue::Deep,
            start: bedtime + Duration::hours(4),
            end: bedtime + Duration::hours(7),
        },
    ]
}

fn health_context(store: &Arc<InMemoryHealthStore>) -> Result<WearablesContext> {
    init_test_logging();
    let store: Arc<dyn HealthStore> = Arc::clone(store) as Arc<dyn HealthStore>;
    Ok(WearablesContext::builder(WearablesConfig::default())
        .health_store(store)
        .device_store(Arc::new(InMemoryDeviceStore::new()))
        .build()?)
}

/// Wait until the device finished at least one sync and nothing is in flight
async fn wait_for_first_sync(manager: &WearableManager, device_id: &str) -> Result<()> {
    tokio::time::timeout(StdDuration::from_secs(5), async {
        loop {
            let settled = manager
                .device(device_id)
                .await
                .is_some_and(|d| d.last_successful_sync.is_some() && !d.status.syncing);
            if settled {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    })
    .await
    .context("first sync did not finish")
}

#[tokio::test]
async fn test_repeated_syncs_keep_daily_totals_and_last_night() -> Result<()> {
    let now = Utc::now();
    let store = Arc::new(
        InMemoryHealthStore::new()
            .with_quantities([
                quantity(HealthDataType::Steps, 5_000.0, now - Duration::hours(3)),
                quantity(HealthDataType::Steps, 3_000.0, now - Duration::hours(2)),
            ])
            .with_sleep(night_of_sleep(now)),
    );
    let context = health_context(&store)?;
    let manager = context.manager();

    let device = manager
        .add_device(VendorType::HealthStore, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_for_first_sync(manager, &device.id).await?;

    let first = manager.unified_metrics(true).await;
    assert_eq!(first.steps.as_ref().map(|s| s.value), Some(8_000));
    assert!(first.sleep.is_some());

    // Minutes later the incremental window holds no new samples
    let result = manager
        .sync_device(&device.id)
        .await?
        .context("second sync should run")?;
    assert!(result.success);

    let second = manager.unified_metrics(true).await;
    assert_eq!(second.steps.as_ref().map(|s| s.value), Some(8_000));
    let sleep = second.sleep.context("last night's sleep survives")?;
    assert!((sleep.value.total_sleep_minutes - 420.0).abs() < 0.01);
    Ok(())
}

#[tokio::test]
async fn test_realtime_heart_rate_without_subscription() -> Result<()> {
    let now = Utc::now();
    let store = Arc::new(InMemoryHealthStore::new().with_quantities([
        quantity(HealthDataType::HeartRate, 68.0, now - Duration::minutes(10)),
        quantity(HealthDataType::HeartRate, 72.0, now - Duration::minutes(1)),
    ]));
    let context = health_context(&store)?;
    let manager = context.manager();

    assert!(manager.realtime_heart_rate().await.is_none());

    let device = manager
        .add_device(VendorType::HealthStore, SyncConfig::default(), ConnectOptions::default())
        .await?;
    assert!(!context.hub().is_polling(&device.id));

    let sample = manager.realtime_heart_rate().await.context("live heart rate")?;
    assert_eq!(sample.device_id, device.id);
    assert_eq!(sample.metric, RealtimeMetric::HeartRate);
    assert!((sample.value - 72.0).abs() < f64::EPSILON);
    Ok(())
}

/// Archive whose metrics writes can be held open
struct GatedArchive {
    log: Mutex<Vec<(&'static str, String)>>,
    gated: AtomicBool,
    entered: AtomicBool,
    release: Semaphore,
}

impl GatedArchive {
    fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            gated: AtomicBool::new(false),
            entered: AtomicBool::new(false),
            release: Semaphore::new(0),
        }
    }

    fn gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    async fn wait_until_entered(&self) -> Result<()> {
        tokio::time::timeout(StdDuration::from_secs(5), async {
            while !self.entered.load(Ordering::SeqCst) {
                tokio::time::sleep(StdDuration::from_millis(1)).await;
            }
        })
        .await
        .context("metrics write never started")
    }

    async fn log(&self) -> Vec<(&'static str, String)> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl MetricsArchive for GatedArchive {
    async fn record_device_event(&self, event: DeviceEvent) -> AppResult<()> {
        let kind = match event.kind {
            DeviceEventKind::Added => "added",
            DeviceEventKind::Removed => "removed",
        };
        self.log.lock().await.push((kind, event.device_id));
        Ok(())
    }

    async fn append_metrics(&self, record: MetricsRecord) -> AppResult<()> {
        if self.gated.load(Ordering::SeqCst) {
            self.entered.store(true, Ordering::SeqCst);
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
        self.log.lock().await.push(("metrics", record.device_id));
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_removal_waits_for_inflight_archive_write() -> Result<()> {
    init_test_logging();
    let whoop = MockState::with_recovery(VendorType::Whoop, 64.0);
    let archive = Arc::new(GatedArchive::new());
    let manager = WearableManager::new(ManagerParts {
        user_id: "test-user".to_owned(),
        settings: SyncSettings::default(),
        factory: Arc::new(MockFactory::new(&[whoop.clone()])),
        device_store: Arc::new(InMemoryDeviceStore::new()),
        archive: Arc::clone(&archive) as Arc<dyn MetricsArchive>,
        hub: RealtimeHub::new(16),
        aggregation: AggregationPolicy::default(),
        recovery: RecoveryEngine::default(),
    });

    let device = manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&manager, &whoop, 1).await;

    archive.gate();
    let syncing = {
        let manager = manager.clone();
        let device_id = device.id.clone();
        tokio::spawn(async move { manager.sync_device(&device_id).await })
    };
    archive.wait_until_entered().await?;

    let removing = {
        let manager = manager.clone();
        let device_id = device.id.clone();
        tokio::spawn(async move { manager.remove_device(&device_id).await })
    };
    tokio::time::sleep(StdDuration::from_millis(50)).await;
    assert!(!removing.is_finished(), "removal must wait for the archive write");

    archive.release.add_permits(1);
    let result = syncing.await??.context("sync should have run")?;
    assert!(result.success);
    removing.await??;

    let log = archive.log().await;
    let removed_at = log
        .iter()
        .position(|(kind, _)| *kind == "removed")
        .context("removal archived")?;
    assert!(log[removed_at..].iter().all(|(kind, _)| *kind != "metrics"));
    assert_eq!(log.iter().filter(|(kind, _)| *kind == "metrics").count(), 2);
    Ok(())
}
