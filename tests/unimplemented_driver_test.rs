// ABOUTME: Integration tests for vendors without a wired-up integration
// ABOUTME: Garmin, Fitbit and Google Fit must fail cleanly with NotImplemented
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::init_test_logging;
use pierre_wearables::config::WearablesConfig;
use pierre_wearables::context::WearablesContext;
use pierre_wearables::drivers::unimplemented::UnimplementedDriver;
use pierre_wearables::drivers::{ConnectOptions, DeviceDriver, DriverError, PermissionModel};
use pierre_wearables::errors::ErrorCode;
use pierre_wearables::models::{SyncConfig, SyncErrorKind, VendorType, Workout, WorkoutActivity};
use pierre_wearables::storage::InMemoryDeviceStore;

#[tokio::test]
async fn test_adding_thin_vendors_fails_with_not_implemented() -> Result<()> {
    init_test_logging();
    let store = InMemoryDeviceStore::new();
    let context = WearablesContext::builder(WearablesConfig::default())
        .device_store(Arc::new(store.clone()))
        .build()?;

    for vendor in [VendorType::Garmin, VendorType::Fitbit, VendorType::GoogleFit] {
        let outcome = context
            .manager()
            .add_device(vendor, SyncConfig::default(), ConnectOptions::default())
            .await;
        let error = outcome.err();
        assert_eq!(error.map(|e| e.code), Some(ErrorCode::NotImplemented), "{vendor}");
    }

    assert!(context.manager().devices().await.is_empty());
    assert_eq!(store.save_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_stub_reports_not_implemented_everywhere() -> Result<()> {
    init_test_logging();
    let driver = UnimplementedDriver::new(VendorType::Garmin, "garmin-1");

    let connect = driver.connect(&ConnectOptions::default()).await;
    assert!(matches!(connect, Err(DriverError::NotImplemented { .. })));
    assert!(!driver.is_connected().await);

    let end = Utc::now();
    let result = driver.sync_data(end - Duration::days(1), end).await;
    assert!(!result.success);
    assert!(result.has_error(SyncErrorKind::NotImplemented));
    assert_eq!(result.device_id, "garmin-1");

    let permissions = driver.request_permissions().await?;
    assert!(!permissions.granted);
    assert_eq!(permissions.model, PermissionModel::None);

    let workout = Workout {
        id: "ride".to_owned(),
        activity: WorkoutActivity::Cycling,
        start: end - Duration::hours(1),
        end,
        energy_kcal: None,
        distance_meters: None,
        average_heart_rate: None,
        metadata: BTreeMap::new(),
    };
    assert!(!driver.export_workout(&workout).await?);
    assert!(driver.realtime_interval().is_none());
    Ok(())
}
