// ABOUTME: Integration tests for the sync orchestrator over scripted mock drivers
// ABOUTME: Covers sync windows, single-flight syncs, conflicts, persistence, exports and removal races
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]

mod common;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use common::{
    create_test_manager, create_test_manager_with_store, wait_for_sync_calls, wait_until_idle,
    MockState,
};
use pierre_wearables::drivers::ConnectOptions;
use pierre_wearables::errors::ErrorCode;
use pierre_wearables::models::{
    ConflictPreference, ConflictResolution, ConnectionState, DataCategories, MetricField,
    MetricSource, SyncConfig, SyncErrorKind, VendorType, Workout, WorkoutActivity,
};
use pierre_wearables::oauth2_client::OAuth2Credentials;
use pierre_wearables::storage::{DeviceEventKind, DeviceStore, InMemoryDeviceStore};

fn with_preference(preference: ConflictPreference) -> SyncConfig {
    SyncConfig {
        conflict_preference: preference,
        ..SyncConfig::default()
    }
}

fn close(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|value| (value - expected).abs() < 0.01)
}

fn test_workout() -> Workout {
    let end = Utc::now();
    Workout {
        id: "run-1".to_owned(),
        activity: WorkoutActivity::Running,
        start: end - Duration::minutes(40),
        end,
        energy_kcal: Some(420.0),
        distance_meters: Some(8_000.0),
        average_heart_rate: Some(152.0),
        metadata: BTreeMap::new(),
    }
}

#[tokio::test]
async fn test_add_device_syncs_default_lookback_window() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 72.0);
    let test = create_test_manager(&[whoop.clone()]);

    let device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    assert_eq!(device.connection_state, ConnectionState::Connected);
    assert!(device.status.connected);

    wait_until_idle(&test.manager, &whoop, 1).await;
    let windows = whoop.windows();
    let (start, end) = windows[0];
    assert_eq!((end - start).num_days(), 7);

    let synced = test.manager.device(&device.id).await.context("device registered")?;
    assert_eq!(synced.last_successful_sync, Some(end));
    assert!(synced.last_sync_attempt.is_some());
    Ok(())
}

#[tokio::test]
async fn test_next_sync_starts_at_last_successful_sync() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 72.0);
    let test = create_test_manager(&[whoop.clone()]);
    let device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;

    let result = test
        .manager
        .sync_device(&device.id)
        .await?
        .context("sync should run")?;
    assert!(result.success);

    let windows = whoop.windows();
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[1].0, windows[0].1);
    Ok(())
}

#[tokio::test]
async fn test_sync_while_outstanding_returns_none() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 72.0);
    whoop.hold_syncs(true);
    let test = create_test_manager(&[whoop.clone()]);
    let device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;

    wait_for_sync_calls(&whoop, 1).await;
    let outcome = test.manager.sync_device(&device.id).await?;
    assert!(outcome.is_none());
    let status = test.manager.device(&device.id).await.context("device registered")?.status;
    assert!(status.syncing);

    whoop.hold_syncs(false);
    whoop.release_one();
    wait_until_idle(&test.manager, &whoop, 1).await;
    assert_eq!(whoop.sync_calls(), 1);
    let status = test.manager.device(&device.id).await.context("device registered")?.status;
    assert!(!status.syncing);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_vendor_is_rejected() -> Result<()> {
    let whoop = MockState::new(VendorType::Whoop);
    let test = create_test_manager(&[whoop.clone()]);
    test.manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;

    let second = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await;
    assert_eq!(second.err().map(|e| e.code), Some(ErrorCode::ResourceAlreadyExists));
    assert_eq!(test.manager.devices().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_vendor_without_driver_is_not_registered() {
    let test = create_test_manager(&[]);
    let result = test
        .manager
        .add_device(VendorType::Fitbit, SyncConfig::default(), ConnectOptions::default())
        .await;

    assert_eq!(result.err().map(|e| e.code), Some(ErrorCode::NotImplemented));
    assert!(test.manager.devices().await.is_empty());
    assert_eq!(test.device_store.save_count(), 0);
}

#[tokio::test]
async fn test_declined_permissions_block_registration() {
    let store = MockState::new(VendorType::HealthStore);
    store.deny_permissions();
    let test = create_test_manager(&[store.clone()]);

    let result = test
        .manager
        .add_device(VendorType::HealthStore, SyncConfig::default(), ConnectOptions::default())
        .await;

    assert_eq!(result.err().map(|e| e.code), Some(ErrorCode::PermissionDenied));
    assert!(test.manager.devices().await.is_empty());
    assert_eq!(store.sync_calls(), 0);
}

#[tokio::test]
async fn test_sync_result_discarded_when_device_removed_mid_sync() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 72.0);
    let test = create_test_manager(&[whoop.clone()]);
    let device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;
    assert_eq!(test.archive.metrics().await.len(), 1);

    whoop.hold_syncs(true);
    let manager = test.manager.clone();
    let device_id = device.id.clone();
    let pending = tokio::spawn(async move { manager.sync_device(&device_id).await });
    wait_for_sync_calls(&whoop, 2).await;

    test.manager.remove_device(&device.id).await?;
    whoop.release_one();

    let result = pending.await??.context("sync should have run")?;
    assert!(result.success);
    assert_eq!(test.archive.metrics().await.len(), 1);
    assert!(test.manager.devices().await.is_empty());
    assert!(test.device_store.load_devices().await?.is_empty());
    assert!(test.manager.unified_metrics(true).await.recovery.is_none());
    Ok(())
}

#[tokio::test]
async fn test_failed_sync_keeps_previous_values() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 70.0);
    let test = create_test_manager(&[whoop.clone()]);
    let device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;

    whoop.fail_with(Some(SyncErrorKind::NetworkFailure));
    let result = test
        .manager
        .sync_device(&device.id)
        .await?
        .context("sync should run")?;
    assert!(!result.success);
    assert!(result.has_error(SyncErrorKind::NetworkFailure));

    let snapshot = test.manager.unified_metrics(true).await;
    assert!(close(snapshot.recovery.map(|r| r.value), 70.0));
    let after = test.manager.device(&device.id).await.context("device registered")?;
    assert_eq!(after.connection_state, ConnectionState::Connected);
    assert!(after.status.connected);
    assert!(after.status.last_error.is_some());
    assert_eq!(after.last_successful_sync, device_last_success(&whoop));
    Ok(())
}

fn device_last_success(state: &MockState) -> Option<chrono::DateTime<Utc>> {
    state.windows().first().map(|(_, end)| *end)
}

#[tokio::test]
async fn test_expired_authorization_marks_device_error() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 70.0);
    let test = create_test_manager(&[whoop.clone()]);
    let device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;

    whoop.fail_with(Some(SyncErrorKind::AuthExpired));
    test.manager.sync_device(&device.id).await?;

    let after = test.manager.device(&device.id).await.context("device registered")?;
    assert_eq!(after.connection_state, ConnectionState::Error);
    assert!(!after.status.connected);
    assert!(close(test.manager.combined_recovery_score().await, 70.0));
    Ok(())
}

#[tokio::test]
async fn test_manual_conflict_withheld_until_accepted() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 80.0);
    let garmin = MockState::with_recovery(VendorType::Garmin, 50.0);
    let test = create_test_manager(&[whoop.clone(), garmin.clone()]);

    test.manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;
    let garmin_device = test
        .manager
        .add_device(
            VendorType::Garmin,
            with_preference(ConflictPreference::Manual),
            ConnectOptions::default(),
        )
        .await?;
    wait_until_idle(&test.manager, &garmin, 1).await;

    let result = test
        .manager
        .sync_device(&garmin_device.id)
        .await?
        .context("sync should run")?;
    assert!(result.success);
    assert!(result.has_error(SyncErrorKind::ConflictUnresolved));
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].resolution, ConflictResolution::Unresolved);

    let snapshot = test.manager.unified_metrics(false).await;
    assert_eq!(snapshot.pending_conflicts.len(), 1);
    let pending = &snapshot.pending_conflicts[0];
    assert_eq!(pending.field, MetricField::Recovery);
    assert_eq!(pending.incoming.vendor, VendorType::Garmin);
    assert_eq!(pending.existing.vendor, VendorType::Whoop);
    let recovery = snapshot.recovery.context("whoop recovery present")?;
    assert!((recovery.value - 80.0).abs() < 0.01);
    assert!(matches!(recovery.source, MetricSource::Device { vendor: VendorType::Whoop, .. }));
    let status = test.manager.device(&garmin_device.id).await.context("garmin registered")?.status;
    assert_eq!(status.pending_items, 1);

    let resolved = test
        .manager
        .resolve_conflict(&garmin_device.id, MetricField::Recovery, true)
        .await?;
    assert_eq!(resolved.resolution, ConflictResolution::AcceptedIncoming);

    // (80 * 1.0 + 50 * 0.8) / 1.8
    let snapshot = test.manager.unified_metrics(false).await;
    assert!(snapshot.pending_conflicts.is_empty());
    assert!(close(snapshot.recovery.map(|r| r.value), 66.67));
    let status = test.manager.device(&garmin_device.id).await.context("garmin registered")?.status;
    assert_eq!(status.pending_items, 0);

    let again = test
        .manager
        .resolve_conflict(&garmin_device.id, MetricField::Recovery, true)
        .await;
    assert_eq!(again.err().map(|e| e.code), Some(ErrorCode::ResourceNotFound));
    Ok(())
}

#[tokio::test]
async fn test_rejected_conflict_keeps_existing_value() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 80.0);
    let garmin = MockState::with_recovery(VendorType::Garmin, 50.0);
    let test = create_test_manager(&[whoop.clone(), garmin.clone()]);

    test.manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;
    let garmin_device = test
        .manager
        .add_device(
            VendorType::Garmin,
            with_preference(ConflictPreference::Manual),
            ConnectOptions::default(),
        )
        .await?;
    wait_until_idle(&test.manager, &garmin, 1).await;

    let resolved = test
        .manager
        .resolve_conflict(&garmin_device.id, MetricField::Recovery, false)
        .await?;
    assert_eq!(resolved.resolution, ConflictResolution::KeptExisting);

    let snapshot = test.manager.unified_metrics(true).await;
    assert!(snapshot.pending_conflicts.is_empty());
    assert!(close(snapshot.recovery.map(|r| r.value), 80.0));
    Ok(())
}

#[tokio::test]
async fn test_prefer_local_drops_conflicting_field() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 80.0);
    let garmin = MockState::with_recovery(VendorType::Garmin, 50.0);
    let test = create_test_manager(&[whoop.clone(), garmin.clone()]);

    test.manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;
    let garmin_device = test
        .manager
        .add_device(
            VendorType::Garmin,
            with_preference(ConflictPreference::PreferLocal),
            ConnectOptions::default(),
        )
        .await?;
    wait_until_idle(&test.manager, &garmin, 1).await;

    let result = test
        .manager
        .sync_device(&garmin_device.id)
        .await?
        .context("sync should run")?;
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].resolution, ConflictResolution::KeptExisting);
    assert!(!result.has_error(SyncErrorKind::ConflictUnresolved));

    let snapshot = test.manager.unified_metrics(true).await;
    assert!(snapshot.pending_conflicts.is_empty());
    assert!(close(snapshot.recovery.map(|r| r.value), 80.0));
    Ok(())
}

#[tokio::test]
async fn test_prefer_device_blends_conflicting_recovery() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 80.0);
    let garmin = MockState::with_recovery(VendorType::Garmin, 50.0);
    let test = create_test_manager(&[whoop.clone(), garmin.clone()]);

    test.manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;
    let garmin_device = test
        .manager
        .add_device(VendorType::Garmin, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &garmin, 1).await;

    let result = test
        .manager
        .sync_device(&garmin_device.id)
        .await?
        .context("sync should run")?;
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].resolution, ConflictResolution::PriorityRules);

    let snapshot = test.manager.unified_metrics(true).await;
    let recovery = snapshot.recovery.context("blended recovery")?;
    assert!((recovery.value - 66.67).abs() < 0.01);
    assert!(matches!(recovery.source, MetricSource::Combined { .. }));
    Ok(())
}

#[tokio::test]
async fn test_fields_outside_capabilities_are_dropped() -> Result<()> {
    let whoop = MockState::new(VendorType::Whoop);
    whoop.fill(|bundle| {
        bundle.steps = Some(12_000);
        bundle.strain = Some(11.5);
    });
    let test = create_test_manager(&[whoop.clone()]);
    let device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;

    let snapshot = test.manager.unified_metrics(true).await;
    assert!(snapshot.steps.is_none());
    assert!(close(snapshot.strain.map(|s| s.value), 11.5));

    let archived = test.archive.metrics_for(&device.id).await;
    assert_eq!(archived.len(), 1);
    assert!(archived[0].bundle.steps.is_none());
    Ok(())
}

#[tokio::test]
async fn test_unselected_categories_are_not_aggregated() -> Result<()> {
    let whoop = MockState::new(VendorType::Whoop);
    whoop.fill(|bundle| {
        bundle.strain = Some(14.0);
        bundle.calories_kcal = Some(2_400.0);
    });
    let test = create_test_manager(&[whoop.clone()]);
    let config = SyncConfig {
        categories: DataCategories::ACTIVITY,
        ..SyncConfig::default()
    };
    test.manager
        .add_device(VendorType::Whoop, config, ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;

    let snapshot = test.manager.unified_metrics(true).await;
    assert!(snapshot.strain.is_none());
    assert!(close(snapshot.calories_kcal.map(|c| c.value), 2_400.0));
    Ok(())
}

#[tokio::test]
async fn test_sync_all_devices_reports_each_device() -> Result<()> {
    let whoop = MockState::with_recovery(VendorType::Whoop, 75.0);
    let garmin = MockState::with_recovery(VendorType::Garmin, 74.0);
    garmin.fail_with(Some(SyncErrorKind::RateLimited));
    let test = create_test_manager(&[whoop.clone(), garmin.clone()]);

    test.manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    test.manager
        .add_device(VendorType::Garmin, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;
    wait_until_idle(&test.manager, &garmin, 1).await;

    let results = test.manager.sync_all_devices().await;
    assert_eq!(results.len(), 2);
    assert_eq!(results.iter().filter(|r| r.success).count(), 1);
    assert!(results
        .iter()
        .any(|r| r.vendor == VendorType::Garmin && r.has_error(SyncErrorKind::RateLimited)));
    assert!(close(test.manager.combined_recovery_score().await, 75.0));
    Ok(())
}

#[tokio::test]
async fn test_registry_persisted_and_restored_with_tokens() -> Result<()> {
    let credentials = OAuth2Credentials {
        access_token: "access".to_owned(),
        refresh_token: Some("refresh".to_owned()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scopes: vec!["read:recovery".to_owned()],
    };
    let store = InMemoryDeviceStore::new();
    let whoop = MockState::with_recovery(VendorType::Whoop, 66.0);
    let first = create_test_manager_with_store(&[whoop.clone()], store.clone());
    let device = first
        .manager
        .add_device(
            VendorType::Whoop,
            SyncConfig::default(),
            ConnectOptions::with_credentials(credentials.clone()),
        )
        .await?;
    wait_until_idle(&first.manager, &whoop, 1).await;

    let records = store.load_devices().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].device.id, device.id);
    assert_eq!(records[0].credentials.as_ref(), Some(&credentials));
    assert!(!records[0].device.status.syncing);

    let restarted = MockState::new(VendorType::Whoop);
    let second = create_test_manager_with_store(&[restarted.clone()], store);
    let restored = second.manager.restore_devices().await?;
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].id, device.id);
    assert!(restored[0].status.connected);
    assert!(restored[0].last_successful_sync.is_some());
    assert_eq!(restarted.connected_with(), Some(credentials));
    Ok(())
}

#[tokio::test]
async fn test_restore_keeps_devices_that_fail_to_reconnect() -> Result<()> {
    let store = InMemoryDeviceStore::new();
    let whoop = MockState::new(VendorType::Whoop);
    let first = create_test_manager_with_store(&[whoop.clone()], store.clone());
    first
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&first.manager, &whoop, 1).await;

    let broken = MockState::new(VendorType::Whoop);
    broken.fail_connect();
    let second = create_test_manager_with_store(&[broken], store);
    let restored = second.manager.restore_devices().await?;

    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].connection_state, ConnectionState::Error);
    assert!(!restored[0].status.connected);
    assert!(restored[0].status.last_error.is_some());
    assert_eq!(second.manager.devices().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_export_workout_reports_per_device() -> Result<()> {
    let health = MockState::new(VendorType::HealthStore);
    let whoop = MockState::new(VendorType::Whoop);
    let test = create_test_manager(&[health.clone(), whoop.clone()]);
    let health_device = test
        .manager
        .add_device(VendorType::HealthStore, SyncConfig::default(), ConnectOptions::default())
        .await?;
    let whoop_device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;

    let outcomes = test.manager.export_workout(&test_workout()).await;
    assert_eq!(outcomes.len(), 2);

    let health_outcome = outcomes
        .iter()
        .find(|o| o.device_id == health_device.id)
        .context("health store outcome")?;
    assert!(health_outcome.exported);
    let whoop_outcome = outcomes
        .iter()
        .find(|o| o.device_id == whoop_device.id)
        .context("whoop outcome")?;
    assert!(!whoop_outcome.exported);
    assert!(whoop_outcome.error.is_none());

    assert_eq!(health.exports(), 1);
    assert_eq!(whoop.exports(), 0);
    Ok(())
}

#[tokio::test]
async fn test_device_lifecycle_is_archived() -> Result<()> {
    let whoop = MockState::new(VendorType::Whoop);
    let test = create_test_manager(&[whoop.clone()]);
    let device = test
        .manager
        .add_device(VendorType::Whoop, SyncConfig::default(), ConnectOptions::default())
        .await?;
    wait_until_idle(&test.manager, &whoop, 1).await;
    test.manager.remove_device(&device.id).await?;

    let kinds: Vec<DeviceEventKind> = test.archive.events().await.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![DeviceEventKind::Added, DeviceEventKind::Removed]);
    assert!(test.archive.events().await.iter().all(|e| e.user_id == "test-user"));

    let missing = test.manager.remove_device(&device.id).await;
    assert_eq!(missing.err().map(|e| e.code), Some(ErrorCode::ResourceNotFound));
    Ok(())
}

#[tokio::test]
async fn test_auto_sync_handle_stops_cleanly() {
    let test = create_test_manager(&[]);
    let handle = test.manager.start_auto_sync();
    assert!(handle.is_running());
    handle.stop().await;
}

#[tokio::test]
async fn test_metered_network_flag_round_trips() {
    let test = create_test_manager(&[]);
    assert!(!test.manager.on_metered_network());
    test.manager.set_on_metered_network(true);
    assert!(test.manager.on_metered_network());
}
