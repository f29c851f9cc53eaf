// ABOUTME: Integration tests for the JSON file device registry
// ABOUTME: Covers first run, round trips with tokens, corrupt files and atomic replacement
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::init_test_logging;
use pierre_wearables::errors::ErrorCode;
use pierre_wearables::models::{
    ConnectionState, Device, DeviceCapabilities, DeviceStatus, SyncConfig, VendorType,
};
use pierre_wearables::oauth2_client::OAuth2Credentials;
use pierre_wearables::storage::{DeviceRecord, DeviceStore, JsonFileDeviceStore};
use tempfile::TempDir;

fn device(id: &str, vendor: VendorType) -> Device {
    let now = Utc::now();
    Device {
        id: id.to_owned(),
        vendor,
        name: vendor.display_name().to_owned(),
        model: None,
        connection_state: ConnectionState::Connected,
        last_sync_attempt: Some(now),
        last_successful_sync: Some(now),
        battery_level: Some(64),
        capabilities: DeviceCapabilities::for_vendor(vendor),
        sync_config: SyncConfig::default(),
        status: DeviceStatus {
            connected: true,
            ..DeviceStatus::default()
        },
        added_at: now - Duration::days(3),
    }
}

#[tokio::test]
async fn test_missing_registry_loads_empty() -> Result<()> {
    init_test_logging();
    let dir = TempDir::new()?;
    let store = JsonFileDeviceStore::in_dir(dir.path().join("nested"));

    assert!(store.path().ends_with("devices.json"));
    assert!(store.load_devices().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_registry_round_trips_devices_and_tokens() -> Result<()> {
    init_test_logging();
    let dir = TempDir::new()?;
    let store = JsonFileDeviceStore::in_dir(dir.path());
    let records = vec![
        DeviceRecord {
            device: device("health-1", VendorType::HealthStore),
            credentials: None,
        },
        DeviceRecord {
            device: device("whoop-1", VendorType::Whoop),
            credentials: Some(OAuth2Credentials {
                access_token: "access".to_owned(),
                refresh_token: Some("refresh".to_owned()),
                expires_at: Some(Utc::now() + Duration::hours(1)),
                scopes: vec!["read:recovery".to_owned(), "offline".to_owned()],
            }),
        },
    ];

    store.save_devices(&records).await?;
    let loaded = store.load_devices().await?;
    assert_eq!(loaded, records);

    // Registration order survives a reload through a fresh handle
    let reopened = JsonFileDeviceStore::at_path(store.path());
    let ids: Vec<String> = reopened
        .load_devices()
        .await?
        .into_iter()
        .map(|r| r.device.id)
        .collect();
    assert_eq!(ids, vec!["health-1".to_owned(), "whoop-1".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn test_save_replaces_without_leaving_temp_file() -> Result<()> {
    init_test_logging();
    let dir = TempDir::new()?;
    let store = JsonFileDeviceStore::in_dir(dir.path());

    store
        .save_devices(&[DeviceRecord {
            device: device("garmin-1", VendorType::Garmin),
            credentials: None,
        }])
        .await?;
    store.save_devices(&[]).await?;

    assert!(store.load_devices().await?.is_empty());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_corrupt_registry_is_a_storage_error() -> Result<()> {
    init_test_logging();
    let dir = TempDir::new()?;
    let store = JsonFileDeviceStore::in_dir(dir.path());
    std::fs::write(store.path(), b"{ not a registry")?;

    let error = store.load_devices().await.err();
    assert_eq!(error.map(|e| e.code), Some(ErrorCode::StorageError));
    Ok(())
}
