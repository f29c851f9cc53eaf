// ABOUTME: Ordered registry of linked devices, their drivers and their latest accepted bundles
// ABOUTME: Also holds the syncing set whose guard clears a device's flag however the sync ends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::RwLock;

use super::conflicts::PendingConflict;
use crate::drivers::DeviceDriver;
use crate::models::{DataConflict, DataQuality, Device, MetricField, PartialMetricBundle, VendorType};
use crate::storage::DeviceRecord;

/// One registry slot
pub(super) struct RegisteredDevice {
    pub device: Device,
    pub driver: Arc<dyn DeviceDriver>,
    /// Last bundle accepted from this device
    pub latest: Option<PartialMetricBundle>,
    /// Fields withheld for a manual decision
    pub pending: Vec<PendingConflict>,
}

impl RegisteredDevice {
    pub fn new(device: Device, driver: Arc<dyn DeviceDriver>) -> Self {
        Self {
            device,
            driver,
            latest: None,
            pending: Vec::new(),
        }
    }
}

/// Devices in registration order
#[derive(Default)]
pub(super) struct DeviceRegistry {
    entries: RwLock<Vec<RegisteredDevice>>,
}

impl DeviceRegistry {
    /// Register unless the vendor is already linked; hands the slot back on refusal
    pub async fn insert(&self, entry: RegisteredDevice) -> Result<(), RegisteredDevice> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.device.vendor == entry.device.vendor) {
            return Err(entry);
        }
        entries.push(entry);
        Ok(())
    }

    pub async fn remove(&self, device_id: &str) -> Option<RegisteredDevice> {
        let mut entries = self.entries.write().await;
        let index = entries.iter().position(|e| e.device.id == device_id)?;
        Some(entries.remove(index))
    }

    pub async fn has_vendor(&self, vendor: VendorType) -> bool {
        self.entries.read().await.iter().any(|e| e.device.vendor == vendor)
    }

    pub async fn device(&self, device_id: &str) -> Option<Device> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.device.id == device_id)
            .map(|e| e.device.clone())
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.entries.read().await.iter().map(|e| e.device.clone()).collect()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.entries.read().await.iter().map(|e| e.device.id.clone()).collect()
    }

    pub async fn driver(&self, device_id: &str) -> Option<(Device, Arc<dyn DeviceDriver>)> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.device.id == device_id)
            .map(|e| (e.device.clone(), Arc::clone(&e.driver)))
    }

    /// Drivers of connected devices, optionally restricted to one vendor
    pub async fn connected_drivers(&self, vendor: Option<VendorType>) -> Vec<Arc<dyn DeviceDriver>> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.device.status.connected)
            .filter(|e| vendor.is_none_or(|v| e.device.vendor == v))
            .map(|e| Arc::clone(&e.driver))
            .collect()
    }

    /// Latest bundles in registration order
    pub async fn bundles(&self) -> Vec<PartialMetricBundle> {
        self.entries
            .read()
            .await
            .iter()
            .filter_map(|e| e.latest.clone())
            .collect()
    }

    /// Latest bundles of every device except one
    pub async fn bundles_except(&self, device_id: &str) -> Vec<PartialMetricBundle> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.device.id != device_id)
            .filter_map(|e| e.latest.clone())
            .collect()
    }

    pub async fn pending_conflicts(&self) -> Vec<DataConflict> {
        self.entries
            .read()
            .await
            .iter()
            .flat_map(|e| e.pending.iter().map(|p| p.conflict.clone()))
            .collect()
    }

    /// Mutate one slot; `None` when the device is gone
    pub async fn update<R>(&self, device_id: &str, apply: impl FnOnce(&mut RegisteredDevice) -> R) -> Option<R> {
        let mut entries = self.entries.write().await;
        entries.iter_mut().find(|e| e.device.id == device_id).map(apply)
    }

    /// Devices paired with their drivers, for persistence
    pub async fn snapshot(&self) -> Vec<(Device, Arc<dyn DeviceDriver>)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| (e.device.clone(), Arc::clone(&e.driver)))
            .collect()
    }
}

/// Registry records including the tokens each driver holds
pub(super) async fn to_records(entries: Vec<(Device, Arc<dyn DeviceDriver>)>) -> Vec<DeviceRecord> {
    let mut records = Vec::with_capacity(entries.len());
    for (mut device, driver) in entries {
        device.status.syncing = false;
        records.push(DeviceRecord {
            credentials: driver.credentials().await,
            device,
        });
    }
    records
}

/// Device ids with a sync outstanding
#[derive(Default)]
pub(super) struct SyncingSet {
    ids: Arc<DashSet<String>>,
}

impl SyncingSet {
    /// Claim the device; `None` if a sync is already outstanding
    pub fn acquire(&self, device_id: &str) -> Option<SyncGuard> {
        self.ids.insert(device_id.to_owned()).then(|| SyncGuard {
            ids: Arc::clone(&self.ids),
            device_id: device_id.to_owned(),
        })
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.ids.contains(device_id)
    }
}

/// Releases the device on drop, including when the sync future is cancelled
pub(super) struct SyncGuard {
    ids: Arc<DashSet<String>>,
    device_id: String,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.ids.remove(&self.device_id);
    }
}

/// Grade the share of expected fields a bundle populated
///
/// Expected fields are those the device can report and is configured to pull.
pub(super) fn data_quality(device: &Device, bundle: &PartialMetricBundle) -> DataQuality {
    let expected: Vec<MetricField> = MetricField::ALL
        .into_iter()
        .filter(|field| device.capabilities.contains(field.required_capability()))
        .filter(|field| device.sync_config.categories.contains(field.category()))
        .collect();
    if expected.is_empty() {
        return DataQuality::Unknown;
    }
    let populated = expected.iter().filter(|field| bundle.has(**field)).count();
    DataQuality::from_coverage(populated as f64 / expected.len() as f64)
}

/// Clear fields whose category the device is not configured to pull
pub(super) fn restrict_to_categories(device: &Device, bundle: &mut PartialMetricBundle) -> Vec<MetricField> {
    let skipped: Vec<MetricField> = bundle
        .populated_fields()
        .into_iter()
        .filter(|field| !device.sync_config.categories.contains(field.category()))
        .collect();
    for field in &skipped {
        bundle.clear(*field);
    }
    skipped
}
