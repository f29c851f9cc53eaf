// ABOUTME: Driver for vendors whose integration is not wired up yet (Garmin, Fitbit, Google Fit)
// ABOUTME: Implements the whole interface but never connects and reports every sync as not implemented
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::core::{ConnectOptions, DeviceDriver, DeviceInfo, PermissionModel, PermissionRecord};
use super::errors::{DriverError, DriverResult};
use crate::models::{SyncResult, VendorType, Workout};

/// Placeholder driver that always reports `NotImplemented`
pub struct UnimplementedDriver {
    vendor: VendorType,
    device_id: String,
}

impl UnimplementedDriver {
    /// Create the stub for a vendor
    #[must_use]
    pub fn new(vendor: VendorType, device_id: impl Into<String>) -> Self {
        Self {
            vendor,
            device_id: device_id.into(),
        }
    }

    const fn not_implemented(&self) -> DriverError {
        DriverError::NotImplemented {
            vendor: self.vendor,
        }
    }
}

#[async_trait]
impl DeviceDriver for UnimplementedDriver {
    fn vendor(&self) -> VendorType {
        self.vendor
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn connect(&self, _options: &ConnectOptions) -> DriverResult<bool> {
        debug!(vendor = %self.vendor, "Connect requested for vendor without integration");
        Err(self.not_implemented())
    }

    async fn disconnect(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        false
    }

    async fn request_permissions(&self) -> DriverResult<PermissionRecord> {
        Ok(PermissionRecord::denied(PermissionModel::None, Vec::new(), Vec::new()))
    }

    async fn check_permissions(&self) -> DriverResult<PermissionRecord> {
        Ok(PermissionRecord::denied(PermissionModel::None, Vec::new(), Vec::new()))
    }

    async fn sync_data(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SyncResult {
        SyncResult::failed(
            self.device_id.clone(),
            self.vendor,
            start,
            end,
            self.not_implemented().to_sync_error(),
        )
    }

    async fn export_workout(&self, _workout: &Workout) -> DriverResult<bool> {
        Ok(false)
    }

    async fn device_info(&self) -> DriverResult<DeviceInfo> {
        Ok(DeviceInfo::for_vendor(self.vendor))
    }
}
