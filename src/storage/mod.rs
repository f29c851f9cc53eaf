// ABOUTME: Persistence boundaries for the device registry and the append-only metrics archive
// ABOUTME: The manager only sees these traits; in-memory and JSON-file implementations live alongside
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Storage
//!
//! - [`DeviceStore`] holds the registry: every linked device plus the tokens
//!   needed to reconnect it. Saved whole after each add, remove and sync.
//! - [`MetricsArchive`] is append-only: a device event on add/remove and one
//!   metrics record per successful sync, addressed by user, device and time.

/// JSON file device store
pub mod file;
/// In-memory implementations
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use file::JsonFileDeviceStore;
pub use memory::{InMemoryDeviceStore, InMemoryMetricsArchive};

use crate::errors::AppResult;
use crate::models::{Device, PartialMetricBundle, VendorType};
use crate::oauth2_client::OAuth2Credentials;

/// Persisted registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device as last seen
    pub device: Device,
    /// Tokens for OAuth vendors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<OAuth2Credentials>,
}

/// Registry persistence
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Every stored record, in registration order
    async fn load_devices(&self) -> AppResult<Vec<DeviceRecord>>;

    /// Replace the stored registry
    async fn save_devices(&self, records: &[DeviceRecord]) -> AppResult<()>;
}

/// Lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEventKind {
    /// Device linked
    Added,
    /// Device removed
    Removed,
}

/// Archived device lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// Owner
    pub user_id: String,
    /// Device
    pub device_id: String,
    /// Vendor
    pub vendor: VendorType,
    /// What happened
    pub kind: DeviceEventKind,
    /// When
    pub at: DateTime<Utc>,
}

/// Archived metrics of one successful sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Owner
    pub user_id: String,
    /// Device
    pub device_id: String,
    /// When the sync completed
    pub recorded_at: DateTime<Utc>,
    /// Bundle produced
    pub bundle: PartialMetricBundle,
}

/// Append-only archive
#[async_trait]
pub trait MetricsArchive: Send + Sync {
    /// Append a device lifecycle event
    async fn record_device_event(&self, event: DeviceEvent) -> AppResult<()>;

    /// Append a sync's metrics
    async fn append_metrics(&self, record: MetricsRecord) -> AppResult<()>;
}
