// ABOUTME: In-memory device store and metrics archive for tests, demos and ephemeral deployments
// ABOUTME: Both are cheap to clone and expose read accessors for assertions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DeviceEvent, DeviceRecord, DeviceStore, MetricsArchive, MetricsRecord};
use crate::errors::AppResult;

/// Device store kept in memory
#[derive(Clone, Default)]
pub struct InMemoryDeviceStore {
    records: Arc<RwLock<Vec<DeviceRecord>>>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryDeviceStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with records
    #[must_use]
    pub fn with_records(records: Vec<DeviceRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of saves so far
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn load_devices(&self) -> AppResult<Vec<DeviceRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn save_devices(&self, records: &[DeviceRecord]) -> AppResult<()> {
        *self.records.write().await = records.to_vec();
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Archive kept in memory
#[derive(Clone, Default)]
pub struct InMemoryMetricsArchive {
    events: Arc<RwLock<Vec<DeviceEvent>>>,
    metrics: Arc<RwLock<Vec<MetricsRecord>>>,
}

impl InMemoryMetricsArchive {
    /// Empty archive
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every archived event
    pub async fn events(&self) -> Vec<DeviceEvent> {
        self.events.read().await.clone()
    }

    /// Every archived metrics record
    pub async fn metrics(&self) -> Vec<MetricsRecord> {
        self.metrics.read().await.clone()
    }

    /// Metrics records of one device
    pub async fn metrics_for(&self, device_id: &str) -> Vec<MetricsRecord> {
        self.metrics
            .read()
            .await
            .iter()
            .filter(|record| record.device_id == device_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MetricsArchive for InMemoryMetricsArchive {
    async fn record_device_event(&self, event: DeviceEvent) -> AppResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn append_metrics(&self, record: MetricsRecord) -> AppResult<()> {
        self.metrics.write().await.push(record);
        Ok(())
    }
}
