// ABOUTME: WearableManager, the sync orchestrator and single entry point for consumers
// ABOUTME: Owns the device registry, serializes per-device syncs and rebuilds the cached unified snapshot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Wearable Manager
//!
//! The manager is the only component that mutates the registry or the snapshot
//! cache. Everything else reads through it.
//!
//! ## Sync
//!
//! - At most one sync per device is outstanding. A second [`WearableManager::sync_device`]
//!   call for the same id returns `Ok(None)` immediately.
//! - The window is `[last_successful_sync, now)`, or the configured lookback for a
//!   device that never synced.
//! - A failed sync is scoped to its device. The device's previous bundle stays in
//!   place, so the snapshot keeps the last good values.
//! - A result that arrives after its device was removed is discarded: nothing is
//!   archived, persisted or aggregated for it.
//!
//! ## Snapshot
//!
//! [`WearableManager::unified_metrics`] serves the cached snapshot while it is
//! younger than the TTL. Syncs, removals and push events invalidate it.

/// Conflict preference handling
mod conflicts;
/// Registry and syncing set
mod registry;
/// Auto-sync loop
pub mod scheduler;
/// Snapshot cache
mod snapshot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub use scheduler::AutoSyncHandle;

use self::conflicts::{apply_preference, Resolved};
use self::registry::{data_quality, restrict_to_categories, to_records, DeviceRegistry, RegisteredDevice, SyncingSet};
use self::snapshot::SnapshotCache;
use crate::config::SyncSettings;
use crate::constants::sync::CONFLICT_TOLERANCE;
use crate::drivers::{ConnectOptions, DeviceDriver, DeviceInfo, DriverError, DriverFactory};
use crate::errors::{AppError, AppResult};
use crate::intelligence::{combine, detect_conflicts, enforce_capabilities, AggregationPolicy, RecoveryEngine};
use crate::models::{
    ConflictResolution, ConnectionState, DataConflict, Device, DeviceStatus, MetricField,
    PartialMetricBundle, PushEvent, RealtimeMetric, RealtimeSample, SyncConfig, SyncError, SyncErrorKind, SyncResult,
    UnifiedMetrics, VendorType, Workout, WorkoutActivity, WorkoutExportOutcome,
};
use crate::realtime::{RealtimeHub, RealtimeSubscription};
use crate::storage::{DeviceEvent, DeviceEventKind, DeviceRecord, DeviceStore, MetricsArchive, MetricsRecord};

/// Collaborators a manager is built from
pub struct ManagerParts {
    /// Owner of every device and archived record
    pub user_id: String,
    /// Lookback, TTL and auto-sync settings
    pub settings: SyncSettings,
    /// Vendor to driver mapping
    pub factory: Arc<dyn DriverFactory>,
    /// Registry persistence
    pub device_store: Arc<dyn DeviceStore>,
    /// Append-only archive
    pub archive: Arc<dyn MetricsArchive>,
    /// Real-time fan-out
    pub hub: RealtimeHub,
    /// Aggregation priorities and freshness
    pub aggregation: AggregationPolicy,
    /// Recovery and recommendation derivation
    pub recovery: RecoveryEngine,
}

struct ManagerInner {
    user_id: String,
    settings: SyncSettings,
    factory: Arc<dyn DriverFactory>,
    device_store: Arc<dyn DeviceStore>,
    archive: Arc<dyn MetricsArchive>,
    hub: RealtimeHub,
    aggregation: AggregationPolicy,
    recovery: RecoveryEngine,
    registry: DeviceRegistry,
    syncing: SyncingSet,
    snapshot: SnapshotCache,
    persist_lock: Mutex<()>,
    /// Held while a sync result is committed and archived, and while a device is removed
    membership: Mutex<()>,
    metered: AtomicBool,
}

/// Sync orchestrator
#[derive(Clone)]
pub struct WearableManager {
    inner: Arc<ManagerInner>,
}

impl WearableManager {
    /// Build a manager with an empty registry
    #[must_use]
    pub fn new(parts: ManagerParts) -> Self {
        let snapshot = SnapshotCache::new(parts.settings.snapshot_ttl);
        Self {
            inner: Arc::new(ManagerInner {
                user_id: parts.user_id,
                settings: parts.settings,
                factory: parts.factory,
                device_store: parts.device_store,
                archive: parts.archive,
                hub: parts.hub,
                aggregation: parts.aggregation,
                recovery: parts.recovery,
                registry: DeviceRegistry::default(),
                syncing: SyncingSet::default(),
                snapshot,
                persist_lock: Mutex::new(()),
                membership: Mutex::new(()),
                metered: AtomicBool::new(false),
            }),
        }
    }

    /// Owner of the registry
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Real-time hub shared with webhook routes
    #[must_use]
    pub fn hub(&self) -> &RealtimeHub {
        &self.inner.hub
    }

    /// Link a vendor account
    ///
    /// Creates the driver, obtains permissions, connects, registers and persists
    /// the device, then starts a background sync.
    ///
    /// # Errors
    ///
    /// - `ResourceAlreadyExists` if a device of this vendor is already linked
    /// - `PermissionDenied` if the user declined access
    /// - the driver's connect error (e.g. `NotImplemented` for vendors without an integration)
    #[instrument(skip(self, config, options), fields(user_id = %self.inner.user_id, vendor = %vendor))]
    pub async fn add_device(&self, vendor: VendorType, config: SyncConfig, options: ConnectOptions) -> AppResult<Device> {
        if self.inner.registry.has_vendor(vendor).await {
            return Err(duplicate_vendor(vendor));
        }

        let device_id = Uuid::new_v4().to_string();
        let driver = self
            .inner
            .factory
            .create(vendor, &device_id)
            .map_err(|e| AppError::from(e).with_device(&device_id))?;

        // OAuth vendors grant access through the scopes issued at connect
        if !vendor.uses_oauth() {
            let permissions = driver.request_permissions().await?;
            if !permissions.granted {
                return Err(permission_denied(vendor, &permissions.missing));
            }
        }

        let connected = driver
            .connect(&options)
            .await
            .map_err(|e| AppError::from(e).with_device(&device_id))?;
        if !connected {
            return Err(AppError::external_service(vendor.display_name(), "Connection was refused")
                .with_device(&device_id));
        }

        if vendor.uses_oauth() {
            let permissions = driver.check_permissions().await?;
            if !permissions.granted {
                disconnect_quietly(driver.as_ref()).await;
                return Err(permission_denied(vendor, &permissions.missing));
            }
        }

        let info = match driver.device_info().await {
            Ok(info) => info,
            Err(error) => {
                warn!(device_id, %error, "Device info unavailable, using vendor defaults");
                DeviceInfo::for_vendor(vendor)
            }
        };

        let device = Device {
            id: device_id.clone(),
            vendor,
            name: info.name,
            model: info.model,
            connection_state: ConnectionState::Connected,
            last_sync_attempt: None,
            last_successful_sync: None,
            battery_level: info.battery_level,
            capabilities: driver.capabilities(),
            sync_config: config,
            status: DeviceStatus {
                connected: true,
                ..DeviceStatus::default()
            },
            added_at: Utc::now(),
        };

        let entry = RegisteredDevice::new(device.clone(), Arc::clone(&driver));
        if self.inner.registry.insert(entry).await.is_err() {
            disconnect_quietly(driver.as_ref()).await;
            return Err(duplicate_vendor(vendor));
        }

        self.persist().await;
        self.archive_event(&device, DeviceEventKind::Added).await;
        self.inner.hub.attach(&driver);
        self.inner.snapshot.invalidate();
        info!(device_id, name = %device.name, "Device added");

        self.spawn_sync(device_id);
        Ok(device)
    }

    /// Disconnect and forget a device
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown id
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn remove_device(&self, device_id: &str) -> AppResult<Device> {
        let entry = {
            let _membership = self.inner.membership.lock().await;
            self.inner.registry.remove(device_id).await
        }
        .ok_or_else(|| unknown_device(device_id))?;

        self.inner.hub.detach(device_id);
        disconnect_quietly(entry.driver.as_ref()).await;
        self.inner.snapshot.invalidate();
        self.persist().await;
        self.archive_event(&entry.device, DeviceEventKind::Removed).await;
        info!(device_id, vendor = %entry.device.vendor, "Device removed");
        Ok(entry.device)
    }

    /// Sync one device
    ///
    /// Returns `Ok(None)` without doing anything if a sync for the device is
    /// already outstanding. A failed driver sync is an `Ok(Some(result))` with
    /// `success == false`.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown id
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn sync_device(&self, device_id: &str) -> AppResult<Option<SyncResult>> {
        let (device, driver) = self
            .inner
            .registry
            .driver(device_id)
            .await
            .ok_or_else(|| unknown_device(device_id))?;

        let Some(_guard) = self.inner.syncing.acquire(device_id) else {
            debug!(device_id, "Sync already in progress");
            return Ok(None);
        };

        let end = Utc::now();
        let start = device
            .last_successful_sync
            .filter(|last| *last < end)
            .unwrap_or_else(|| end - chrono::Duration::days(self.inner.settings.default_lookback_days));
        self.inner
            .registry
            .update(device_id, |entry| entry.device.last_sync_attempt = Some(end))
            .await;

        debug!(device_id, vendor = %device.vendor, %start, %end, "Sync started");
        let mut result = driver.sync_data(start, end).await;

        if result.success {
            self.accept(&device, &mut result).await;
        } else {
            self.record_failure(device_id, &result).await;
        }
        Ok(Some(result))
    }

    /// Sync every device concurrently, then rebuild the snapshot once
    ///
    /// Failures of individual devices are reported in their results and never
    /// stop the others.
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn sync_all_devices(&self) -> Vec<SyncResult> {
        let ids = self.inner.registry.ids().await;
        let outcomes = join_all(ids.iter().map(|id| self.sync_device(id))).await;

        let results: Vec<SyncResult> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                Ok(result) => result,
                Err(error) => {
                    debug!(%error, "Device left the registry before its sync started");
                    None
                }
            })
            .collect();

        let failed = results.iter().filter(|r| !r.success).count();
        info!(devices = results.len(), failed, "Sync of all devices finished");
        self.rebuild_snapshot().await;
        results
    }

    /// Unified snapshot, cached unless `force_refresh`
    pub async fn unified_metrics(&self, force_refresh: bool) -> UnifiedMetrics {
        if !force_refresh {
            if let Some(cached) = self.inner.snapshot.fresh().await {
                return cached;
            }
        }
        self.rebuild_snapshot().await
    }

    /// Combined 0-100 recovery score of the current snapshot
    pub async fn combined_recovery_score(&self) -> Option<f64> {
        self.unified_metrics(false).await.recovery.map(|r| r.value)
    }

    /// Most recent live heart-rate sample across devices
    ///
    /// Devices with a running poll loop answer from the hub. Other connected
    /// devices with live heart rate are asked directly, so a reading is available
    /// without an open subscription.
    pub async fn realtime_heart_rate(&self) -> Option<RealtimeSample> {
        let hub = &self.inner.hub;
        let queried: Vec<Arc<dyn DeviceDriver>> = self
            .inner
            .registry
            .snapshot()
            .await
            .into_iter()
            .filter(|(device, _)| {
                device.status.connected
                    && device.capabilities.supports_live_heart_rate()
                    && !hub.is_polling(&device.id)
            })
            .map(|(_, driver)| driver)
            .collect();

        let live = join_all(queried.iter().map(|driver| async move {
            match driver.latest_sample().await {
                Ok(sample) => sample.filter(|s| s.metric == RealtimeMetric::HeartRate),
                Err(error) => {
                    debug!(device_id = driver.device_id(), %error, "Live heart rate unavailable");
                    None
                }
            }
        }))
        .await;

        live.into_iter()
            .flatten()
            .chain(hub.latest(RealtimeMetric::HeartRate))
            .max_by_key(|sample| sample.recorded_at)
    }

    /// Subscribe to live samples from every connected device
    pub async fn subscribe_realtime(&self) -> RealtimeSubscription {
        let drivers = self.inner.registry.connected_drivers(None).await;
        self.inner.hub.subscribe(&drivers)
    }

    /// Close a subscription; returns whether it existed
    pub fn unsubscribe_realtime(&self, subscription_id: Uuid) -> bool {
        self.inner.hub.unsubscribe(subscription_id)
    }

    /// Write a workout to every connected device
    ///
    /// Devices without the export capability report `exported == false`.
    pub async fn export_workout(&self, workout: &Workout) -> Vec<WorkoutExportOutcome> {
        let targets: Vec<(Device, Arc<dyn DeviceDriver>)> = self
            .inner
            .registry
            .snapshot()
            .await
            .into_iter()
            .filter(|(device, _)| device.status.connected)
            .collect();

        join_all(targets.iter().map(|(device, driver)| async move {
            if !device.capabilities.supports_export() {
                return WorkoutExportOutcome {
                    device_id: device.id.clone(),
                    exported: false,
                    error: None,
                };
            }
            match driver.export_workout(workout).await {
                Ok(exported) => WorkoutExportOutcome {
                    device_id: device.id.clone(),
                    exported,
                    error: None,
                },
                Err(error) => {
                    warn!(device_id = %device.id, %error, "Workout export failed");
                    WorkoutExportOutcome {
                        device_id: device.id.clone(),
                        exported: false,
                        error: Some(error.to_string()),
                    }
                }
            }
        }))
        .await
    }

    /// Start a live workout session on a device
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown id, or the driver's error when the
    /// device is disconnected, unsupported or already in a session
    pub async fn start_workout_session(&self, device_id: &str, activity: WorkoutActivity) -> AppResult<()> {
        let driver = self.connected_driver(device_id).await?;
        driver
            .start_workout_session(activity)
            .await
            .map_err(|e| AppError::from(e).with_device(device_id))
    }

    /// End the live workout session on a device
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown id, or the driver's error
    pub async fn end_workout_session(&self, device_id: &str) -> AppResult<Option<Workout>> {
        let driver = self.connected_driver(device_id).await?;
        let workout = driver
            .end_workout_session()
            .await
            .map_err(|e| AppError::from(e).with_device(device_id))?;
        if workout.is_some() {
            self.inner.snapshot.invalidate();
        }
        Ok(workout)
    }

    /// Decide a withheld conflict
    ///
    /// Accepting copies the withheld value into the device's bundle; rejecting
    /// discards it.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` when the device or the pending conflict does not exist
    pub async fn resolve_conflict(
        &self,
        device_id: &str,
        field: MetricField,
        accept_incoming: bool,
    ) -> AppResult<DataConflict> {
        let outcome = self
            .inner
            .registry
            .update(device_id, |entry| {
                let index = entry.pending.iter().position(|p| p.field() == field)?;
                let mut pending = entry.pending.remove(index);
                if accept_incoming {
                    if let Some(latest) = entry.latest.as_mut() {
                        latest.copy_field_from(&pending.withheld, field);
                    }
                    pending.conflict.resolution = ConflictResolution::AcceptedIncoming;
                } else {
                    pending.conflict.resolution = ConflictResolution::KeptExisting;
                }
                entry.device.status.pending_items = entry.pending.len();
                Some(pending.conflict)
            })
            .await;

        match outcome {
            None => Err(unknown_device(device_id)),
            Some(None) => Err(AppError::not_found(format!("Pending {} conflict", field.as_str()))
                .with_device(device_id)),
            Some(Some(conflict)) => {
                self.inner.snapshot.invalidate();
                info!(device_id, field = field.as_str(), resolution = ?conflict.resolution, "Conflict resolved");
                Ok(conflict)
            }
        }
    }

    /// Turn a vendor push into a live sample and a fresh sync
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` when no connected device of the vendor exists, or
    /// the driver's error when the event cannot be resolved
    #[instrument(skip(self, event), fields(vendor = %event.vendor, event_type = %event.event_type))]
    pub async fn handle_push_event(&self, event: &PushEvent) -> AppResult<Option<RealtimeSample>> {
        let drivers = self.inner.registry.connected_drivers(Some(event.vendor)).await;
        let Some(driver) = drivers.first() else {
            return Err(AppError::not_found(format!("Connected {} device", event.vendor.display_name()))
                .with_vendor(event.vendor.as_str()));
        };

        let sample = driver
            .resolve_push_event(event)
            .await
            .map_err(|e| AppError::from(e).with_device(driver.device_id()))?;
        self.inner.snapshot.invalidate();

        if let Some(sample) = &sample {
            let delivered = self.inner.hub.publish(sample.clone());
            debug!(device_id = driver.device_id(), delivered, "Push event delivered");
        }
        self.spawn_sync(driver.device_id().to_owned());
        Ok(sample)
    }

    /// Every device in registration order
    pub async fn devices(&self) -> Vec<Device> {
        self.inner
            .registry
            .devices()
            .await
            .into_iter()
            .map(|device| self.with_live_status(device))
            .collect()
    }

    /// One device
    pub async fn device(&self, device_id: &str) -> Option<Device> {
        self.inner
            .registry
            .device(device_id)
            .await
            .map(|device| self.with_live_status(device))
    }

    /// Reload persisted devices and reconnect them with their stored tokens
    ///
    /// Devices that fail to reconnect are registered in the error state so the
    /// user still sees them.
    ///
    /// # Errors
    ///
    /// Returns the store's error when the registry cannot be read
    #[instrument(skip(self), fields(user_id = %self.inner.user_id))]
    pub async fn restore_devices(&self) -> AppResult<Vec<Device>> {
        let records = self.inner.device_store.load_devices().await?;
        let mut restored = Vec::with_capacity(records.len());

        for DeviceRecord { mut device, credentials } in records {
            if self.inner.registry.has_vendor(device.vendor).await {
                debug!(device_id = %device.id, "Vendor already registered, skipping stored device");
                continue;
            }
            let driver = match self.inner.factory.create(device.vendor, &device.id) {
                Ok(driver) => driver,
                Err(error) => {
                    warn!(device_id = %device.id, %error, "Cannot recreate driver for stored device");
                    continue;
                }
            };

            let options = credentials.map(ConnectOptions::with_credentials).unwrap_or_default();
            match driver.connect(&options).await {
                Ok(connected) => {
                    device.connection_state = if connected {
                        ConnectionState::Connected
                    } else {
                        ConnectionState::Disconnected
                    };
                    device.status.connected = connected;
                    device.status.last_error = None;
                }
                Err(error) => {
                    warn!(device_id = %device.id, %error, "Stored device failed to reconnect");
                    device.connection_state = ConnectionState::Error;
                    device.status.connected = false;
                    device.status.last_error = Some(error.to_string());
                }
            }
            device.status.syncing = false;

            let connected = device.status.connected;
            if self
                .inner
                .registry
                .insert(RegisteredDevice::new(device.clone(), Arc::clone(&driver)))
                .await
                .is_err()
            {
                continue;
            }
            if connected {
                self.inner.hub.attach(&driver);
            }
            restored.push(device);
        }

        info!(devices = restored.len(), "Device registry restored");
        Ok(restored)
    }

    /// Start the background auto-sync loop
    #[must_use]
    pub fn start_auto_sync(&self) -> AutoSyncHandle {
        scheduler::spawn(self.clone(), self.inner.settings.auto_sync_tick)
    }

    /// Tell the scheduler whether the current connection is metered
    pub fn set_on_metered_network(&self, metered: bool) {
        self.inner.metered.store(metered, Ordering::Relaxed);
    }

    /// Whether the current connection is metered
    #[must_use]
    pub fn on_metered_network(&self) -> bool {
        self.inner.metered.load(Ordering::Relaxed)
    }

    /// Stop every real-time loop
    pub fn shutdown(&self) {
        self.inner.hub.shutdown();
    }

    async fn accept(&self, device: &Device, result: &mut SyncResult) {
        let Some(mut bundle) = result.metrics.take() else {
            return;
        };

        let dropped = enforce_capabilities(&mut bundle, device.capabilities);
        if !dropped.is_empty() {
            warn!(device_id = %device.id, fields = ?dropped, "Dropped fields outside the device's capabilities");
        }
        let skipped = restrict_to_categories(device, &mut bundle);
        if !skipped.is_empty() {
            debug!(device_id = %device.id, fields = ?skipped, "Skipped fields outside the configured categories");
        }
        let quality = data_quality(device, &bundle);

        let others = self.inner.registry.bundles_except(&device.id).await;
        let conflicts = detect_conflicts(&bundle, &others, CONFLICT_TOLERANCE);
        let Resolved {
            bundle,
            conflicts,
            pending,
        } = apply_preference(bundle, conflicts, device.sync_config.conflict_preference);

        let withheld = pending.len();
        if withheld > 0 {
            result.errors.push(SyncError::new(
                SyncErrorKind::ConflictUnresolved,
                format!("{withheld} field(s) withheld for a manual decision"),
            ));
        }
        result.conflicts = conflicts;
        result.metrics = Some(bundle.clone());

        let window_end = result.window_end;
        let archived = bundle.clone();
        let membership = self.inner.membership.lock().await;
        let registered = self
            .inner
            .registry
            .update(&device.id, move |entry| {
                entry.latest = Some(bundle);
                entry.pending = pending;
                entry.device.last_successful_sync = Some(window_end);
                entry.device.connection_state = ConnectionState::Connected;
                entry.device.status.connected = true;
                entry.device.status.last_error = None;
                entry.device.status.pending_items = withheld;
                entry.device.status.data_quality = quality;
            })
            .await
            .is_some();

        if !registered {
            drop(membership);
            info!(device_id = %device.id, "Device removed during sync, result discarded");
            return;
        }

        self.inner.snapshot.invalidate();
        self.archive_metrics(device, archived).await;
        drop(membership);
        self.persist().await;
        info!(
            device_id = %device.id,
            vendor = %device.vendor,
            items = result.items_synced,
            conflicts = result.conflicts.len(),
            quality = ?quality,
            "Sync completed"
        );
    }

    async fn record_failure(&self, device_id: &str, result: &SyncResult) {
        let message = result.errors.first().map(|e| e.message.clone());
        let terminal = result.has_error(SyncErrorKind::PermissionDenied) || result.has_error(SyncErrorKind::AuthExpired);
        let disconnected = terminal
            || result.has_error(SyncErrorKind::NotConnected)
            || result.has_error(SyncErrorKind::NotImplemented);

        self.inner
            .registry
            .update(device_id, |entry| {
                entry.device.status.last_error = message;
                if terminal {
                    entry.device.connection_state = ConnectionState::Error;
                }
                if disconnected {
                    entry.device.status.connected = false;
                }
            })
            .await;
        warn!(device_id, vendor = %result.vendor, errors = ?result.errors, "Sync failed");
    }

    async fn rebuild_snapshot(&self) -> UnifiedMetrics {
        let generation = self.inner.snapshot.generation();
        let now = Utc::now();
        let cutoff = now - self.inner.aggregation.max_bundle_age;
        let bundles: Vec<_> = self
            .inner
            .registry
            .bundles()
            .await
            .into_iter()
            .filter(|bundle| bundle.window_end >= cutoff)
            .collect();

        let mut metrics = combine(&bundles, &self.inner.aggregation, now);
        self.inner.recovery.apply(&mut metrics, &bundles);
        metrics.pending_conflicts = self.inner.registry.pending_conflicts().await;

        self.inner.snapshot.store(metrics.clone(), generation).await;
        debug!(
            devices = metrics.contributing_devices.len(),
            recommendations = metrics.recommendations.len(),
            "Unified snapshot rebuilt"
        );
        metrics
    }

    async fn connected_driver(&self, device_id: &str) -> AppResult<Arc<dyn DeviceDriver>> {
        let (device, driver) = self
            .inner
            .registry
            .driver(device_id)
            .await
            .ok_or_else(|| unknown_device(device_id))?;
        if !device.status.connected {
            return Err(AppError::from(DriverError::NotConnected { vendor: device.vendor }).with_device(device_id));
        }
        Ok(driver)
    }

    fn with_live_status(&self, mut device: Device) -> Device {
        device.status.syncing = self.inner.syncing.contains(&device.id);
        device
    }

    fn spawn_sync(&self, device_id: String) {
        let manager = self.clone();
        tokio::spawn(async move {
            match manager.sync_device(&device_id).await {
                Ok(Some(result)) if !result.success => {
                    debug!(device_id, "Background sync failed");
                }
                Ok(_) => {}
                Err(error) => debug!(device_id, %error, "Background sync skipped"),
            }
        });
    }

    async fn persist(&self) {
        let _guard = self.inner.persist_lock.lock().await;
        let records = to_records(self.inner.registry.snapshot().await).await;
        if let Err(error) = self.inner.device_store.save_devices(&records).await {
            error!(%error, "Failed to persist device registry");
        }
    }

    async fn archive_event(&self, device: &Device, kind: DeviceEventKind) {
        let event = DeviceEvent {
            user_id: self.inner.user_id.clone(),
            device_id: device.id.clone(),
            vendor: device.vendor,
            kind,
            at: Utc::now(),
        };
        if let Err(error) = self.inner.archive.record_device_event(event).await {
            warn!(device_id = %device.id, %error, "Failed to archive device event");
        }
    }

    async fn archive_metrics(&self, device: &Device, bundle: PartialMetricBundle) {
        let record = MetricsRecord {
            user_id: self.inner.user_id.clone(),
            device_id: device.id.clone(),
            recorded_at: Utc::now(),
            bundle,
        };
        if let Err(error) = self.inner.archive.append_metrics(record).await {
            warn!(device_id = %device.id, %error, "Failed to archive metrics");
        }
    }
}

async fn disconnect_quietly(driver: &dyn DeviceDriver) {
    if let Err(error) = driver.disconnect().await {
        warn!(device_id = driver.device_id(), %error, "Disconnect failed");
    }
}

fn unknown_device(device_id: &str) -> AppError {
    AppError::not_found(format!("Device {device_id}")).with_device(device_id)
}

fn duplicate_vendor(vendor: VendorType) -> AppError {
    AppError::already_exists(format!("{} device", vendor.display_name())).with_vendor(vendor.as_str())
}

fn permission_denied(vendor: VendorType, missing: &[String]) -> AppError {
    let message = if missing.is_empty() {
        format!("{} access was not granted", vendor.display_name())
    } else {
        format!("{} access was not granted: {}", vendor.display_name(), missing.join(", "))
    };
    AppError::permission_denied(message).with_vendor(vendor.as_str())
}
