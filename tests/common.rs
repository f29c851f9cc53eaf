// ABOUTME: Shared test utilities for integration tests
// ABOUTME: Provides quiet logging, a scriptable mock driver and factory, and manager setup helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::significant_drop_tightening
)]
//! Shared test utilities for `pierre_wearables`
//!
//! The mock driver is controlled through a shared [`MockState`] so a test can
//! change what the next sync returns after the manager already owns the driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pierre_wearables::config::SyncSettings;
use pierre_wearables::drivers::{
    ConnectOptions, DeviceDriver, DeviceInfo, DriverError, DriverFactory, DriverResult,
    PermissionModel, PermissionRecord,
};
use pierre_wearables::intelligence::{AggregationPolicy, RecoveryEngine};
use pierre_wearables::manager::{ManagerParts, WearableManager};
use pierre_wearables::models::{
    PartialMetricBundle, PushEvent, RealtimeMetric, RealtimeSample, SampleOrigin, SyncError,
    SyncErrorKind, SyncResult, VendorRecovery, VendorType, Workout,
};
use pierre_wearables::oauth2_client::OAuth2Credentials;
use pierre_wearables::realtime::RealtimeHub;
use pierre_wearables::storage::{InMemoryDeviceStore, InMemoryMetricsArchive};
use tokio::sync::Semaphore;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Filler = Arc<dyn Fn(&mut PartialMetricBundle) + Send + Sync>;

/// Behaviour and call log shared between a test and its mock drivers
pub struct MockState {
    vendor: VendorType,
    filler: Mutex<Filler>,
    failure: Mutex<Option<SyncErrorKind>>,
    hold: AtomicBool,
    release: Semaphore,
    sync_calls: AtomicUsize,
    windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    deny_permissions: AtomicBool,
    connect_fails: AtomicBool,
    connected_with: Mutex<Option<OAuth2Credentials>>,
    exports: AtomicUsize,
    realtime_interval: Mutex<Option<Duration>>,
    next_sample: Mutex<Option<RealtimeSample>>,
}

impl MockState {
    /// State whose syncs succeed with an empty bundle
    pub fn new(vendor: VendorType) -> Arc<Self> {
        Arc::new(Self {
            vendor,
            filler: Mutex::new(Arc::new(|_| {})),
            failure: Mutex::new(None),
            hold: AtomicBool::new(false),
            release: Semaphore::new(0),
            sync_calls: AtomicUsize::new(0),
            windows: Mutex::new(Vec::new()),
            deny_permissions: AtomicBool::new(false),
            connect_fails: AtomicBool::new(false),
            connected_with: Mutex::new(None),
            exports: AtomicUsize::new(0),
            realtime_interval: Mutex::new(None),
            next_sample: Mutex::new(None),
        })
    }

    /// State whose syncs report a vendor recovery score
    pub fn with_recovery(vendor: VendorType, score: f64) -> Arc<Self> {
        let state = Self::new(vendor);
        state.fill(move |bundle| {
            bundle.recovery = Some(recovery(score, bundle.window_end));
        });
        state
    }

    pub const fn vendor(&self) -> VendorType {
        self.vendor
    }

    /// Replace what successful syncs put in the bundle
    pub fn fill(&self, filler: impl Fn(&mut PartialMetricBundle) + Send + Sync + 'static) {
        *lock(&self.filler) = Arc::new(filler);
    }

    /// Make subsequent syncs fail with `kind`, or succeed again with `None`
    pub fn fail_with(&self, kind: Option<SyncErrorKind>) {
        *lock(&self.failure) = kind;
    }

    /// Block syncs until [`MockState::release_one`] is called
    pub fn hold_syncs(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    /// Let one held sync finish
    pub fn release_one(&self) {
        self.release.add_permits(1);
    }

    pub fn deny_permissions(&self) {
        self.deny_permissions.store(true, Ordering::SeqCst);
    }

    pub fn fail_connect(&self) {
        self.connect_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_realtime_interval(&self, interval: Option<Duration>) {
        *lock(&self.realtime_interval) = interval;
    }

    /// Sample returned by the next polls and push events
    pub fn set_next_sample(&self, sample: Option<RealtimeSample>) {
        *lock(&self.next_sample) = sample;
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        lock(&self.windows).clone()
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    /// Credentials the last connect received
    pub fn connected_with(&self) -> Option<OAuth2Credentials> {
        lock(&self.connected_with).clone()
    }
}

/// Vendor recovery reading measured at `at`
pub fn recovery(score: f64, at: DateTime<Utc>) -> VendorRecovery {
    VendorRecovery {
        score,
        resting_heart_rate: Some(55.0),
        hrv_ms: Some(60.0),
        skin_temp_celsius: None,
        spo2_percent: None,
        measured_at: at,
    }
}

/// Driver whose behaviour is scripted through a [`MockState`]
pub struct MockDriver {
    device_id: String,
    state: Arc<MockState>,
    connected: AtomicBool,
}

impl MockDriver {
    pub fn new(device_id: impl Into<String>, state: Arc<MockState>) -> Self {
        Self {
            device_id: device_id.into(),
            state,
            connected: AtomicBool::new(false),
        }
    }

    fn permission_model(&self) -> PermissionModel {
        if self.state.vendor.uses_oauth() {
            PermissionModel::OAuthScopes
        } else {
            PermissionModel::PlatformPrompt
        }
    }

    fn permissions(&self) -> PermissionRecord {
        let scopes = vec!["read".to_owned()];
        if self.state.deny_permissions.load(Ordering::SeqCst) {
            PermissionRecord::denied(self.permission_model(), Vec::new(), scopes)
        } else {
            PermissionRecord::granted(self.permission_model(), scopes)
        }
    }
}

#[async_trait]
impl DeviceDriver for MockDriver {
    fn vendor(&self) -> VendorType {
        self.state.vendor
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn connect(&self, options: &ConnectOptions) -> DriverResult<bool> {
        if self.state.connect_fails.load(Ordering::SeqCst) {
            return Err(DriverError::Unavailable {
                vendor: self.state.vendor,
                reason: "mock connect failure".to_owned(),
            });
        }
        lock(&self.state.connected_with).clone_from(&options.credentials);
        self.connected.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn disconnect(&self) -> DriverResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn request_permissions(&self) -> DriverResult<PermissionRecord> {
        Ok(self.permissions())
    }

    async fn check_permissions(&self) -> DriverResult<PermissionRecord> {
        Ok(self.permissions())
    }

    async fn sync_data(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SyncResult {
        self.state.sync_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.windows).push((start, end));

        if self.state.hold.load(Ordering::SeqCst) {
            if let Ok(permit) = self.state.release.acquire().await {
                permit.forget();
            }
        }

        let failure = *lock(&self.state.failure);
        if let Some(kind) = failure {
            return SyncResult::failed(
                self.device_id.clone(),
                self.state.vendor,
                start,
                end,
                SyncError::new(kind, "mock sync failure"),
            );
        }

        let filler = Arc::clone(&lock(&self.state.filler));
        let mut bundle = PartialMetricBundle::new(self.state.vendor, self.device_id.clone(), start, end);
        filler(&mut bundle);
        SyncResult::succeeded(bundle, 1)
    }

    async fn export_workout(&self, _workout: &Workout) -> DriverResult<bool> {
        self.state.exports.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn device_info(&self) -> DriverResult<DeviceInfo> {
        Ok(DeviceInfo::for_vendor(self.state.vendor))
    }

    fn realtime_interval(&self) -> Option<Duration> {
        *lock(&self.state.realtime_interval)
    }

    async fn latest_sample(&self) -> DriverResult<Option<RealtimeSample>> {
        Ok(lock(&self.state.next_sample).clone().map(|mut sample| {
            sample.device_id.clone_from(&self.device_id);
            sample
        }))
    }

    async fn credentials(&self) -> Option<OAuth2Credentials> {
        lock(&self.state.connected_with).clone()
    }

    async fn resolve_push_event(&self, _event: &PushEvent) -> DriverResult<Option<RealtimeSample>> {
        Ok(lock(&self.state.next_sample).clone().map(|mut sample| {
            sample.device_id.clone_from(&self.device_id);
            sample.origin = SampleOrigin::Webhook;
            sample
        }))
    }
}

/// Factory handing out mock drivers for the vendors it knows
pub struct MockFactory {
    states: HashMap<VendorType, Arc<MockState>>,
}

impl MockFactory {
    pub fn new(states: &[Arc<MockState>]) -> Self {
        Self {
            states: states.iter().map(|s| (s.vendor(), Arc::clone(s))).collect(),
        }
    }
}

impl DriverFactory for MockFactory {
    fn create(&self, vendor: VendorType, device_id: &str) -> DriverResult<Arc<dyn DeviceDriver>> {
        let state = self
            .states
            .get(&vendor)
            .ok_or(DriverError::NotImplemented { vendor })?;
        Ok(Arc::new(MockDriver::new(device_id, Arc::clone(state))))
    }
}

/// A manager over mock drivers plus handles to its stores
pub struct TestManager {
    pub manager: WearableManager,
    pub device_store: InMemoryDeviceStore,
    pub archive: InMemoryMetricsArchive,
}

/// Manager whose factory serves the given mock states
pub fn create_test_manager(states: &[Arc<MockState>]) -> TestManager {
    create_test_manager_with_store(states, InMemoryDeviceStore::new())
}

/// Manager over an existing device store
pub fn create_test_manager_with_store(states: &[Arc<MockState>], device_store: InMemoryDeviceStore) -> TestManager {
    init_test_logging();
    let archive = InMemoryMetricsArchive::new();
    let manager = WearableManager::new(ManagerParts {
        user_id: "test-user".to_owned(),
        settings: SyncSettings::default(),
        factory: Arc::new(MockFactory::new(states)),
        device_store: Arc::new(device_store.clone()),
        archive: Arc::new(archive.clone()),
        hub: RealtimeHub::new(16),
        aggregation: AggregationPolicy::default(),
        recovery: RecoveryEngine::default(),
    });
    TestManager {
        manager,
        device_store,
        archive,
    }
}

/// Wait until `state` saw at least `calls` syncs
pub async fn wait_for_sync_calls(state: &MockState, calls: usize) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while state.sync_calls() < calls {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {calls} sync(s)");
}

/// Wait until `state` saw `calls` syncs and no device is mid-sync
pub async fn wait_until_idle(manager: &WearableManager, state: &MockState, calls: usize) {
    wait_for_sync_calls(state, calls).await;
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while manager.devices().await.iter().any(|d| d.status.syncing) {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for syncs to settle");
}

/// Live heart-rate sample
pub fn heart_rate_sample(vendor: VendorType, bpm: f64, at: DateTime<Utc>) -> RealtimeSample {
    RealtimeSample {
        device_id: String::new(),
        vendor,
        metric: RealtimeMetric::HeartRate,
        value: bpm,
        recorded_at: at,
        origin: SampleOrigin::Polling,
    }
}
