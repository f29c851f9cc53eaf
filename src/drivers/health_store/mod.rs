// ABOUTME: Driver for the vendor-managed on-device health store
// ABOUTME: Windowed sampling, client-side heart rate zones, night grouping, sessions and export
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Health Store Driver
//!
//! The platform store answers queries locally, so syncs may return thousands of
//! samples per window. This driver reduces them to one [`PartialMetricBundle`]:
//! heart rate zones from the observed max, HRV trend, summed activity, the latest
//! night of sleep and the window's workouts.
//!
//! A type the user declined is skipped (its field stays absent); only an
//! unavailable store fails the sync.

/// In-memory store implementation
pub mod memory;
/// Platform boundary types and trait
pub mod platform;
/// Night grouping of sleep samples
pub mod sleep;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use memory::InMemoryHealthStore;
pub use platform::{
    AuthorizationStatus, HealthDataType, HealthStore, HealthStoreError, QuantitySample,
    SleepSample, SleepValue, UnavailableHealthStore, READ_SCOPE, WRITE_SCOPE,
};

use super::core::{ConnectOptions, DeviceDriver, DeviceInfo, PermissionModel, PermissionRecord};
use super::errors::{DriverError, DriverResult};
use crate::config::RealtimeConfig;
use crate::constants::training_load::ACUTE_WINDOW_DAYS;
use crate::intelligence::hrv::summarize_readings;
use crate::models::{
    HeartRateMetrics, HeartRateZones, HrvMetrics, PartialMetricBundle, RealtimeMetric,
    RealtimeSample, SampleOrigin, SyncResult, VendorType, Workout, WorkoutActivity,
    WorkoutSummary,
};
use crate::utils::physiology::{heart_rate_zone_bounds, mean, valid_heart_rate, zone_index};

const VENDOR: VendorType = VendorType::HealthStore;

#[derive(Debug, Clone)]
struct WorkoutSession {
    id: Uuid,
    activity: WorkoutActivity,
    started_at: DateTime<Utc>,
}

/// Driver for the on-device health store
pub struct HealthStoreDriver {
    device_id: String,
    store: Arc<dyn HealthStore>,
    realtime: RealtimeConfig,
    connected: AtomicBool,
    session_active: AtomicBool,
    session: Mutex<Option<WorkoutSession>>,
}

impl HealthStoreDriver {
    /// Create a driver over a platform store
    #[must_use]
    pub fn new(device_id: impl Into<String>, store: Arc<dyn HealthStore>, realtime: RealtimeConfig) -> Self {
        Self {
            device_id: device_id.into(),
            store,
            realtime,
            connected: AtomicBool::new(false),
            session_active: AtomicBool::new(false),
            session: Mutex::new(None),
        }
    }

    fn failed(&self, start: DateTime<Utc>, end: DateTime<Utc>, error: &DriverError) -> SyncResult {
        SyncResult::failed(self.device_id.clone(), VENDOR, start, end, error.to_sync_error())
    }

    /// Keep the data on success, skip declined or failing types, abort on an unavailable store
    fn tolerate<T>(data_type: HealthDataType, result: Result<Vec<T>, HealthStoreError>) -> DriverResult<Vec<T>> {
        match result {
            Ok(samples) => Ok(samples),
            Err(HealthStoreError::NotAuthorized(_)) => {
                debug!(data_type = data_type.identifier(), "Type not authorized, skipping");
                Ok(Vec::new())
            }
            Err(HealthStoreError::Query(message)) => {
                warn!(data_type = data_type.identifier(), %message, "Health store query failed, skipping");
                Ok(Vec::new())
            }
            Err(HealthStoreError::Unavailable) => Err(DriverError::Unavailable {
                vendor: VENDOR,
                reason: HealthStoreError::Unavailable.to_string(),
            }),
        }
    }

    async fn quantities(
        &self,
        data_type: HealthDataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DriverResult<Vec<QuantitySample>> {
        Self::tolerate(data_type, self.store.quantity_samples(data_type, start, end, None).await)
    }

    /// Map the store's samples into one bundle ending at `end`
    ///
    /// Heart rate, activity totals and sleep always cover the trailing day, so an
    /// incremental sync minutes after the last one still reports the full day.
    /// HRV reaches back far enough for its trend baseline; workouts cover the
    /// requested window or the trailing day, whichever is longer.
    async fn build_bundle(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DriverResult<(PartialMetricBundle, usize)> {
        let daily_start = end - chrono::Duration::days(1);
        let baseline_start = start.min(end - chrono::Duration::days(ACUTE_WINDOW_DAYS));
        let workout_start = start.min(daily_start);

        let mut bundle = PartialMetricBundle::new(VENDOR, self.device_id.clone(), workout_start, end);
        let mut items = 0;

        let heart_rate = self.quantities(HealthDataType::HeartRate, daily_start, end).await?;
        let resting = self.quantities(HealthDataType::RestingHeartRate, daily_start, end).await?;
        items += heart_rate.len() + resting.len();
        bundle.heart_rate = summarize_heart_rate(&heart_rate, &resting);

        let hrv = self.quantities(HealthDataType::HeartRateVariability, baseline_start, end).await?;
        items += hrv.len();
        bundle.hrv = summarize_hrv(&hrv);

        let steps = self.quantities(HealthDataType::Steps, daily_start, end).await?;
        let distance = self.quantities(HealthDataType::DistanceWalkingRunning, daily_start, end).await?;
        let active = self.quantities(HealthDataType::ActiveEnergyBurned, daily_start, end).await?;
        let basal = self.quantities(HealthDataType::BasalEnergyBurned, daily_start, end).await?;
        let exercise = self.quantities(HealthDataType::ExerciseTime, daily_start, end).await?;
        items += steps.len() + distance.len() + active.len() + basal.len() + exercise.len();

        bundle.steps = sum(&steps).map(|total| total.round().max(0.0) as u64);
        bundle.distance_meters = sum(&distance);
        bundle.calories_kcal = match (sum(&active), sum(&basal)) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
        bundle.active_minutes = sum(&exercise);

        let sleep_samples =
            Self::tolerate(HealthDataType::SleepAnalysis, self.store.sleep_samples(daily_start, end).await)?;
        items += sleep_samples.len();
        let nights = sleep::group_into_nights(&sleep_samples);
        bundle.sleep = nights.last().map(|night| night.to_metrics(nights.len()));

        let workouts =
            Self::tolerate(HealthDataType::Workouts, self.store.workouts(workout_start, end).await)?;
        items += workouts.len();
        bundle.workouts = workouts.iter().map(WorkoutSummary::from).collect();

        Ok((bundle, items))
    }
}

fn sum(samples: &[QuantitySample]) -> Option<f64> {
    (!samples.is_empty()).then(|| samples.iter().map(|s| s.value).sum())
}

fn summarize_heart_rate(samples: &[QuantitySample], resting: &[QuantitySample]) -> Option<HeartRateMetrics> {
    let values: Vec<f64> = samples.iter().filter_map(|s| valid_heart_rate(s.value)).collect();
    let resting_bpm = resting
        .iter()
        .max_by_key(|s| s.end)
        .and_then(|s| valid_heart_rate(s.value));

    let Some(average) = mean(&values) else {
        return resting_bpm.map(|bpm| HeartRateMetrics {
            average_bpm: bpm,
            min_bpm: None,
            max_bpm: None,
            resting_bpm: Some(bpm),
            latest_bpm: None,
            zones: None,
            sample_count: 0,
        });
    };

    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let bounds = heart_rate_zone_bounds(max);
    let mut samples_in_zone = [0_usize; 5];
    for bpm in &values {
        if let Some(zone) = zone_index(*bpm, &bounds) {
            samples_in_zone[zone] += 1;
        }
    }

    Some(HeartRateMetrics {
        average_bpm: average,
        min_bpm: Some(min),
        max_bpm: Some(max),
        resting_bpm,
        latest_bpm: samples
            .iter()
            .max_by_key(|s| s.end)
            .and_then(|s| valid_heart_rate(s.value)),
        zones: Some(HeartRateZones {
            max_heart_rate: max,
            lower_bounds_bpm: bounds,
            samples_in_zone,
        }),
        sample_count: values.len(),
    })
}

fn summarize_hrv(samples: &[QuantitySample]) -> Option<HrvMetrics> {
    let readings: Vec<(DateTime<Utc>, f64)> = samples.iter().map(|s| (s.end, s.value)).collect();
    summarize_readings(&readings)
}

#[async_trait]
impl DeviceDriver for HealthStoreDriver {
    fn vendor(&self) -> VendorType {
        VENDOR
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn connect(&self, _options: &ConnectOptions) -> DriverResult<bool> {
        if !self.store.is_available() {
            return Err(DriverError::Unavailable {
                vendor: VENDOR,
                reason: HealthStoreError::Unavailable.to_string(),
            });
        }
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!(device_id = %self.device_id, "Health store connected");
        }
        Ok(true)
    }

    async fn disconnect(&self) -> DriverResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.session_active.store(false, Ordering::SeqCst);
        self.session.lock().await.take();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    #[instrument(skip(self), fields(device_id = %self.device_id))]
    async fn request_permissions(&self) -> DriverResult<PermissionRecord> {
        let completed = self
            .store
            .request_authorization(&READ_SCOPE, &WRITE_SCOPE)
            .await
            .map_err(|e| match e {
                HealthStoreError::Unavailable => DriverError::Unavailable {
                    vendor: VENDOR,
                    reason: e.to_string(),
                },
                other => DriverError::PermissionDenied {
                    vendor: VENDOR,
                    reason: other.to_string(),
                },
            })?;

        if !completed {
            let scopes = READ_SCOPE.iter().map(|t| t.identifier().to_owned()).collect::<Vec<_>>();
            return Ok(PermissionRecord::denied(
                PermissionModel::PlatformPrompt,
                Vec::new(),
                scopes,
            ));
        }
        self.check_permissions().await
    }

    async fn check_permissions(&self) -> DriverResult<PermissionRecord> {
        let mut granted = Vec::new();
        let mut missing = Vec::new();
        for data_type in READ_SCOPE {
            match self.store.authorization_status(data_type).await {
                AuthorizationStatus::Authorized => granted.push(data_type.identifier().to_owned()),
                AuthorizationStatus::Denied | AuthorizationStatus::NotDetermined => {
                    missing.push(data_type.identifier().to_owned());
                }
            }
        }

        // Partial grants are usable; the declined types are skipped at sync time
        if granted.is_empty() {
            Ok(PermissionRecord::denied(PermissionModel::PlatformPrompt, granted, missing))
        } else {
            let mut record = PermissionRecord::granted(PermissionModel::PlatformPrompt, granted);
            record.missing = missing;
            Ok(record)
        }
    }

    #[instrument(skip(self), fields(device_id = %self.device_id, vendor = %VENDOR))]
    async fn sync_data(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SyncResult {
        if !self.connected.load(Ordering::SeqCst) {
            return self.failed(start, end, &DriverError::NotConnected { vendor: VENDOR });
        }
        match self.build_bundle(start, end).await {
            Ok((bundle, items)) => {
                debug!(items, fields = bundle.populated_fields().len(), "Health store window mapped");
                SyncResult::succeeded(bundle, items)
            }
            Err(error) => {
                warn!(error = %error, "Health store sync failed");
                self.failed(start, end, &error)
            }
        }
    }

    async fn export_workout(&self, workout: &Workout) -> DriverResult<bool> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DriverError::NotConnected { vendor: VENDOR });
        }
        match self.store.save_workout(workout).await {
            Ok(()) => Ok(true),
            Err(HealthStoreError::NotAuthorized(_)) => Err(DriverError::PermissionDenied {
                vendor: VENDOR,
                reason: "workout write access not granted".to_owned(),
            }),
            Err(HealthStoreError::Unavailable) => Err(DriverError::Unavailable {
                vendor: VENDOR,
                reason: HealthStoreError::Unavailable.to_string(),
            }),
            Err(HealthStoreError::Query(message)) => Err(DriverError::ApiError {
                vendor: VENDOR,
                status_code: 0,
                message,
                retryable: false,
            }),
        }
    }

    async fn device_info(&self) -> DriverResult<DeviceInfo> {
        Ok(DeviceInfo {
            name: VENDOR.display_name().to_owned(),
            manufacturer: "Apple".to_owned(),
            model: Some("HealthKit".to_owned()),
            firmware_version: None,
            battery_level: None,
            account_id: None,
        })
    }

    async fn start_workout_session(&self, activity: WorkoutActivity) -> DriverResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DriverError::NotConnected { vendor: VENDOR });
        }
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(DriverError::ConfigurationError {
                vendor: VENDOR,
                details: "a workout session is already running".to_owned(),
            });
        }
        let started = WorkoutSession {
            id: Uuid::new_v4(),
            activity,
            started_at: Utc::now(),
        };
        info!(device_id = %self.device_id, session_id = %started.id, "Workout session started");
        *session = Some(started);
        self.session_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn end_workout_session(&self) -> DriverResult<Option<Workout>> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(None);
        };
        self.session_active.store(false, Ordering::SeqCst);

        let end = Utc::now();
        let heart_rate = self.quantities(HealthDataType::HeartRate, session.started_at, end).await?;
        let energy = self.quantities(HealthDataType::ActiveEnergyBurned, session.started_at, end).await?;
        let distance = self
            .quantities(HealthDataType::DistanceWalkingRunning, session.started_at, end)
            .await?;
        let bpm: Vec<f64> = heart_rate.iter().filter_map(|s| valid_heart_rate(s.value)).collect();

        let mut metadata = BTreeMap::new();
        metadata.insert("session_id".to_owned(), session.id.to_string());
        metadata.insert("recorded_by".to_owned(), crate::constants::service::SERVICE_NAME.to_owned());

        let workout = Workout {
            id: session.id.to_string(),
            activity: session.activity,
            start: session.started_at,
            end,
            energy_kcal: sum(&energy),
            distance_meters: sum(&distance),
            average_heart_rate: mean(&bpm),
            metadata,
        };
        self.export_workout(&workout).await?;
        info!(device_id = %self.device_id, session_id = %session.id, "Workout session saved");
        Ok(Some(workout))
    }

    fn realtime_interval(&self) -> Option<Duration> {
        Some(if self.session_active.load(Ordering::SeqCst) {
            self.realtime.workout_poll_interval
        } else {
            self.realtime.poll_interval
        })
    }

    async fn latest_sample(&self) -> DriverResult<Option<RealtimeSample>> {
        let latest = self
            .store
            .latest_quantity(HealthDataType::HeartRate)
            .await
            .or_else(|e| match e {
                HealthStoreError::Unavailable => Err(DriverError::Unavailable {
                    vendor: VENDOR,
                    reason: e.to_string(),
                }),
                _ => Ok(None),
            })?;

        Ok(latest.and_then(|sample| {
            valid_heart_rate(sample.value).map(|bpm| RealtimeSample {
                device_id: self.device_id.clone(),
                vendor: VENDOR,
                metric: RealtimeMetric::HeartRate,
                value: bpm,
                recorded_at: sample.end,
                origin: SampleOrigin::Polling,
            })
        }))
    }
}
