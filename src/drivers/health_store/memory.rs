// ABOUTME: In-memory health store used by tests, the demo command and hosts without a platform store
// ABOUTME: Supports per-type denial, unavailability toggles and seeded synthetic history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;

use super::platform::{
    AuthorizationStatus, HealthDataType, HealthStore, HealthStoreError, QuantitySample,
    SleepSample, SleepValue,
};
use crate::models::{Workout, WorkoutActivity};

#[derive(Debug, Default)]
struct StoreData {
    quantities: Vec<QuantitySample>,
    sleep: Vec<SleepSample>,
    workouts: Vec<Workout>,
    denied: HashSet<HealthDataType>,
    authorized: bool,
}

/// Health store backed by vectors in memory
#[derive(Debug)]
pub struct InMemoryHealthStore {
    data: RwLock<StoreData>,
    available: AtomicBool,
    dismiss_prompt: AtomicBool,
    authorization_requests: AtomicUsize,
}

impl Default for InMemoryHealthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHealthStore {
    /// Empty, available store
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            available: AtomicBool::new(true),
            dismiss_prompt: AtomicBool::new(false),
            authorization_requests: AtomicUsize::new(0),
        }
    }

    /// Add quantity samples
    #[must_use]
    pub fn with_quantities(mut self, samples: impl IntoIterator<Item = QuantitySample>) -> Self {
        self.data.get_mut().quantities.extend(samples);
        self
    }

    /// Add sleep samples
    #[must_use]
    pub fn with_sleep(mut self, samples: impl IntoIterator<Item = SleepSample>) -> Self {
        self.data.get_mut().sleep.extend(samples);
        self
    }

    /// Add workouts
    #[must_use]
    pub fn with_workouts(mut self, workouts: impl IntoIterator<Item = Workout>) -> Self {
        self.data.get_mut().workouts.extend(workouts);
        self
    }

    /// Deny one data type after the prompt
    #[must_use]
    pub fn deny(mut self, data_type: HealthDataType) -> Self {
        self.data.get_mut().denied.insert(data_type);
        self
    }

    /// Seed `days` of plausible history ending at `now`
    #[must_use]
    pub fn with_synthetic_history(mut self, now: DateTime<Utc>, days: i64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let today = now
            .duration_trunc(Duration::days(1))
            .unwrap_or(now);
        let data = self.data.get_mut();

        for offset in (0..days).rev() {
            let day = today - Duration::days(offset);
            generate_day(&mut rng, data, day, now);
        }
        self
    }

    /// Append one quantity sample
    pub async fn push_quantity(&self, sample: QuantitySample) {
        self.data.write().await.quantities.push(sample);
    }

    /// Toggle platform availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make the next permission prompts fail as dismissed
    pub fn set_dismiss_prompt(&self, dismiss: bool) {
        self.dismiss_prompt.store(dismiss, Ordering::SeqCst);
    }

    /// Permission prompts presented so far
    #[must_use]
    pub fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    /// Workouts stored, including saved ones
    pub async fn stored_workouts(&self) -> Vec<Workout> {
        self.data.read().await.workouts.clone()
    }

    fn ensure_available(&self) -> Result<(), HealthStoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(HealthStoreError::Unavailable)
        }
    }

    fn ensure_readable(data: &StoreData, data_type: HealthDataType) -> Result<(), HealthStoreError> {
        if !data.authorized || data.denied.contains(&data_type) {
            Err(HealthStoreError::NotAuthorized(data_type))
        } else {
            Ok(())
        }
    }
}

fn generate_day(rng: &mut StdRng, data: &mut StoreData, day: DateTime<Utc>, now: DateTime<Utc>) {
    let source = Some("Synthetic Watch".to_owned());
    let quantity = |data_type, value, start: DateTime<Utc>, minutes: i64| QuantitySample {
        data_type,
        value,
        start,
        end: start + Duration::minutes(minutes),
        source_name: source.clone(),
    };

    // Night ending this morning: 23:00 the previous evening to ~07:00
    let bedtime = day - Duration::hours(1) + Duration::minutes(rng.gen_range(-30..30));
    let mut cursor = bedtime;
    for cycle in 0..5 {
        for (value, minutes) in [
            (SleepValue::Core, rng.gen_range(20..40)),
            (SleepValue::Deep, if cycle < 3 { rng.gen_range(15..30) } else { 5 }),
            (SleepValue::Core, rng.gen_range(10..20)),
            (SleepValue::Rem, rng.gen_range(10..25) + cycle * 3),
            (SleepValue::Awake, rng.gen_range(0..6)),
        ] {
            let end = cursor + Duration::minutes(minutes);
            if end > now {
                break;
            }
            data.sleep.push(SleepSample {
                value,
                start: cursor,
                end,
            });
            cursor = end;
        }
    }

    let wake = day + Duration::hours(7);
    if wake <= now {
        data.quantities.push(quantity(
            HealthDataType::RestingHeartRate,
            f64::from(rng.gen_range(52_u32..60)),
            wake,
            1,
        ));
        data.quantities.push(quantity(
            HealthDataType::HeartRateVariability,
            f64::from(rng.gen_range(45_u32..75)),
            wake,
            1,
        ));
    }

    for hour in 7..22 {
        let start = day + Duration::hours(hour);
        if start > now {
            break;
        }
        let steps = f64::from(rng.gen_range(200_u32..1_200));
        data.quantities.push(quantity(HealthDataType::Steps, steps, start, 60));
        data.quantities
            .push(quantity(HealthDataType::DistanceWalkingRunning, steps * 0.75, start, 60));
        data.quantities.push(quantity(
            HealthDataType::ActiveEnergyBurned,
            f64::from(rng.gen_range(15_u32..45)),
            start,
            60,
        ));
        data.quantities
            .push(quantity(HealthDataType::BasalEnergyBurned, 70.0, start, 60));
        for half in [0, 30] {
            let at = start + Duration::minutes(half);
            data.quantities.push(quantity(
                HealthDataType::HeartRate,
                f64::from(rng.gen_range(62_u32..95)),
                at,
                1,
            ));
        }
    }

    let workout_start = day + Duration::hours(18);
    let workout_end = workout_start + Duration::minutes(45);
    if rng.gen_bool(0.5) && workout_end <= now {
        for minute in (0..45).step_by(5) {
            data.quantities.push(quantity(
                HealthDataType::HeartRate,
                f64::from(rng.gen_range(130_u32..175)),
                workout_start + Duration::minutes(minute),
                1,
            ));
        }
        data.quantities
            .push(quantity(HealthDataType::ExerciseTime, 45.0, workout_start, 45));
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_owned(), "synthetic".to_owned());
        data.workouts.push(Workout {
            id: format!("synthetic-{}", workout_start.timestamp()),
            activity: WorkoutActivity::Running,
            start: workout_start,
            end: workout_end,
            energy_kcal: Some(f64::from(rng.gen_range(350_u32..550))),
            distance_meters: Some(f64::from(rng.gen_range(6_000_u32..9_000))),
            average_heart_rate: Some(f64::from(rng.gen_range(140_u32..160))),
            metadata,
        });
    }
}

fn overlaps(start: DateTime<Utc>, end: DateTime<Utc>, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    start < to && end > from
}

#[async_trait]
impl HealthStore for InMemoryHealthStore {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn request_authorization(
        &self,
        _read: &[HealthDataType],
        _write: &[HealthDataType],
    ) -> Result<bool, HealthStoreError> {
        self.ensure_available()?;
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        if self.dismiss_prompt.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.data.write().await.authorized = true;
        Ok(true)
    }

    async fn authorization_status(&self, data_type: HealthDataType) -> AuthorizationStatus {
        let data = self.data.read().await;
        if !data.authorized {
            AuthorizationStatus::NotDetermined
        } else if data.denied.contains(&data_type) {
            AuthorizationStatus::Denied
        } else {
            AuthorizationStatus::Authorized
        }
    }

    async fn quantity_samples(
        &self,
        data_type: HealthDataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<QuantitySample>, HealthStoreError> {
        self.ensure_available()?;
        let data = self.data.read().await;
        Self::ensure_readable(&data, data_type)?;

        let mut samples: Vec<QuantitySample> = data
            .quantities
            .iter()
            .filter(|s| s.data_type == data_type && overlaps(s.start, s.end, start, end))
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.start);
        if let Some(limit) = limit {
            samples.truncate(limit);
        }
        Ok(samples)
    }

    async fn sleep_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SleepSample>, HealthStoreError> {
        self.ensure_available()?;
        let data = self.data.read().await;
        Self::ensure_readable(&data, HealthDataType::SleepAnalysis)?;

        let mut samples: Vec<SleepSample> = data
            .sleep
            .iter()
            .filter(|s| overlaps(s.start, s.end, start, end))
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.start);
        Ok(samples)
    }

    async fn workouts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Workout>, HealthStoreError> {
        self.ensure_available()?;
        let data = self.data.read().await;
        Self::ensure_readable(&data, HealthDataType::Workouts)?;

        Ok(data
            .workouts
            .iter()
            .filter(|w| w.start >= start && w.start < end)
            .cloned()
            .collect())
    }

    async fn save_workout(&self, workout: &Workout) -> Result<(), HealthStoreError> {
        self.ensure_available()?;
        let mut data = self.data.write().await;
        Self::ensure_readable(&data, HealthDataType::Workouts)?;
        data.workouts.push(workout.clone());
        Ok(())
    }

    async fn latest_quantity(
        &self,
        data_type: HealthDataType,
    ) -> Result<Option<QuantitySample>, HealthStoreError> {
        self.ensure_available()?;
        let data = self.data.read().await;
        Self::ensure_readable(&data, data_type)?;
        Ok(data
            .quantities
            .iter()
            .filter(|s| s.data_type == data_type)
            .max_by_key(|s| s.end)
            .cloned())
    }
}
