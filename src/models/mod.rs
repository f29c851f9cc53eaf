// ABOUTME: Vendor-neutral data model for devices, metrics, syncs and snapshots
// ABOUTME: Re-exports the types drivers, the manager and consumers share
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! Drivers map vendor payloads into [`PartialMetricBundle`]s; the aggregator folds
//! them into a [`UnifiedMetrics`] snapshot. Nothing in this module performs I/O.

/// Static vendor capability sets
pub mod capabilities;
/// Device identity, sync configuration and status
pub mod device;
/// Metric value types and the partial bundle
pub mod metrics;
/// Live samples and vendor push events
pub mod realtime;
/// Sync results and conflicts
pub mod sync;
/// Unified snapshot and derived recovery types
pub mod unified;
/// Workouts
pub mod workout;

pub use capabilities::DeviceCapabilities;
pub use device::{
    ConflictPreference, ConnectionState, DataCategories, DataQuality, Device, DeviceStatus,
    NetworkConstraint, SyncConfig, SyncFrequency, VendorType,
};
pub use metrics::{
    HeartRateMetrics, HeartRateZones, HrvMetrics, HrvTrend, MetricField, PartialMetricBundle,
    SleepMetrics, SleepStages, TrainingLoad, TrainingLoadStatus, VendorRecovery,
};
pub use realtime::{PushEvent, RealtimeMetric, RealtimeSample, SampleOrigin};
pub use sync::{
    ConflictResolution, ConflictValue, DataConflict, SyncError, SyncErrorKind, SyncResult,
};
pub use unified::{
    MetricSource, ReadinessBand, RecommendationCategory, RecommendationPriority,
    RecoveryAssessment, Sourced, TrainingRecommendation, UnifiedMetrics,
};
pub use workout::{Workout, WorkoutActivity, WorkoutExportOutcome, WorkoutSummary};
