// ABOUTME: Pure analysis over partial metric bundles: aggregation, recovery, load and recommendations
// ABOUTME: Nothing here performs I/O; the manager feeds bundles in and caches the snapshot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Intelligence
//!
//! [`aggregator::combine`] folds per-device bundles into one
//! [`crate::models::UnifiedMetrics`]; [`recovery::RecoveryEngine`] then blends vendor
//! recovery readings, derives readiness and attaches ranked recommendations.

/// Per-field source selection and conflict detection
pub mod aggregator;
/// HRV trend analysis
pub mod hrv;
/// Rule-based training recommendations
pub mod recommendation_engine;
/// Recovery blending and readiness
pub mod recovery;
/// Acute:chronic training load
pub mod training_load;

pub use aggregator::{combine, detect_conflicts, enforce_capabilities, AggregationPolicy, PriorityTable};
pub use recommendation_engine::RecommendationEngine;
pub use recovery::{combined_recovery, RecoveryEngine, RecoveryWeights};
pub use training_load::{compute_training_load, TrainingLoadCalculator};
