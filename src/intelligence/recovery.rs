// ABOUTME: Vendor-weighted recovery blending, readiness banding and the derived recovery assessment
// ABOUTME: One reporter uses its score directly; several are averaged by vendor weight
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Recovery Engine
//!
//! Vendors score recovery on different internal models. WHOOP's recovery is
//! trusted most, Garmin's body battery next; a vendor without an explicit weight
//! contributes at [`DEFAULT_VENDOR_WEIGHT`].
//!
//! Readiness prefers a vendor-reported value. Without one it is the mean of the
//! blended recovery and the winning night's sleep score.

use std::collections::BTreeMap;

use crate::constants::recovery::{
    DEFAULT_VENDOR_WEIGHT, FITBIT_WEIGHT, GARMIN_WEIGHT, READINESS_EXCELLENT,
    READINESS_FAIR, READINESS_GOOD, WHOOP_WEIGHT,
};
use crate::models::{
    MetricSource, PartialMetricBundle, ReadinessBand, RecoveryAssessment, Sourced,
    UnifiedMetrics, VendorType,
};
use crate::utils::physiology::{clamp_score, mean};

use super::recommendation_engine::RecommendationEngine;

/// Per-vendor weights for blending recovery scores
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryWeights {
    weights: BTreeMap<VendorType, f64>,
    default_weight: f64,
}

impl Default for RecoveryWeights {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([
                (VendorType::Whoop, WHOOP_WEIGHT),
                (VendorType::Garmin, GARMIN_WEIGHT),
                (VendorType::Fitbit, FITBIT_WEIGHT),
            ]),
            default_weight: DEFAULT_VENDOR_WEIGHT,
        }
    }
}

impl RecoveryWeights {
    /// Override one vendor's weight
    #[must_use]
    pub fn with_weight(mut self, vendor: VendorType, weight: f64) -> Self {
        self.weights.insert(vendor, weight);
        self
    }

    /// Weight of a vendor
    #[must_use]
    pub fn weight(&self, vendor: VendorType) -> f64 {
        self.weights
            .get(&vendor)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

/// Blend `(vendor, score)` readings into one 0-100 score
///
/// Non-finite scores are dropped. A single reading is returned as is.
#[must_use]
pub fn combined_recovery(readings: &[(VendorType, f64)], weights: &RecoveryWeights) -> Option<f64> {
    let valid: Vec<(VendorType, f64)> = readings
        .iter()
        .filter_map(|(vendor, score)| clamp_score(*score).map(|score| (*vendor, score)))
        .collect();

    match valid.as_slice() {
        [] => None,
        [(_, score)] => Some(*score),
        many => {
            let (weighted, total) = many.iter().fold((0.0, 0.0), |(sum, total), (vendor, score)| {
                let weight = weights.weight(*vendor).max(0.0);
                (weight.mul_add(*score, sum), total + weight)
            });
            if total > 0.0 {
                clamp_score(weighted / total)
            } else {
                mean(&many.iter().map(|(_, score)| *score).collect::<Vec<_>>())
            }
        }
    }
}

/// Band for a readiness score
#[must_use]
pub fn readiness_band(score: f64) -> ReadinessBand {
    if score >= READINESS_EXCELLENT {
        ReadinessBand::Excellent
    } else if score >= READINESS_GOOD {
        ReadinessBand::Good
    } else if score >= READINESS_FAIR {
        ReadinessBand::Fair
    } else {
        ReadinessBand::Poor
    }
}

/// Derives recovery, readiness and recommendations for a snapshot
#[derive(Debug, Clone, Default)]
pub struct RecoveryEngine {
    weights: RecoveryWeights,
    recommendations: RecommendationEngine,
}

impl RecoveryEngine {
    /// Engine with custom weights
    #[must_use]
    pub const fn new(weights: RecoveryWeights, recommendations: RecommendationEngine) -> Self {
        Self {
            weights,
            recommendations,
        }
    }

    /// Recovery weights in use
    #[must_use]
    pub const fn weights(&self) -> &RecoveryWeights {
        &self.weights
    }

    /// Blended recovery of the bundles, in registration order
    #[must_use]
    pub fn blend<'a>(&self, bundles: &'a [PartialMetricBundle]) -> Option<(f64, Vec<&'a PartialMetricBundle>)> {
        let reporters: Vec<&'a PartialMetricBundle> = bundles
            .iter()
            .filter(|b| b.recovery.as_ref().is_some_and(|r| r.score.is_finite()))
            .collect();
        let readings: Vec<(VendorType, f64)> = reporters
            .iter()
            .filter_map(|b| b.recovery.as_ref().map(|r| (b.vendor, r.score)))
            .collect();
        combined_recovery(&readings, &self.weights).map(|score| (score, reporters))
    }

    /// Fill the snapshot's recovery, readiness, assessment and recommendations
    pub fn apply(&self, snapshot: &mut UnifiedMetrics, bundles: &[PartialMetricBundle]) {
        let blended = self.blend(bundles);
        let contributors: Vec<VendorType> = blended
            .as_ref()
            .map(|(_, reporters)| reporters.iter().map(|b| b.vendor).collect())
            .unwrap_or_default();

        snapshot.recovery = blended.as_ref().map(|(score, reporters)| Sourced {
            value: *score,
            source: match reporters.as_slice() {
                [single] => MetricSource::Device {
                    device_id: single.device_id.clone(),
                    vendor: single.vendor,
                },
                _ => MetricSource::Combined {
                    vendors: contributors.clone(),
                },
            },
            timestamp: reporters
                .iter()
                .map(|b| b.window_end)
                .max()
                .unwrap_or(snapshot.generated_at),
        });

        if snapshot.readiness.is_none() {
            snapshot.readiness = Self::derived_readiness(snapshot);
        }

        let recovery_score = snapshot.recovery.as_ref().map(|r| r.value);
        let readiness_score = snapshot.readiness.as_ref().map(|r| r.value);
        let band = readiness_score.map(readiness_band);
        snapshot.recovery_assessment = Some(RecoveryAssessment {
            recovery_score,
            readiness_score,
            readiness: band,
            readiness_message: band.map(|b| b.message().to_owned()),
            hrv_trend: snapshot.hrv.as_ref().and_then(|h| h.value.trend),
            contributors,
        });

        snapshot.recommendations = self.recommendations.generate(snapshot);
    }

    fn derived_readiness(snapshot: &UnifiedMetrics) -> Option<Sourced<f64>> {
        let recovery = snapshot.recovery.as_ref();
        let sleep = snapshot
            .sleep
            .as_ref()
            .and_then(|s| s.value.score.map(|score| (score, s)));

        let inputs: Vec<f64> = recovery
            .map(|r| r.value)
            .into_iter()
            .chain(sleep.map(|(score, _)| score))
            .collect();
        let value = mean(&inputs).and_then(clamp_score)?;

        let mut vendors: Vec<VendorType> = Vec::new();
        for source in recovery
            .map(|r| &r.source)
            .into_iter()
            .chain(sleep.map(|(_, s)| &s.source))
        {
            match source {
                MetricSource::Device { vendor, .. } => vendors.push(*vendor),
                MetricSource::Combined { vendors: many } => vendors.extend(many.iter().copied()),
            }
        }
        vendors.dedup();

        Some(Sourced {
            value,
            source: MetricSource::Combined { vendors },
            timestamp: snapshot.generated_at,
        })
    }
}
