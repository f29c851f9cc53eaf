// ABOUTME: Independent threshold rules that turn a unified snapshot into ranked recommendations
// ABOUTME: Each rule appends at most one recommendation; output is stable-sorted by priority
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::recovery::{
    HIGH_RECOVERY, LOW_RECOVERY, MIN_SLEEP_EFFICIENCY_PERCENT, MIN_SLEEP_HOURS,
};
use crate::constants::training_load::{MAINTAINING_RATIO, OVERREACHING_RATIO};
use crate::models::{
    HrvTrend, RecommendationCategory, RecommendationPriority, TrainingRecommendation,
    UnifiedMetrics,
};

/// Rule thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationEngine {
    low_recovery: f64,
    high_recovery: f64,
    min_sleep_hours: f64,
    min_sleep_efficiency: f64,
    load_ratio_floor: f64,
    load_ratio_ceiling: f64,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationEngine {
    /// Engine with the standard thresholds
    #[must_use]
    pub const fn new() -> Self {
        Self {
            low_recovery: LOW_RECOVERY,
            high_recovery: HIGH_RECOVERY,
            min_sleep_hours: MIN_SLEEP_HOURS,
            min_sleep_efficiency: MIN_SLEEP_EFFICIENCY_PERCENT,
            load_ratio_floor: MAINTAINING_RATIO,
            load_ratio_ceiling: OVERREACHING_RATIO,
        }
    }

    /// Recommendations for a snapshot, highest priority first
    #[must_use]
    pub fn generate(&self, snapshot: &UnifiedMetrics) -> Vec<TrainingRecommendation> {
        let mut recommendations: Vec<TrainingRecommendation> = [
            self.recovery_rule(snapshot),
            self.sleep_duration_rule(snapshot),
            self.sleep_efficiency_rule(snapshot),
            Self::hrv_rule(snapshot),
            self.load_rule(snapshot),
        ]
        .into_iter()
        .flatten()
        .collect();

        recommendations.sort_by_key(|r| r.priority);
        recommendations
    }

    fn recovery_rule(&self, snapshot: &UnifiedMetrics) -> Option<TrainingRecommendation> {
        let score = snapshot.recovery.as_ref()?.value;
        if score < self.low_recovery {
            Some(recommend(
                RecommendationCategory::Recovery,
                RecommendationPriority::High,
                "Prioritize recovery",
                format!("Recovery is {score:.0}%, below {:.0}%. Take a rest day or keep activity very light.", self.low_recovery),
            ))
        } else if score > self.high_recovery {
            Some(recommend(
                RecommendationCategory::Intensity,
                RecommendationPriority::High,
                "High-intensity day",
                format!("Recovery is {score:.0}%, above {:.0}%. Your body is ready for a hard session.", self.high_recovery),
            ))
        } else {
            None
        }
    }

    fn sleep_duration_rule(&self, snapshot: &UnifiedMetrics) -> Option<TrainingRecommendation> {
        let hours = snapshot.sleep.as_ref()?.value.total_sleep_hours();
        (hours < self.min_sleep_hours).then(|| {
            recommend(
                RecommendationCategory::Sleep,
                RecommendationPriority::High,
                "Get more sleep",
                format!("You slept {hours:.1} h, under the {:.0} h minimum. Aim for 7-9 hours tonight.", self.min_sleep_hours),
            )
        })
    }

    fn sleep_efficiency_rule(&self, snapshot: &UnifiedMetrics) -> Option<TrainingRecommendation> {
        let efficiency = snapshot.sleep.as_ref()?.value.efficiency_percent;
        (efficiency < self.min_sleep_efficiency).then(|| {
            recommend(
                RecommendationCategory::Sleep,
                RecommendationPriority::Medium,
                "Improve sleep quality",
                format!("Sleep efficiency was {efficiency:.0}%, below {:.0}%. Keep a consistent bedtime and limit screens before bed.", self.min_sleep_efficiency),
            )
        })
    }

    fn hrv_rule(snapshot: &UnifiedMetrics) -> Option<TrainingRecommendation> {
        let hrv = &snapshot.hrv.as_ref()?.value;
        (hrv.trend == Some(HrvTrend::Declining)).then(|| {
            recommend(
                RecommendationCategory::Hrv,
                RecommendationPriority::Medium,
                "HRV is declining",
                format!("Latest HRV of {:.0} ms is trending below your recent baseline. Watch for accumulating fatigue.", hrv.latest_ms),
            )
        })
    }

    fn load_rule(&self, snapshot: &UnifiedMetrics) -> Option<TrainingRecommendation> {
        let ratio = snapshot.training_load.as_ref()?.value.ratio;
        if ratio > self.load_ratio_ceiling {
            Some(recommend(
                RecommendationCategory::TrainingLoad,
                RecommendationPriority::High,
                "Reduce training load",
                format!("Acute:chronic ratio is {ratio:.2}, above {:.1}. Injury risk rises sharply in this range.", self.load_ratio_ceiling),
            ))
        } else if ratio < self.load_ratio_floor {
            Some(recommend(
                RecommendationCategory::TrainingLoad,
                RecommendationPriority::Low,
                "Build training load",
                format!("Acute:chronic ratio is {ratio:.2}, below {:.1}. Fitness may start to decline.", self.load_ratio_floor),
            ))
        } else {
            None
        }
    }
}

fn recommend(
    category: RecommendationCategory,
    priority: RecommendationPriority,
    title: &str,
    justification: String,
) -> TrainingRecommendation {
    TrainingRecommendation {
        category,
        priority,
        title: title.to_owned(),
        justification,
    }
}
