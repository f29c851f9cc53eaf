// ABOUTME: Groups raw sleep analysis samples into nights and summarizes each night
// ABOUTME: Samples separated by no more than four hours belong to the same night
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Duration, Utc};

use super::platform::{SleepSample, SleepValue};
use crate::constants::physiology;
use crate::models::{SleepMetrics, SleepStages};
use crate::utils::physiology::sleep_score;

/// Contiguous sleep samples forming one night
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepNight {
    /// First sample start
    pub start: DateTime<Utc>,
    /// Last sample end
    pub end: DateTime<Utc>,
    /// Samples, oldest first
    pub samples: Vec<SleepSample>,
}

fn minutes(sample: &SleepSample) -> f64 {
    (sample.end - sample.start).num_seconds().max(0) as f64 / 60.0
}

impl SleepNight {
    /// Minutes from first sample to last
    #[must_use]
    pub fn time_in_bed_minutes(&self) -> f64 {
        (self.end - self.start).num_seconds().max(0) as f64 / 60.0
    }

    /// Minutes in any asleep category
    #[must_use]
    pub fn asleep_minutes(&self) -> f64 {
        self.samples
            .iter()
            .filter(|s| s.value.is_asleep())
            .map(minutes)
            .sum()
    }

    /// Stage breakdown, `None` if the recorder did not stage the night
    #[must_use]
    pub fn stages(&self) -> Option<SleepStages> {
        let staged = self
            .samples
            .iter()
            .any(|s| matches!(s.value, SleepValue::Core | SleepValue::Deep | SleepValue::Rem));
        if !staged {
            return None;
        }

        let mut stages = SleepStages::default();
        for sample in &self.samples {
            let m = minutes(sample);
            match sample.value {
                SleepValue::Deep => stages.deep_minutes += m,
                SleepValue::Core | SleepValue::Asleep => stages.light_minutes += m,
                SleepValue::Rem => stages.rem_minutes += m,
                SleepValue::Awake => stages.awake_minutes += m,
                SleepValue::InBed => {}
            }
        }
        Some(stages)
    }

    /// Summary with duration and efficiency score
    #[must_use]
    pub fn to_metrics(&self, nights_in_window: usize) -> SleepMetrics {
        let in_bed = self.time_in_bed_minutes();
        let asleep = self.asleep_minutes();
        let efficiency = if in_bed > 0.0 {
            (asleep / in_bed * 100.0).min(100.0)
        } else {
            0.0
        };

        SleepMetrics {
            start: self.start,
            end: self.end,
            total_sleep_minutes: asleep,
            time_in_bed_minutes: in_bed,
            efficiency_percent: efficiency,
            score: Some(sleep_score(asleep / 60.0, efficiency)),
            stages: self.stages(),
            nights_in_window,
        }
    }
}

/// Group samples into nights, merging samples whose gap is at most four hours
#[must_use]
pub fn group_into_nights(samples: &[SleepSample]) -> Vec<SleepNight> {
    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|s| s.start);

    let gap = Duration::hours(physiology::NIGHT_GAP_HOURS);
    let mut nights: Vec<SleepNight> = Vec::new();
    for sample in sorted {
        match nights.last_mut() {
            Some(night) if sample.start - night.end <= gap => {
                night.end = night.end.max(sample.end);
                night.samples.push(sample);
            }
            _ => nights.push(SleepNight {
                start: sample.start,
                end: sample.end,
                samples: vec![sample],
            }),
        }
    }
    nights
}
