// ABOUTME: Applies a device's conflict preference to a freshly synced bundle
// ABOUTME: Prefer-local drops disputed fields; manual withholds them until resolve_conflict is called
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::models::{
    ConflictPreference, ConflictResolution, DataConflict, MetricField, PartialMetricBundle,
};

/// A field withheld from the snapshot until the user decides
#[derive(Debug, Clone)]
pub(super) struct PendingConflict {
    pub conflict: DataConflict,
    /// Bundle holding only the withheld field
    pub withheld: PartialMetricBundle,
}

impl PendingConflict {
    pub const fn field(&self) -> MetricField {
        self.conflict.field
    }
}

/// Bundle and conflicts after the preference was applied
pub(super) struct Resolved {
    pub bundle: PartialMetricBundle,
    pub conflicts: Vec<DataConflict>,
    pub pending: Vec<PendingConflict>,
}

pub(super) fn apply_preference(
    mut bundle: PartialMetricBundle,
    mut conflicts: Vec<DataConflict>,
    preference: ConflictPreference,
) -> Resolved {
    let mut pending: Vec<PendingConflict> = Vec::new();
    match preference {
        ConflictPreference::PreferDevice => {}
        ConflictPreference::PreferLocal => {
            for conflict in &mut conflicts {
                bundle.clear(conflict.field);
                conflict.resolution = ConflictResolution::KeptExisting;
            }
        }
        ConflictPreference::Manual => {
            for conflict in &mut conflicts {
                conflict.resolution = ConflictResolution::Unresolved;
                if pending.iter().any(|p| p.field() == conflict.field) {
                    continue;
                }
                let mut withheld = PartialMetricBundle::new(
                    bundle.vendor,
                    bundle.device_id.clone(),
                    bundle.window_start,
                    bundle.window_end,
                );
                withheld.copy_field_from(&bundle, conflict.field);
                pending.push(PendingConflict {
                    conflict: conflict.clone(),
                    withheld,
                });
            }
            for item in &pending {
                bundle.clear(item.field());
            }
        }
    }
    Resolved {
        bundle,
        conflicts,
        pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictValue, VendorType};
    use chrono::{Duration, Utc};

    fn readiness_bundle(score: f64) -> PartialMetricBundle {
        let now = Utc::now();
        let mut bundle =
            PartialMetricBundle::new(VendorType::Whoop, "whoop-1", now - Duration::days(1), now);
        bundle.readiness = Some(score);
        bundle
    }

    fn conflict(field: MetricField) -> DataConflict {
        DataConflict {
            field,
            incoming: ConflictValue {
                device_id: "whoop-1".to_owned(),
                vendor: VendorType::Whoop,
                value: 80.0,
            },
            existing: ConflictValue {
                device_id: "garmin-1".to_owned(),
                vendor: VendorType::Garmin,
                value: 50.0,
            },
            resolution: ConflictResolution::PriorityRules,
        }
    }

    #[test]
    fn test_prefer_device_keeps_everything() {
        let resolved = apply_preference(
            readiness_bundle(80.0),
            vec![conflict(MetricField::Readiness)],
            ConflictPreference::PreferDevice,
        );
        assert!(resolved.bundle.has(MetricField::Readiness));
        assert!(resolved.pending.is_empty());
        assert_eq!(resolved.conflicts[0].resolution, ConflictResolution::PriorityRules);
    }

    #[test]
    fn test_prefer_local_drops_disputed_field() {
        let resolved = apply_preference(
            readiness_bundle(80.0),
            vec![conflict(MetricField::Readiness)],
            ConflictPreference::PreferLocal,
        );
        assert!(!resolved.bundle.has(MetricField::Readiness));
        assert_eq!(resolved.conflicts[0].resolution, ConflictResolution::KeptExisting);
    }

    #[test]
    fn test_manual_withholds_once_per_field() {
        let resolved = apply_preference(
            readiness_bundle(80.0),
            vec![conflict(MetricField::Readiness), conflict(MetricField::Readiness)],
            ConflictPreference::Manual,
        );
        assert!(!resolved.bundle.has(MetricField::Readiness));
        assert_eq!(resolved.pending.len(), 1);
        assert!(resolved.pending[0].withheld.has(MetricField::Readiness));
        assert!(resolved
            .conflicts
            .iter()
            .all(|c| c.resolution == ConflictResolution::Unresolved));
    }
}
