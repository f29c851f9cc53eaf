// ABOUTME: Static capability sets declared by each wearable vendor
// ABOUTME: Bitflags filter which metric fields a driver may contribute and which exports are legal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::device::VendorType;

bitflags! {
    /// Capabilities a wearable vendor exposes
    ///
    /// Capability sets are fixed per vendor. The manager strips any bundle field a
    /// driver reports outside its declared set before aggregation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeviceCapabilities: u32 {
        /// Heart rate samples or summaries
        const HEART_RATE = 1 << 0;
        /// Resting heart rate
        const RESTING_HEART_RATE = 1 << 1;
        /// Heart rate variability
        const HRV = 1 << 2;
        /// Step counts
        const STEPS = 1 << 3;
        /// Distance travelled
        const DISTANCE = 1 << 4;
        /// Energy expenditure
        const CALORIES = 1 << 5;
        /// Active minutes
        const ACTIVE_MINUTES = 1 << 6;
        /// Sleep summaries
        const SLEEP = 1 << 7;
        /// Sleep stage breakdown
        const SLEEP_STAGES = 1 << 8;
        /// Vendor recovery score
        const RECOVERY = 1 << 9;
        /// Vendor strain score
        const STRAIN = 1 << 10;
        /// Training load history
        const TRAINING_LOAD = 1 << 11;
        /// Vendor readiness score
        const READINESS = 1 << 12;
        /// Live heart rate sampling
        const LIVE_HEART_RATE = 1 << 13;
        /// Workout sessions recorded by the vendor
        const WORKOUTS = 1 << 14;
        /// Writing workouts back to the vendor
        const WORKOUT_EXPORT = 1 << 15;
        /// Starting and ending live workout sessions
        const WORKOUT_SESSIONS = 1 << 16;
        /// Body measurements (weight, body fat)
        const BODY_MEASUREMENTS = 1 << 17;
        /// Blood oxygen saturation
        const BLOOD_OXYGEN = 1 << 18;
        /// Respiratory rate
        const RESPIRATORY_RATE = 1 << 19;
        /// Skin temperature
        const SKIN_TEMPERATURE = 1 << 20;
        /// Vendor push notifications
        const WEBHOOKS = 1 << 21;
        /// Nutrition logging
        const NUTRITION = 1 << 22;
    }
}

impl DeviceCapabilities {
    /// Static capability set for a vendor
    #[must_use]
    pub const fn for_vendor(vendor: VendorType) -> Self {
        match vendor {
            VendorType::HealthStore => Self::HEART_RATE
                .union(Self::RESTING_HEART_RATE)
                .union(Self::HRV)
                .union(Self::STEPS)
                .union(Self::DISTANCE)
                .union(Self::CALORIES)
                .union(Self::ACTIVE_MINUTES)
                .union(Self::SLEEP)
                .union(Self::SLEEP_STAGES)
                .union(Self::LIVE_HEART_RATE)
                .union(Self::WORKOUTS)
                .union(Self::WORKOUT_EXPORT)
                .union(Self::WORKOUT_SESSIONS)
                .union(Self::BODY_MEASUREMENTS)
                .union(Self::BLOOD_OXYGEN)
                .union(Self::RESPIRATORY_RATE)
                .union(Self::NUTRITION),
            VendorType::Whoop => Self::HEART_RATE
                .union(Self::RESTING_HEART_RATE)
                .union(Self::HRV)
                .union(Self::CALORIES)
                .union(Self::SLEEP)
                .union(Self::SLEEP_STAGES)
                .union(Self::RECOVERY)
                .union(Self::STRAIN)
                .union(Self::TRAINING_LOAD)
                .union(Self::WORKOUTS)
                .union(Self::BLOOD_OXYGEN)
                .union(Self::RESPIRATORY_RATE)
                .union(Self::SKIN_TEMPERATURE)
                .union(Self::WEBHOOKS),
            VendorType::Garmin => Self::HEART_RATE
                .union(Self::RESTING_HEART_RATE)
                .union(Self::HRV)
                .union(Self::STEPS)
                .union(Self::DISTANCE)
                .union(Self::CALORIES)
                .union(Self::ACTIVE_MINUTES)
                .union(Self::SLEEP)
                .union(Self::SLEEP_STAGES)
                .union(Self::RECOVERY)
                .union(Self::TRAINING_LOAD)
                .union(Self::WORKOUTS)
                .union(Self::WORKOUT_EXPORT)
                .union(Self::BLOOD_OXYGEN)
                .union(Self::RESPIRATORY_RATE),
            VendorType::Fitbit => Self::HEART_RATE
                .union(Self::RESTING_HEART_RATE)
                .union(Self::HRV)
                .union(Self::STEPS)
                .union(Self::DISTANCE)
                .union(Self::CALORIES)
                .union(Self::ACTIVE_MINUTES)
                .union(Self::SLEEP)
                .union(Self::SLEEP_STAGES)
                .union(Self::READINESS)
                .union(Self::WORKOUTS)
                .union(Self::BLOOD_OXYGEN)
                .union(Self::SKIN_TEMPERATURE)
                .union(Self::NUTRITION),
            VendorType::GoogleFit => Self::HEART_RATE
                .union(Self::STEPS)
                .union(Self::DISTANCE)
                .union(Self::CALORIES)
                .union(Self::ACTIVE_MINUTES)
                .union(Self::SLEEP)
                .union(Self::WORKOUTS)
                .union(Self::WORKOUT_EXPORT)
                .union(Self::BODY_MEASUREMENTS)
                .union(Self::NUTRITION),
        }
    }

    /// Whether the set allows writing workouts back
    #[must_use]
    pub const fn supports_export(self) -> bool {
        self.contains(Self::WORKOUT_EXPORT)
    }

    /// Whether the set allows live sampling
    #[must_use]
    pub const fn supports_live_heart_rate(self) -> bool {
        self.contains(Self::LIVE_HEART_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thin_vendors_declare_full_interface_capabilities() {
        for vendor in [VendorType::Garmin, VendorType::Fitbit, VendorType::GoogleFit] {
            assert!(DeviceCapabilities::for_vendor(vendor).contains(DeviceCapabilities::HEART_RATE));
        }
    }

    #[test]
    fn test_whoop_cannot_export() {
        assert!(!DeviceCapabilities::for_vendor(VendorType::Whoop).supports_export());
        assert!(DeviceCapabilities::for_vendor(VendorType::HealthStore).supports_export());
    }
}
