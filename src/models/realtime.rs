// ABOUTME: Live samples pushed to real-time subscribers
// ABOUTME: Samples come from driver polling loops or vendor webhooks and bypass aggregation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::VendorType;

/// Kind of live sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeMetric {
    /// Heart rate in bpm
    HeartRate,
    /// HRV in ms
    Hrv,
    /// Recovery score
    Recovery,
    /// Strain score
    Strain,
    /// Sleep performance
    Sleep,
    /// Workout strain
    Workout,
}

impl RealtimeMetric {
    /// Unit of the sample value
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::HeartRate => "bpm",
            Self::Hrv => "ms",
            Self::Recovery | Self::Sleep => "percent",
            Self::Strain | Self::Workout => "strain",
        }
    }
}

/// Where a live sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOrigin {
    /// Driver polling loop
    Polling,
    /// Vendor push
    Webhook,
}

/// One live sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSample {
    /// Device that produced it
    pub device_id: String,
    /// Vendor of that device
    pub vendor: VendorType,
    /// Kind
    pub metric: RealtimeMetric,
    /// Value in the metric's unit
    pub value: f64,
    /// When it was measured
    pub recorded_at: DateTime<Utc>,
    /// How it reached us
    pub origin: SampleOrigin,
}

/// Vendor push notification in vendor-neutral form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Vendor that sent it
    pub vendor: VendorType,
    /// Vendor event name, e.g. `recovery.updated`
    pub event_type: String,
    /// Identifier of the changed resource
    pub resource_id: String,
    /// Vendor account the event belongs to
    pub vendor_user_id: Option<String>,
}
