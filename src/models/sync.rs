// ABOUTME: Transient sync outcome types: SyncResult, SyncError and DataConflict
// ABOUTME: A failed sync is scoped to one device and one job and never touches the snapshot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::VendorType;
use super::metrics::{MetricField, PartialMetricBundle};

/// Classification of a sync failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// The user denied access; terminal for the device
    PermissionDenied,
    /// Authorization expired and could not be refreshed
    AuthExpired,
    /// The vendor integration is not wired up
    NotImplemented,
    /// Transport or vendor failure; the next sync may succeed
    NetworkFailure,
    /// Vendor throttled the request
    RateLimited,
    /// Conflicting values withheld for a manual decision
    ConflictUnresolved,
    /// Vendor payload could not be mapped
    InvalidData,
    /// Driver not connected
    NotConnected,
}

/// One error reported by a sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    /// Classification
    pub kind: SyncErrorKind,
    /// Human-readable message
    pub message: String,
}

impl SyncError {
    /// Create a sync error
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One side of a data conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictValue {
    /// Device holding the value
    pub device_id: String,
    /// Vendor of that device
    pub vendor: VendorType,
    /// Comparable value
    pub value: f64,
}

/// Resolution applied to a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The aggregator's priority rules pick the winner
    PriorityRules,
    /// The incoming value was dropped in favour of the existing one
    KeptExisting,
    /// The incoming value was accepted after a manual decision
    AcceptedIncoming,
    /// Awaiting a manual decision
    Unresolved,
}

/// A field where two drivers disagree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConflict {
    /// Field in dispute
    pub field: MetricField,
    /// Value from the syncing device
    pub incoming: ConflictValue,
    /// Value already held from another device
    pub existing: ConflictValue,
    /// Resolution applied
    pub resolution: ConflictResolution,
}

/// Outcome of one driver sync job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Whether the job produced data
    pub success: bool,
    /// Device synced
    pub device_id: String,
    /// Vendor synced
    pub vendor: VendorType,
    /// Raw vendor records consumed
    pub items_synced: usize,
    /// Errors; empty on a clean sync
    pub errors: Vec<SyncError>,
    /// Conflicts detected against other devices
    pub conflicts: Vec<DataConflict>,
    /// Bundle produced, present on success
    pub metrics: Option<PartialMetricBundle>,
    /// Window start
    pub window_start: DateTime<Utc>,
    /// Window end
    pub window_end: DateTime<Utc>,
}

impl SyncResult {
    /// Successful sync
    #[must_use]
    pub fn succeeded(bundle: PartialMetricBundle, items_synced: usize) -> Self {
        Self {
            success: true,
            device_id: bundle.device_id.clone(),
            vendor: bundle.vendor,
            items_synced,
            errors: Vec::new(),
            conflicts: Vec::new(),
            window_start: bundle.window_start,
            window_end: bundle.window_end,
            metrics: Some(bundle),
        }
    }

    /// Failed sync
    #[must_use]
    pub fn failed(
        device_id: impl Into<String>,
        vendor: VendorType,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        error: SyncError,
    ) -> Self {
        Self {
            success: false,
            device_id: device_id.into(),
            vendor,
            items_synced: 0,
            errors: vec![error],
            conflicts: Vec::new(),
            metrics: None,
            window_start,
            window_end,
        }
    }

    /// Whether any error has the given kind
    #[must_use]
    pub fn has_error(&self, kind: SyncErrorKind) -> bool {
        self.errors.iter().any(|error| error.kind == kind)
    }
}
