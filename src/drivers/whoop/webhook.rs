// ABOUTME: WHOOP webhook payloads, event types and HMAC-SHA256 signature validation
// ABOUTME: Signature is base64(HMAC-SHA256(timestamp || body)) keyed with the app's client secret
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::constants::webhooks::MAX_TIMESTAMP_SKEW_SECS;
use crate::models::{PushEvent, VendorType};

/// Events WHOOP pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhoopEventType {
    /// A recovery was scored or rescored
    RecoveryUpdated,
    /// A cycle's strain changed
    StrainUpdated,
    /// A sleep was scored or rescored
    SleepUpdated,
    /// A workout was recorded
    WorkoutCreated,
    /// A workout was rescored
    WorkoutUpdated,
}

impl WhoopEventType {
    /// Parse a WHOOP event name, `None` for events this layer ignores
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "recovery.updated" => Some(Self::RecoveryUpdated),
            "strain.updated" => Some(Self::StrainUpdated),
            "sleep.updated" => Some(Self::SleepUpdated),
            "workout.created" => Some(Self::WorkoutCreated),
            "workout.updated" => Some(Self::WorkoutUpdated),
            _ => None,
        }
    }

    /// Event name on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RecoveryUpdated => "recovery.updated",
            Self::StrainUpdated => "strain.updated",
            Self::SleepUpdated => "sleep.updated",
            Self::WorkoutCreated => "workout.created",
            Self::WorkoutUpdated => "workout.updated",
        }
    }
}

/// Webhook request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoopWebhookPayload {
    /// WHOOP user the event belongs to
    pub user_id: i64,
    /// Changed resource id (integer or UUID)
    pub id: serde_json::Value,
    /// Event name
    #[serde(rename = "type")]
    pub event_type: String,
    /// WHOOP trace id
    pub trace_id: Option<String>,
}

impl WhoopWebhookPayload {
    /// Vendor-neutral push event, `None` for ignored event types
    #[must_use]
    pub fn to_push_event(&self) -> Option<PushEvent> {
        let event_type = WhoopEventType::parse(&self.event_type)?;
        let resource_id = match &self.id {
            serde_json::Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        Some(PushEvent {
            vendor: VendorType::Whoop,
            event_type: event_type.as_str().to_owned(),
            resource_id,
            vendor_user_id: Some(self.user_id.to_string()),
        })
    }
}

/// Validates the `X-WHOOP-Signature` header
pub struct WebhookSignatureValidator {
    key: hmac::Key,
}

impl WebhookSignatureValidator {
    /// Validator keyed with the signing secret
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        }
    }

    /// Signature WHOOP would send for this timestamp and body
    #[must_use]
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        STANDARD.encode(hmac::sign(&self.key, &message).as_ref())
    }

    /// Whether `signature` matches the timestamp and body
    #[must_use]
    pub fn verify(&self, timestamp: &str, body: &[u8], signature: &str) -> bool {
        let Ok(provided) = STANDARD.decode(signature.trim()) else {
            debug!("Webhook signature is not valid base64");
            return false;
        };
        let Ok(expected) = STANDARD.decode(self.sign(timestamp, body)) else {
            return false;
        };
        expected.len() == provided.len() && bool::from(expected.ct_eq(&provided))
    }

    /// Whether a millisecond signature timestamp lies within the accepted skew of `now`
    #[must_use]
    pub fn is_fresh(timestamp: &str, now: DateTime<Utc>) -> bool {
        timestamp
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .is_some_and(|signed_at| (now - signed_at).num_seconds().abs() <= MAX_TIMESTAMP_SKEW_SECS)
    }
}
