// ABOUTME: WHOOP webhook endpoint that validates signatures and hands events to the manager
// ABOUTME: 401 on a bad signature, 400 on a bad body, 202 for ignored events, 200 once delivered
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Vendor Webhooks
//!
//! WHOOP signs every request with `base64(HMAC-SHA256(timestamp || body))`. The
//! body is read raw so the signature is checked against the exact bytes sent,
//! and a timestamp outside the accepted skew is refused so captured requests
//! cannot be replayed.
//! Events this layer does not map, and events for accounts with no connected
//! device, are acknowledged with `202` so the vendor does not retry them.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::constants::webhooks::{WHOOP_ROUTE, WHOOP_SIGNATURE_HEADER, WHOOP_TIMESTAMP_HEADER};
use crate::context::WearablesContext;
use crate::drivers::whoop::webhook::{WebhookSignatureValidator, WhoopWebhookPayload};
use crate::errors::{AppError, ErrorCode};
use crate::manager::WearableManager;

/// Shared state of the webhook routes
#[derive(Clone)]
pub struct WebhookState {
    manager: WearableManager,
    validator: Option<Arc<WebhookSignatureValidator>>,
}

impl WebhookState {
    /// State with an explicit signing secret; `None` rejects every request
    #[must_use]
    pub fn new(manager: WearableManager, secret: Option<&str>) -> Self {
        Self {
            manager,
            validator: secret.map(|s| Arc::new(WebhookSignatureValidator::new(s))),
        }
    }

    /// State signed with the configured webhook secret, falling back to the client secret
    #[must_use]
    pub fn from_context(context: &WearablesContext) -> Self {
        let whoop = &context.config().whoop;
        let secret = whoop.webhook_secret.as_deref().or(whoop.client_secret.as_deref());
        if secret.is_none() {
            warn!("No WHOOP signing secret configured; webhooks will be rejected");
        }
        Self::new(context.manager().clone(), secret)
    }
}

/// Webhook routes implementation
pub struct WebhookRoutes;

impl WebhookRoutes {
    /// Create all webhook routes
    pub fn routes(state: WebhookState) -> Router {
        Router::new()
            .route(WHOOP_ROUTE, post(Self::handle_whoop))
            .with_state(state)
    }

    async fn handle_whoop(State(state): State<WebhookState>, headers: HeaderMap, body: Bytes) -> Response {
        if let Err(error) = Self::verify_signature(&state, &headers, &body) {
            warn!("Rejected WHOOP webhook with invalid signature");
            return error.into_response();
        }

        let payload: WhoopWebhookPayload = match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => {
                return AppError::new(ErrorCode::InvalidFormat, format!("Invalid webhook body: {e}"))
                    .into_response();
            }
        };

        let Some(event) = payload.to_push_event() else {
            debug!(event_type = %payload.event_type, "Ignoring WHOOP event type");
            return Self::acknowledged("ignored", &payload.event_type);
        };

        match state.manager.handle_push_event(&event).await {
            Ok(sample) => {
                info!(event_type = %event.event_type, resource_id = %event.resource_id, "WHOOP webhook processed");
                (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "status": "accepted",
                        "event_type": event.event_type,
                        "sample": sample,
                    })),
                )
                    .into_response()
            }
            Err(error) if error.code == ErrorCode::ResourceNotFound => {
                debug!(event_type = %event.event_type, "No connected WHOOP device for webhook");
                Self::acknowledged("no_device", &event.event_type)
            }
            Err(error) => {
                warn!(event_type = %event.event_type, %error, "WHOOP webhook failed");
                error.into_response()
            }
        }
    }

    fn verify_signature(state: &WebhookState, headers: &HeaderMap, body: &[u8]) -> Result<(), AppError> {
        let invalid = |message: &str| AppError::new(ErrorCode::SignatureInvalid, message);
        let validator = state
            .validator
            .as_ref()
            .ok_or_else(|| invalid("Webhook signing secret is not configured"))?;
        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        let signature = header(WHOOP_SIGNATURE_HEADER).ok_or_else(|| invalid("Missing signature header"))?;
        let timestamp = header(WHOOP_TIMESTAMP_HEADER).ok_or_else(|| invalid("Missing signature timestamp"))?;
        if !WebhookSignatureValidator::is_fresh(timestamp, Utc::now()) {
            return Err(invalid("Signature timestamp outside the accepted window"));
        }

        if validator.verify(timestamp, body, signature) {
            Ok(())
        } else {
            Err(invalid("Signature mismatch"))
        }
    }

    fn acknowledged(status: &str, event_type: &str) -> Response {
        (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": status, "event_type": event_type })),
        )
            .into_response()
    }
}
