// ABOUTME: HTTP routes exposed by the wearables service
// ABOUTME: Vendor webhooks feed the real-time fan-out; health routes serve load balancers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Liveness and readiness
pub mod health;
/// Vendor push endpoints
pub mod webhooks;

use axum::Router;

pub use health::HealthRoutes;
pub use webhooks::{WebhookRoutes, WebhookState};

use crate::context::WearablesContext;

/// Every route of the service
#[must_use]
pub fn router(context: &WearablesContext) -> Router {
    Router::new()
        .merge(HealthRoutes::routes(context.manager().clone()))
        .merge(WebhookRoutes::routes(WebhookState::from_context(context)))
}
