// ABOUTME: Health check route handlers for service monitoring
// ABOUTME: Liveness is static; readiness reports how many devices are registered and connected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::constants::service::SERVICE_NAME;
use crate::manager::WearableManager;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(manager: WearableManager) -> Router {
        async fn health_handler() -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "status": "healthy",
                "service": SERVICE_NAME,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        }

        async fn ready_handler(State(manager): State<WearableManager>) -> Json<serde_json::Value> {
            let devices = manager.devices().await;
            let connected = devices.iter().filter(|d| d.status.connected).count();
            Json(serde_json::json!({
                "status": "ready",
                "devices": devices.len(),
                "connected": connected,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        }

        Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .with_state(manager)
    }
}
