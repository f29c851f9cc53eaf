// ABOUTME: Main library entry point for the Pierre wearables aggregation layer
// ABOUTME: Unifies on-device health stores and OAuth wearable clouds into one metrics snapshot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Pierre Wearables
//!
//! Aggregation layer that connects one to five wearable sources (an on-device
//! health store plus OAuth-backed cloud vendors) and reconciles their partial,
//! differently-shaped measurements into a single [`models::UnifiedMetrics`]
//! snapshot, with derived recovery and training-load guidance.
//!
//! ## Architecture
//!
//! - **Drivers**: one [`drivers::DeviceDriver`] implementation per vendor, selected
//!   through a [`drivers::DriverFactory`] keyed on [`models::VendorType`]
//! - **Manager**: [`manager::WearableManager`] owns the device registry, serializes
//!   per-device syncs, and is the single external entry point
//! - **Intelligence**: pure aggregation plus the recovery / training-load engine
//! - **Realtime**: channel-based fan-out of live samples to subscribers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pierre_wearables::config::WearablesConfig;
//! use pierre_wearables::context::WearablesContext;
//! use pierre_wearables::drivers::health_store::InMemoryHealthStore;
//! use pierre_wearables::drivers::ConnectOptions;
//! use pierre_wearables::models::{SyncConfig, VendorType};
//!
//! # async fn run() -> Result<(), pierre_wearables::errors::AppError> {
//! let context = WearablesContext::builder(WearablesConfig::from_env()?)
//!     .health_store(Arc::new(InMemoryHealthStore::new()))
//!     .build()?;
//! let manager = context.manager();
//! manager
//!     .add_device(VendorType::HealthStore, SyncConfig::default(), ConnectOptions::default())
//!     .await?;
//! manager.sync_all_devices().await;
//! let snapshot = manager.unified_metrics(false).await;
//! println!("recovery: {:?}", snapshot.recovery);
//! # Ok(())
//! # }
//! ```

/// Application constants organized by domain
pub mod constants;

/// Environment-driven configuration
pub mod config;

/// Explicit dependency context constructed once at startup
pub mod context;

/// Wearable device drivers (health store, WHOOP, thin vendors)
pub mod drivers;

/// Unified error handling
pub mod errors;

/// Aggregation, recovery scoring, training load, and recommendations
pub mod intelligence;

/// Structured logging setup
pub mod logging;

/// Sync orchestrator and device registry
pub mod manager;

/// Vendor-neutral data model
pub mod models;

/// OAuth 2.0 token management and authorized HTTP access
pub mod oauth2_client;

/// Real-time sample fan-out
pub mod realtime;

/// HTTP routes (vendor webhooks, health checks)
pub mod routes;

/// Device registry persistence and metrics archival boundaries
pub mod storage;

/// Shared physiological helpers
pub mod utils;
