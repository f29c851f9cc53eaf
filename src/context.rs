// ABOUTME: Explicit dependency context built once at startup instead of process-wide singletons
// ABOUTME: Bundles config, the shared HTTP client, the driver factory, stores and the manager
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Wearables Context
//!
//! Everything the aggregation layer needs is constructed here and passed down
//! explicitly. Tests swap individual collaborators through the builder.

use std::sync::Arc;

use tracing::info;

use crate::config::WearablesConfig;
use crate::drivers::health_store::{HealthStore, UnavailableHealthStore};
use crate::drivers::{DefaultDriverFactory, DriverFactory};
use crate::errors::AppResult;
use crate::intelligence::{AggregationPolicy, RecoveryEngine};
use crate::manager::{ManagerParts, WearableManager};
use crate::realtime::RealtimeHub;
use crate::storage::{DeviceStore, InMemoryMetricsArchive, JsonFileDeviceStore, MetricsArchive};

/// Default owner when the host does not supply one
pub const DEFAULT_USER_ID: &str = "local";

/// Shared dependencies of one aggregation layer instance
#[derive(Clone)]
pub struct WearablesContext {
    config: Arc<WearablesConfig>,
    http: reqwest::Client,
    hub: RealtimeHub,
    device_store: Arc<dyn DeviceStore>,
    archive: Arc<dyn MetricsArchive>,
    manager: WearableManager,
}

impl WearablesContext {
    /// Start building a context from configuration
    #[must_use]
    pub fn builder(config: WearablesConfig) -> WearablesContextBuilder {
        WearablesContextBuilder::new(config)
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &Arc<WearablesConfig> {
        &self.config
    }

    /// Shared HTTP client
    #[must_use]
    pub const fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Real-time hub
    #[must_use]
    pub const fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    /// Device registry store
    #[must_use]
    pub const fn device_store(&self) -> &Arc<dyn DeviceStore> {
        &self.device_store
    }

    /// Metrics archive
    #[must_use]
    pub const fn archive(&self) -> &Arc<dyn MetricsArchive> {
        &self.archive
    }

    /// The sync orchestrator
    #[must_use]
    pub const fn manager(&self) -> &WearableManager {
        &self.manager
    }
}

/// Builder for [`WearablesContext`]
pub struct WearablesContextBuilder {
    config: WearablesConfig,
    user_id: String,
    http: Option<reqwest::Client>,
    health_store: Option<Arc<dyn HealthStore>>,
    factory: Option<Arc<dyn DriverFactory>>,
    device_store: Option<Arc<dyn DeviceStore>>,
    archive: Option<Arc<dyn MetricsArchive>>,
    aggregation: Option<AggregationPolicy>,
    recovery: RecoveryEngine,
}

impl WearablesContextBuilder {
    fn new(config: WearablesConfig) -> Self {
        Self {
            config,
            user_id: DEFAULT_USER_ID.to_owned(),
            http: None,
            health_store: None,
            factory: None,
            device_store: None,
            archive: None,
            aggregation: None,
            recovery: RecoveryEngine::default(),
        }
    }

    /// Owner of the registry and archived records
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Use an existing HTTP client
    #[must_use]
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Platform health store behind the on-device driver
    #[must_use]
    pub fn health_store(mut self, store: Arc<dyn HealthStore>) -> Self {
        self.health_store = Some(store);
        self
    }

    /// Replace the driver factory
    #[must_use]
    pub fn driver_factory(mut self, factory: Arc<dyn DriverFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Replace the registry store
    #[must_use]
    pub fn device_store(mut self, store: Arc<dyn DeviceStore>) -> Self {
        self.device_store = Some(store);
        self
    }

    /// Replace the archive
    #[must_use]
    pub fn archive(mut self, archive: Arc<dyn MetricsArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Replace aggregation priorities and freshness
    #[must_use]
    pub fn aggregation_policy(mut self, policy: AggregationPolicy) -> Self {
        self.aggregation = Some(policy);
        self
    }

    /// Replace recovery weights and recommendation thresholds
    #[must_use]
    pub fn recovery_engine(mut self, engine: RecoveryEngine) -> Self {
        self.recovery = engine;
        self
    }

    /// Build the context
    ///
    /// Defaults: the unavailable health store, the default driver factory, a JSON
    /// registry in the configured storage directory, and an in-memory archive.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the HTTP client cannot be built
    pub fn build(self) -> AppResult<WearablesContext> {
        let config = Arc::new(self.config);
        let http = match self.http {
            Some(http) => http,
            None => config.http.build_client()?,
        };
        let hub = RealtimeHub::new(config.realtime.channel_capacity);

        let factory = self.factory.unwrap_or_else(|| {
            let health_store = self
                .health_store
                .unwrap_or_else(|| Arc::new(UnavailableHealthStore));
            Arc::new(DefaultDriverFactory::new(
                Arc::clone(&config),
                http.clone(),
                health_store,
            ))
        });
        let device_store = self
            .device_store
            .unwrap_or_else(|| Arc::new(JsonFileDeviceStore::in_dir(&config.storage_dir)));
        let archive = self
            .archive
            .unwrap_or_else(|| Arc::new(InMemoryMetricsArchive::new()));
        let aggregation = self.aggregation.unwrap_or_else(|| AggregationPolicy {
            max_bundle_age: chrono::Duration::days(config.sync.max_bundle_age_days),
            ..AggregationPolicy::default()
        });

        let manager = WearableManager::new(ManagerParts {
            user_id: self.user_id,
            settings: config.sync,
            factory,
            device_store: Arc::clone(&device_store),
            archive: Arc::clone(&archive),
            hub: hub.clone(),
            aggregation,
            recovery: self.recovery,
        });

        info!(user_id = manager.user_id(), "Wearables context ready");
        Ok(WearablesContext {
            config,
            http,
            hub,
            device_store,
            archive,
            manager,
        })
    }
}
