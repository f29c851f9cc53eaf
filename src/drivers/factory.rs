// ABOUTME: Maps a vendor to a freshly constructed driver for one device
// ABOUTME: The default factory wires the health store boundary, WHOOP OAuth and the thin vendor stubs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tracing::debug;

use super::core::DeviceDriver;
use super::errors::DriverResult;
use super::health_store::{HealthStore, HealthStoreDriver};
use super::unimplemented::UnimplementedDriver;
use super::whoop::WhoopDriver;
use crate::config::environment::WearablesConfig;
use crate::models::VendorType;
use crate::oauth2_client::{OAuthClient, OAuthClientConfig, TokenExchange, TokenManager};

/// Creates drivers keyed on vendor
pub trait DriverFactory: Send + Sync {
    /// Build the driver for a new device
    ///
    /// # Errors
    ///
    /// Returns a driver error when the vendor cannot be constructed with the
    /// current configuration
    fn create(&self, vendor: VendorType, device_id: &str) -> DriverResult<Arc<dyn DeviceDriver>>;
}

/// Factory used in production
pub struct DefaultDriverFactory {
    config: Arc<WearablesConfig>,
    http: reqwest::Client,
    health_store: Arc<dyn HealthStore>,
}

impl DefaultDriverFactory {
    /// Create a factory sharing one HTTP client and one platform store
    #[must_use]
    pub fn new(config: Arc<WearablesConfig>, http: reqwest::Client, health_store: Arc<dyn HealthStore>) -> Self {
        Self {
            config,
            http,
            health_store,
        }
    }

    fn whoop(&self, device_id: &str) -> WhoopDriver {
        let settings = &self.config.whoop;
        let exchange: Arc<dyn TokenExchange> = Arc::new(OAuthClient::new(
            OAuthClientConfig::whoop(settings),
            self.http.clone(),
        ));
        let tokens = TokenManager::new(
            VendorType::Whoop,
            exchange,
            self.config.sync.token_refresh_threshold_secs,
        );
        WhoopDriver::new(
            device_id,
            settings.api_base_url.clone(),
            settings.scopes.clone(),
            self.http.clone(),
            Arc::new(tokens),
        )
    }
}

impl DriverFactory for DefaultDriverFactory {
    fn create(&self, vendor: VendorType, device_id: &str) -> DriverResult<Arc<dyn DeviceDriver>> {
        debug!(vendor = %vendor, device_id, "Creating driver");
        let driver: Arc<dyn DeviceDriver> = match vendor {
            VendorType::HealthStore => Arc::new(HealthStoreDriver::new(
                device_id,
                Arc::clone(&self.health_store),
                self.config.realtime,
            )),
            VendorType::Whoop => Arc::new(self.whoop(device_id)),
            VendorType::Garmin | VendorType::Fitbit | VendorType::GoogleFit => {
                Arc::new(UnimplementedDriver::new(vendor, device_id))
            }
        };
        Ok(driver)
    }
}
