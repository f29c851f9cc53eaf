// ABOUTME: Per-device observer sets and polling loops that fan live samples out to subscribers
// ABOUTME: First observer of a device starts its loop, last one stops it; delivery never blocks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Real-Time Fan-Out
//!
//! Each subscriber owns a bounded channel. Publishing uses `try_send`, so a slow
//! subscriber loses samples instead of stalling the loop or other subscribers.
//!
//! A polling loop runs per device while it has observers and the driver reports a
//! [`DeviceDriver::realtime_interval`]. The interval is re-read every tick, so a
//! workout session shortens it without restarting the loop. Webhook-driven vendors
//! push through [`RealtimeHub::publish`] instead.

/// Subscription handle
pub mod subscription;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use subscription::RealtimeSubscription;

use crate::drivers::DeviceDriver;
use crate::models::{RealtimeMetric, RealtimeSample};

type Observers = HashMap<Uuid, mpsc::Sender<RealtimeSample>>;

struct PollLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct HubInner {
    capacity: usize,
    subscribers: DashMap<Uuid, mpsc::Sender<RealtimeSample>>,
    observers: DashMap<String, Observers>,
    loops: DashMap<String, PollLoop>,
    latest: DashMap<(String, RealtimeMetric), RealtimeSample>,
}

/// Real-time hub shared by the manager and webhook routes
#[derive(Clone)]
pub struct RealtimeHub {
    inner: Arc<HubInner>,
}

impl RealtimeHub {
    /// Hub whose subscriber channels hold `capacity` samples
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                capacity: capacity.max(1),
                subscribers: DashMap::new(),
                observers: DashMap::new(),
                loops: DashMap::new(),
                latest: DashMap::new(),
            }),
        }
    }

    /// Subscribe to every given driver
    ///
    /// The subscription is also attached to drivers added later through
    /// [`Self::attach`].
    #[must_use]
    pub fn subscribe(&self, drivers: &[Arc<dyn DeviceDriver>]) -> RealtimeSubscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        self.inner.subscribers.insert(id, sender.clone());
        for driver in drivers {
            self.observe(driver, id, sender.clone());
        }
        info!(subscription_id = %id, devices = drivers.len(), "Real-time subscription opened");
        RealtimeSubscription::new(id, receiver)
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let existed = self.inner.subscribers.remove(&id).is_some();
        let devices: Vec<String> = self
            .inner
            .observers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for device_id in devices {
            if let Some(mut observers) = self.inner.observers.get_mut(&device_id) {
                observers.remove(&id);
            }
            if self
                .inner
                .observers
                .remove_if(&device_id, |_, observers| observers.is_empty())
                .is_some()
            {
                self.stop_loop(&device_id);
            }
        }
        if existed {
            info!(subscription_id = %id, "Real-time subscription closed");
        }
        existed
    }

    /// Attach every open subscription to a newly connected driver
    pub fn attach(&self, driver: &Arc<dyn DeviceDriver>) {
        self.inner.subscribers.retain(|_, sender| !sender.is_closed());
        let subscribers: Vec<(Uuid, mpsc::Sender<RealtimeSample>)> = self
            .inner
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (id, sender) in subscribers {
            self.observe(driver, id, sender);
        }
    }

    /// Drop a device's observers and stop its loop
    pub fn detach(&self, device_id: &str) {
        self.inner.observers.remove(device_id);
        self.inner.latest.retain(|(device, _), _| device != device_id);
        self.stop_loop(device_id);
    }

    /// Deliver a sample to the device's observers without waiting
    ///
    /// Returns how many observers accepted it.
    pub fn publish(&self, sample: RealtimeSample) -> usize {
        self.inner.publish(sample)
    }

    /// Most recent sample of a metric across devices
    #[must_use]
    pub fn latest(&self, metric: RealtimeMetric) -> Option<RealtimeSample> {
        self.inner
            .latest
            .iter()
            .filter(|entry| entry.key().1 == metric)
            .map(|entry| entry.value().clone())
            .max_by_key(|sample| sample.recorded_at)
    }

    /// Whether a polling loop is running for the device
    #[must_use]
    pub fn is_polling(&self, device_id: &str) -> bool {
        self.inner
            .loops
            .get(device_id)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    /// Number of open subscriptions
    ///
    /// A handle dropped without [`Self::unsubscribe`] no longer counts.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .count()
    }

    /// Stop every loop
    pub fn shutdown(&self) {
        let devices: Vec<String> = self.inner.loops.iter().map(|e| e.key().clone()).collect();
        for device_id in devices {
            self.stop_loop(&device_id);
        }
    }

    fn observe(&self, driver: &Arc<dyn DeviceDriver>, id: Uuid, sender: mpsc::Sender<RealtimeSample>) {
        let device_id = driver.device_id().to_owned();
        let first = {
            let mut observers = self.inner.observers.entry(device_id.clone()).or_default();
            observers.insert(id, sender);
            observers.len() == 1
        };
        if first {
            self.start_loop(driver);
        }
    }

    fn start_loop(&self, driver: &Arc<dyn DeviceDriver>) {
        let device_id = driver.device_id().to_owned();
        if driver.realtime_interval().is_none() || self.is_polling(&device_id) {
            return;
        }
        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.inner),
            Arc::clone(driver),
            receiver,
        ));
        debug!(device_id = %device_id, "Real-time polling started");
        self.inner.loops.insert(device_id, PollLoop { shutdown, handle });
    }

    fn stop_loop(&self, device_id: &str) {
        self.inner.stop_loop(device_id);
    }
}

impl HubInner {
    fn publish(&self, sample: RealtimeSample) -> usize {
        self.latest
            .insert((sample.device_id.clone(), sample.metric), sample.clone());

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let Some(mut observers) = self.observers.get_mut(&sample.device_id) else {
                return 0;
            };
            observers.retain(|id, sender| match sender.try_send(sample.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscription_id = %id, device_id = %sample.device_id, "Subscriber lagging, sample dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*id);
                    false
                }
            });
        }

        if !closed.is_empty() {
            self.forget(&closed);
            self.release_if_unobserved(&sample.device_id);
        }
        delivered
    }

    /// Drop the device's observers whose handle is gone
    ///
    /// Returns whether the device still has observers. When none remain its loop
    /// is stopped.
    fn prune(&self, device_id: &str) -> bool {
        let closed: Vec<Uuid> = self
            .observers
            .get(device_id)
            .map(|observers| {
                observers
                    .iter()
                    .filter(|(_, sender)| sender.is_closed())
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default();

        if !closed.is_empty() {
            if let Some(mut observers) = self.observers.get_mut(device_id) {
                for id in &closed {
                    observers.remove(id);
                }
            }
            self.forget(&closed);
        }
        self.release_if_unobserved(device_id);
        self.observers.contains_key(device_id)
    }

    fn forget(&self, ids: &[Uuid]) {
        for id in ids {
            if self.subscribers.remove(id).is_some() {
                info!(subscription_id = %id, "Real-time subscription dropped without unsubscribe");
            }
        }
    }

    fn release_if_unobserved(&self, device_id: &str) {
        if self
            .observers
            .remove_if(device_id, |_, observers| observers.is_empty())
            .is_some()
        {
            self.stop_loop(device_id);
        }
    }

    fn stop_loop(&self, device_id: &str) {
        if let Some((_, poll)) = self.loops.remove(device_id) {
            let _ = poll.shutdown.send(true);
            debug!(device_id, "Real-time polling stopped");
        }
    }
}

async fn poll_loop(hub: Arc<HubInner>, driver: Arc<dyn DeviceDriver>, mut shutdown: watch::Receiver<bool>) {
    let mut last_recorded: Option<DateTime<Utc>> = None;
    loop {
        let Some(interval) = driver.realtime_interval() else {
            break;
        };
        tokio::select! {
            _ = shutdown.changed() => break,
            () = tokio::time::sleep(interval) => {}
        }
        if *shutdown.borrow() || !hub.prune(driver.device_id()) {
            break;
        }

        match driver.latest_sample().await {
            Ok(Some(sample)) if last_recorded.is_none_or(|last| sample.recorded_at > last) => {
                last_recorded = Some(sample.recorded_at);
                hub.publish(sample);
            }
            Ok(_) => {}
            Err(error) => debug!(device_id = driver.device_id(), %error, "Live sample unavailable"),
        }
    }
}
