// ABOUTME: Background auto-sync loop that syncs devices whose frequency tier is due
// ABOUTME: Runs on a fixed tick and stops through a watch channel
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::WearableManager;

/// Handle to the running auto-sync loop
pub struct AutoSyncHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AutoSyncHandle {
    /// Whether the loop is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the loop and wait for the current tick to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
        info!("Auto-sync stopped");
    }
}

pub(super) fn spawn(manager: WearableManager, tick: Duration) -> AutoSyncHandle {
    let (shutdown, mut receiver) = watch::channel(false);
    let handle = tokio::spawn(async move {
        info!(tick_secs = tick.as_secs(), "Auto-sync started");
        loop {
            tokio::select! {
                _ = receiver.changed() => break,
                () = tokio::time::sleep(tick) => {}
            }
            if *receiver.borrow() {
                break;
            }
            run_due(&manager).await;
        }
    });
    AutoSyncHandle { shutdown, handle }
}

async fn run_due(manager: &WearableManager) {
    let now = Utc::now();
    let metered = manager.on_metered_network();
    let due: Vec<String> = manager
        .devices()
        .await
        .into_iter()
        .filter(|device| device.auto_sync_due(now, metered))
        .map(|device| device.id)
        .collect();
    if due.is_empty() {
        return;
    }
    debug!(devices = due.len(), "Auto-sync tick");
    join_all(due.iter().map(|id| manager.sync_device(id))).await;
}
