// ABOUTME: TTL cache for the unified metrics snapshot with generation-based invalidation
// ABOUTME: Invalidation bumps a counter instead of taking the lock, so readers never wait on writers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::UnifiedMetrics;

#[derive(Debug, Clone)]
struct CachedSnapshot {
    metrics: UnifiedMetrics,
    expires_at: Instant,
    generation: u64,
}

/// Snapshot cache
pub(super) struct SnapshotCache {
    ttl: Duration,
    generation: AtomicU64,
    entry: RwLock<Option<CachedSnapshot>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generation: AtomicU64::new(0),
            entry: RwLock::new(None),
        }
    }

    /// Generation a rebuild starts from
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Mark the cached snapshot stale
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Cached snapshot if younger than the TTL and not invalidated since it was built
    pub async fn fresh(&self) -> Option<UnifiedMetrics> {
        let current = self.generation();
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.generation == current && Instant::now() < cached.expires_at)
            .map(|cached| cached.metrics.clone())
    }

    /// Store a snapshot built from `generation`
    ///
    /// A snapshot built before an invalidation is stored but never served.
    pub async fn store(&self, metrics: UnifiedMetrics, generation: u64) {
        *self.entry.write().await = Some(CachedSnapshot {
            metrics,
            expires_at: Instant::now() + self.ttl,
            generation,
        });
    }
}
