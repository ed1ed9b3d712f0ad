//! Per-key mutual exclusion for cache writes.
//!
//! Foreground misses and the background scan may both decide to extract the
//! same video at the same moment. Each caller first acquires the key's gate;
//! the first one in extracts, everyone queued behind it re-checks freshness
//! once admitted and finds the work already done.
//!
//! ```text
//! open(movie.srt) ─┐
//!                  ├──► ExtractionGate[movie.mkv, eng] ──► one extraction
//! scan pass ───────┘
//! open(other.srt) ────► ExtractionGate[other.mkv, eng] ──► runs in parallel
//! ```
//!
//! Locks are created on demand and removed when the last holder releases,
//! so the map only ever contains keys with work in flight.

use super::types::CacheKey;
use crate::log::Logger;
use crate::{log_debug, log_info};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of per-key async locks.
pub struct ExtractionGate {
    logger: Arc<dyn Logger>,
    locks: DashMap<CacheKey, Arc<Mutex<()>>>,
    total_acquisitions: AtomicU64,
    queued_acquisitions: AtomicU64,
}

/// Statistics for monitoring gate contention.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GateStats {
    /// Acquisitions requested
    pub total_acquisitions: u64,
    /// Acquisitions that found the key already held or awaited
    pub queued_acquisitions: u64,
    /// Keys currently held or awaited
    pub in_flight: usize,
}

/// Exclusive hold on one key; released on drop.
pub struct GateGuard<'a> {
    gate: &'a ExtractionGate,
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ExtractionGate {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            locks: DashMap::new(),
            total_acquisitions: AtomicU64::new(0),
            queued_acquisitions: AtomicU64::new(0),
        }
    }

    /// Wait until `key` is free and take it.
    ///
    /// Holders of unrelated keys never block each other.
    pub async fn acquire(&self, key: &CacheKey) -> GateGuard<'_> {
        self.total_acquisitions.fetch_add(1, Ordering::Relaxed);

        // Entry API: check-and-insert must be atomic.
        let lock = match self.locks.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.queued_acquisitions.fetch_add(1, Ordering::Relaxed);
                log_debug!(self.logger, "Waiting for in-flight extraction of {}", key);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let lock = Arc::new(Mutex::new(()));
                entry.insert(lock.clone());
                lock
            }
        };

        let guard = lock.lock_owned().await;
        GateGuard {
            gate: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            total_acquisitions: self.total_acquisitions.load(Ordering::Relaxed),
            queued_acquisitions: self.queued_acquisitions.load(Ordering::Relaxed),
            in_flight: self.locks.len(),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        log_info!(
            self.logger,
            "Extraction gate: {} acquisitions, {} waited, {} in flight",
            stats.total_acquisitions,
            stats.queued_acquisitions,
            stats.in_flight
        );
    }
}

impl GateGuard<'_> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex before checking who else still references it.
        drop(self.guard.take());
        self.gate
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
