//! Last-known device status.
//!
//! The slot is swapped wholesale on every successful poll, so readers see
//! either the previous snapshot or the new one, never a mix.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Serialize;

use crate::clock::Clock;
use crate::device::DeviceStatus;
use crate::observability::metrics;

/// A status payload and when it was captured.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDeviceSnapshot {
    pub status: DeviceStatus,
    pub captured_at_ms: u64,
}

impl CachedDeviceSnapshot {
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.captured_at_ms)
    }

    /// Stale means strictly older than the threshold.
    pub fn is_stale(&self, now_ms: u64, stale_after_ms: u64) -> bool {
        self.age_ms(now_ms) > stale_after_ms
    }
}

/// What status consumers receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServedSnapshot {
    pub status: DeviceStatus,
    /// Always true: the payload comes from the poller's cache, not a live call.
    pub cached: bool,
    pub cache_age_seconds: u64,
    pub stale: bool,
    pub captured_at_ms: u64,
}

pub struct SnapshotCache {
    slot: ArcSwapOption<CachedDeviceSnapshot>,
    clock: Arc<dyn Clock>,
    stale_after_ms: u64,
}

impl SnapshotCache {
    pub fn new(clock: Arc<dyn Clock>, stale_after_secs: u64) -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            clock,
            stale_after_ms: stale_after_secs.saturating_mul(1_000),
        }
    }

    /// Replace the snapshot with `status`, captured now.
    pub fn store(&self, status: DeviceStatus) -> Arc<CachedDeviceSnapshot> {
        let snapshot = Arc::new(CachedDeviceSnapshot {
            status,
            captured_at_ms: self.clock.now_ms(),
        });
        self.slot.store(Some(snapshot.clone()));
        snapshot
    }

    pub fn latest(&self) -> Option<Arc<CachedDeviceSnapshot>> {
        self.slot.load_full()
    }

    /// The latest snapshot annotated with its age, or `None` before the
    /// first successful poll.
    pub fn serve(&self) -> Option<ServedSnapshot> {
        let snapshot = self.latest()?;
        let now = self.clock.now_ms();
        let age_secs = snapshot.age_ms(now) / 1_000;
        metrics::record_snapshot_age(age_secs);

        Some(ServedSnapshot {
            status: snapshot.status.clone(),
            cached: true,
            cache_age_seconds: age_secs,
            stale: snapshot.is_stale(now, self.stale_after_ms),
            captured_at_ms: snapshot.captured_at_ms,
        })
    }
}
