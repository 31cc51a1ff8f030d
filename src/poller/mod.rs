//! Device status polling subsystem.
//!
//! # Data Flow
//! ```text
//! Timer tick (monitor.rs)
//!     → breaker.allow_request()
//!         false → skip cycle (no I/O, snapshot untouched)
//!         true  → fetch status (bounded timeout)
//!                 → ok:  record_success, snapshot.rs overwrite
//!                 → err: record_failure, snapshot kept
//!
//! Status consumers
//!     → snapshot.rs serve() → payload + cached + cache_age_seconds + stale
//! ```
//!
//! # Design Decisions
//! - Stale data beats no data: failures never clear the snapshot
//! - The poller owns no retry timer; OPEN just lengthens its tick
//! - One poller task per device, so at most one attempt is in flight

pub mod monitor;
pub mod snapshot;

pub use monitor::{DevicePoller, PollOutcome};
pub use snapshot::{CachedDeviceSnapshot, ServedSnapshot, SnapshotCache};
