//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Poller / dependent job:
//!     → circuit_breaker.rs allow_request() (may promote OPEN → HALF_OPEN)
//!     → device contact (bounded timeout)
//!     → record_success() / record_failure(reason)
//!     → store persists state.rs record
//!     → events.rs broadcasts transitions
//! ```
//!
//! # Design Decisions
//! - The breaker is the only place that decides when to retry the device
//! - State survives restarts; an expired OPEN resumes as HALF_OPEN
//! - Callers never see breaker errors; they see `false` or stats

pub mod circuit_breaker;
pub mod events;
pub mod state;

pub use circuit_breaker::{BreakerStats, CircuitBreaker};
pub use events::{BreakerEvent, EventReceiver};
pub use state::{CircuitRecord, CircuitState};
