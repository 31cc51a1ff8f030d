//! Device contact subsystem.
//!
//! # Data Flow
//! ```text
//! Poller / dependent job (after allow_request)
//!     → client.rs (bounded-timeout HTTP GET, JSON body)
//!     → status.rs (validate status payload)
//!     → Ok → record_success, Err(DeviceError) → record_failure(reason)
//! ```
//!
//! # Design Decisions
//! - Every failure mode is a `DeviceError` value; nothing panics or retries
//! - Non-2xx and unparseable bodies count as failures, same as timeouts

pub mod client;
pub mod status;

use thiserror::Error;

pub use client::{DeviceClient, HttpDeviceClient};
pub use status::DeviceStatus;

/// Why a device contact failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device timed out after {0} ms")]
    Timeout(u64),

    #[error("device connection failed: {0}")]
    Connection(String),

    #[error("device returned HTTP {0}")]
    Status(u16),

    #[error("malformed device response: {0}")]
    Malformed(String),

    #[error("invalid device URL: {0}")]
    InvalidUrl(String),
}
