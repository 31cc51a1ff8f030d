//! Dependent periodic jobs.
//!
//! # Data Flow
//! ```text
//! coordinator.rs (one task per job)
//!     → breaker.is_online()?
//!         no  → skip silently, wait offline_interval (or until Closed event)
//!         yes → job.run()
//!               → device errors are reported to the breaker, never retried
//!     → registry.rs records run/skip/failure
//!
//! fetch.rs (built-in job)
//!     → GET device path → resource cache
//! ```
//!
//! # Design Decisions
//! - Jobs never implement their own backoff against the device
//! - Resume after recovery is jittered so jobs do not stampede the device
//! - A failing job is logged and counted; it never stops the coordinator

pub mod coordinator;
pub mod fetch;
pub mod registry;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::config::JobConfig;
use crate::device::DeviceError;

pub use coordinator::{GatedJob, JobCoordinator, JobOutcome};
pub use fetch::{DeviceFetchJob, ResourceCache, ServedResource};
pub use registry::{JobRegistry, JobStatus};

#[derive(Debug, Error)]
pub enum JobError {
    /// The device itself failed; reported to the breaker.
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("{0}")]
    Failed(String),
}

/// A periodic body that is only worth running while the device is online.
pub trait PeriodicJob: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn run(&self) -> impl Future<Output = Result<(), JobError>> + Send;
}

/// How often a job runs in each connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSchedule {
    pub interval: Duration,
    pub offline_interval: Duration,
}

impl From<&JobConfig> for JobSchedule {
    fn from(config: &JobConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            offline_interval: Duration::from_secs(config.offline_interval_secs),
        }
    }
}
