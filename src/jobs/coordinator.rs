//! Breaker-gated scheduling for dependent jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::jobs::registry::JobRegistry;
use crate::jobs::{JobError, JobSchedule, PeriodicJob};
use crate::observability::metrics;
use crate::resilience::events::{sleep_or_wake, Wake};
use crate::resilience::CircuitBreaker;

/// Result of one job cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Ran,
    Failed(String),
    /// Device offline; the body did not run.
    Skipped,
}

/// A job wrapped with the online check and its cadence.
pub struct GatedJob<J> {
    job: J,
    breaker: Arc<CircuitBreaker>,
    registry: Arc<JobRegistry>,
    schedule: JobSchedule,
    resume_jitter: Duration,
}

impl<J: PeriodicJob> GatedJob<J> {
    pub fn new(
        job: J,
        breaker: Arc<CircuitBreaker>,
        registry: Arc<JobRegistry>,
        schedule: JobSchedule,
        resume_jitter: Duration,
    ) -> Self {
        Self {
            job,
            breaker,
            registry,
            schedule,
            resume_jitter,
        }
    }

    /// Run the body once if the device is online.
    pub async fn run_cycle(&self) -> JobOutcome {
        let name = self.job.name();

        if !self.breaker.is_online() {
            tracing::debug!(job = name, state = %self.breaker.state(), "Device offline, skipping job");
            self.registry.record_skip(name);
            metrics::record_job_run(name, "skipped");
            return JobOutcome::Skipped;
        }

        match self.job.run().await {
            Ok(()) => {
                self.registry.record_run(name, None);
                metrics::record_job_run(name, "ok");
                JobOutcome::Ran
            }
            Err(e) => {
                if let JobError::Device(device_error) = &e {
                    self.breaker.record_failure(Some(&device_error.to_string()));
                }
                tracing::warn!(job = name, error = %e, "Job failed");
                let message = e.to_string();
                self.registry.record_run(name, Some(message.clone()));
                metrics::record_job_run(name, "error");
                JobOutcome::Failed(message)
            }
        }
    }

    fn next_delay(&self) -> Duration {
        if self.breaker.is_online() {
            self.schedule.interval
        } else {
            self.schedule.offline_interval
        }
    }

    fn resume_delay(&self) -> Duration {
        let max_ms = self.resume_jitter.as_millis() as u64;
        if max_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=max_ms))
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let name = self.job.name().to_string();
        let mut events = self.breaker.subscribe();

        loop {
            self.run_cycle().await;

            match sleep_or_wake(self.next_delay(), &mut events, &mut shutdown).await {
                Wake::Elapsed => {}
                Wake::Recovered => {
                    let delay = self.resume_delay();
                    tracing::info!(job = %name, delay_ms = delay.as_millis() as u64, "Device recovered, resuming job");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.recv() => break,
                    }
                }
                Wake::Shutdown => break,
            }
        }

        tracing::info!(job = %name, "Job stopped");
    }
}

/// Spawns and tracks gated job tasks.
pub struct JobCoordinator {
    breaker: Arc<CircuitBreaker>,
    registry: Arc<JobRegistry>,
    resume_jitter: Duration,
    handles: Vec<JoinHandle<()>>,
}

impl JobCoordinator {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        registry: Arc<JobRegistry>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            breaker,
            registry,
            resume_jitter: Duration::from_millis(config.resume_jitter_ms),
            handles: Vec::new(),
        }
    }

    pub fn spawn<J: PeriodicJob>(
        &mut self,
        job: J,
        schedule: JobSchedule,
        shutdown: broadcast::Receiver<()>,
    ) {
        self.registry.register(job.name());
        tracing::info!(
            job = job.name(),
            interval_secs = schedule.interval.as_secs(),
            offline_interval_secs = schedule.offline_interval.as_secs(),
            "Starting dependent job"
        );

        let gated = GatedJob::new(
            job,
            self.breaker.clone(),
            self.registry.clone(),
            schedule,
            self.resume_jitter,
        );
        self.handles.push(tokio::spawn(gated.run(shutdown)));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every job task to finish (after shutdown was triggered).
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Job task panicked");
            }
        }
    }
}
