//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem in dependency order from a validated config
//! - Start the poller, dependent jobs and the HTTP server
//! - Tear everything down in order once shutdown fires
//!
//! # Design Decisions
//! - Fail fast: a bad device URL or an unbindable address is fatal
//! - The breaker is the only shared owner of the durable record; it is
//!   closed last, after every task that could mutate it has stopped

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use crate::device::{DeviceError, HttpDeviceClient};
use crate::http::{AppState, HttpServer};
use crate::jobs::{DeviceFetchJob, JobCoordinator, JobRegistry, JobSchedule, ResourceCache};
use crate::lifecycle::signals::listen_for_signals;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::poller::{DevicePoller, SnapshotCache};
use crate::resilience::events::spawn_event_logger;
use crate::resilience::CircuitBreaker;
use crate::store::FileStore;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("device client: {0}")]
    Device(#[from] DeviceError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server: {0}")]
    Server(#[source] std::io::Error),
}

/// Run the guard until SIGINT/SIGTERM or until `shutdown` is triggered.
pub async fn run(config: GuardConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    serve(config, listener, shutdown).await
}

/// Like [`run`], on an already-bound listener.
pub async fn serve(
    config: GuardConfig,
    listener: TcpListener,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Device access. Must precede the breaker: an early return here leaves nothing to close
    let client = Arc::new(HttpDeviceClient::new(&config.device)?);
    tracing::info!(base_url = %client.base_url(), "Device client ready");

    // Core: durable breaker state
    let store = FileStore::new(&config.store.path);
    tracing::info!(path = %store.path().display(), "Using circuit state file");
    let breaker = Arc::new(CircuitBreaker::with_clock(
        config.breaker,
        store,
        clock.clone(),
    ));
    let effective = breaker.config();
    tracing::info!(
        state = %breaker.state(),
        failure_threshold = effective.failure_threshold,
        reset_timeout_ms = effective.reset_timeout_ms,
        success_threshold = effective.success_threshold,
        half_open_max_attempts = effective.half_open_max_attempts,
        "Circuit breaker ready"
    );
    metrics::record_breaker_state(breaker.state());
    let event_logger = spawn_event_logger(breaker.subscribe());

    // Poller
    let snapshots = Arc::new(SnapshotCache::new(
        clock.clone(),
        config.poller.stale_after_secs,
    ));
    let poller = DevicePoller::new(
        client.clone(),
        breaker.clone(),
        snapshots.clone(),
        config.poller.clone(),
        &config.device,
    );
    let poller_task = tokio::spawn(poller.run(shutdown.subscribe()));

    // Dependent jobs
    let registry = Arc::new(JobRegistry::new(clock.clone()));
    let resources = Arc::new(ResourceCache::new(clock.clone()));
    let mut coordinator = JobCoordinator::new(breaker.clone(), registry.clone(), &config.coordinator);
    for job_config in &config.jobs {
        let job = DeviceFetchJob::new(job_config, &config.device, client.clone(), resources.clone());
        coordinator.spawn(job, JobSchedule::from(job_config), shutdown.subscribe());
    }
    if coordinator.is_empty() {
        tracing::info!("No dependent jobs configured");
    } else {
        tracing::info!(jobs = coordinator.len(), "Dependent jobs started");
    }

    // Listener last: traffic only once everything above is running
    let state = AppState {
        breaker: breaker.clone(),
        snapshots,
        jobs: registry,
        resources,
        admin: config.admin.clone(),
    };
    let server = HttpServer::new(state);
    tokio::spawn(listen_for_signals(shutdown.clone()));

    let served = server.run(listener, shutdown.clone()).await;

    // Whatever stopped the server, make sure background tasks stop too
    shutdown.trigger();
    if let Err(e) = poller_task.await {
        tracing::error!(error = %e, "Poller task panicked");
    }
    coordinator.join().await;
    event_logger.abort();

    if let Err(e) = breaker.close() {
        tracing::warn!(error = %e, "Failed to close circuit store");
    }

    served.map_err(StartupError::Server)
}
