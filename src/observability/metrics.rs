//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fpp_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `fpp_breaker_transitions_total` (counter): by `from`, `to`
//! - `fpp_poll_total` (counter): poll cycles by `outcome`
//! - `fpp_snapshot_age_seconds` (gauge): age of the served snapshot
//! - `fpp_job_runs_total` (counter): dependent job cycles by `job`, `outcome`

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::state::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_breaker_state(state: CircuitState) {
    gauge!("fpp_breaker_state").set(state as u8 as f64);
}

pub fn record_breaker_transition(from: CircuitState, to: CircuitState) {
    counter!("fpp_breaker_transitions_total", "from" => from.as_str(), "to" => to.as_str())
        .increment(1);
}

/// Outcome of one poller tick: `success`, `failure` or `skipped`.
pub fn record_poll(outcome: &'static str) {
    counter!("fpp_poll_total", "outcome" => outcome).increment(1);
}

pub fn record_snapshot_age(age_secs: u64) {
    gauge!("fpp_snapshot_age_seconds").set(age_secs as f64);
}

/// Outcome of one job cycle: `ok`, `error` or `skipped`.
pub fn record_job_run(job: &str, outcome: &'static str) {
    counter!("fpp_job_runs_total", "job" => job.to_string(), "outcome" => outcome).increment(1);
}
