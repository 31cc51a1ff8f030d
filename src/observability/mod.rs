//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker, poller and jobs produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via `metrics`)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, not formatted strings, for anything machine-read
//! - Metric calls are no-ops until a recorder is installed, so tests need no setup
//! - Per-failure logs stay at debug; transitions are logged at info/warn

pub mod logging;
pub mod metrics;
