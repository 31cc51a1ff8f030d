//! Connectivity guard for an FPP show-control device.
//!
//! A persisted circuit breaker decides whether the device may be contacted.
//! A poller keeps the last good status snapshot, dependent jobs pause while
//! the device is offline, and a small HTTP surface serves both.

pub mod admin;
pub mod clock;
pub mod config;
pub mod device;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod observability;
pub mod poller;
pub mod resilience;
pub mod store;

pub use config::schema::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitState};
