//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! GET /status  → breaker.stats() + snapshot.serve()  (public)
//! GET /health  → liveness                            (public)
//! /admin/*     → admin module                        (bearer token)
//! ```
//!
//! # Design Decisions
//! - Status never returns an error code for an offline device; the body says so
//! - Served device data always carries `cached` and `cache_age_seconds`

pub mod server;

pub use server::{AppState, HttpServer, StatusResponse};
