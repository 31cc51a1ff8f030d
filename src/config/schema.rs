//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Status/admin API listener.
    pub listener: ListenerConfig,

    /// Where and how to reach the device.
    pub device: DeviceConfig,

    /// Circuit breaker thresholds.
    pub breaker: BreakerConfig,

    /// Status poller cadence and freshness.
    pub poller: PollerConfig,

    /// Durable breaker state.
    pub store: StoreConfig,

    /// Coordinator settings shared by all dependent jobs.
    pub coordinator: CoordinatorConfig,

    /// Dependent periodic jobs.
    pub jobs: Vec<JobConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Device connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base URL of the device (e.g., "http://192.168.1.50").
    pub base_url: String,

    /// Path of the status endpoint.
    pub status_path: String,

    /// Hard deadline for one contact attempt, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://fpp.local".to_string(),
            status_path: "/api/fppd/status".to_string(),
            timeout_ms: 3_000,
        }
    }
}

/// Circuit breaker thresholds. Out-of-range values are clamped, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures in CLOSED before opening. Range 1..=10.
    pub failure_threshold: u32,

    /// Minimum dwell in OPEN before a probe, in milliseconds. Range 10s..=300s.
    pub reset_timeout_ms: u64,

    /// Consecutive HALF_OPEN successes needed to close. Range 1..=5.
    pub success_threshold: u32,

    /// Outstanding probes allowed while HALF_OPEN. Range 1..=5.
    pub half_open_max_attempts: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 60_000,
            success_threshold: 2,
            half_open_max_attempts: 1,
        }
    }
}

/// Status poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Enable the status poller.
    pub enabled: bool,

    /// Tick interval while CLOSED or HALF_OPEN, in seconds.
    pub interval_secs: u64,

    /// Upper bound on the tick interval while OPEN, in seconds.
    pub open_interval_secs: u64,

    /// Served snapshots older than this are flagged stale.
    pub stale_after_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            open_interval_secs: 30,
            stale_after_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON file holding the circuit record.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/circuit_breaker.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Upper bound of the random delay before jobs resume after recovery.
    pub resume_jitter_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            resume_jitter_ms: 2_000,
        }
    }
}

/// A dependent job that refreshes a cached device resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    /// Job identifier for logging/metrics; also the resource name.
    pub name: String,

    /// Device path to fetch (e.g., "/api/playlists").
    pub path: String,

    /// Run interval while the device is online.
    #[serde(default = "default_job_interval")]
    pub interval_secs: u64,

    /// Check interval while the device is offline.
    #[serde(default = "default_job_offline_interval")]
    pub offline_interval_secs: u64,
}

fn default_job_interval() -> u64 {
    60
}

fn default_job_offline_interval() -> u64 {
    300
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
