//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, intervals > 0)
//! - Check the device URL and listener addresses parse
//! - Detect duplicate job names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Breaker thresholds are not validated here; they are clamped at construction

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GuardConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: String },

    #[error("{field}: path must start with '/'")]
    RelativePath { field: String },

    #[error("duplicate job name '{0}'")]
    DuplicateJob(String),

    #[error("admin.api_key must not be empty when admin is enabled")]
    EmptyApiKey,
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.device.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => errors.push(ValidationError::InvalidUrl {
            field: "device.base_url",
            value: config.device.base_url.clone(),
        }),
    }
    if !config.device.status_path.starts_with('/') {
        errors.push(ValidationError::RelativePath {
            field: "device.status_path".into(),
        });
    }
    if config.device.timeout_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "device.timeout_ms".into(),
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    for (field, value) in [
        ("poller.interval_secs", config.poller.interval_secs),
        ("poller.open_interval_secs", config.poller.open_interval_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field: field.into() });
        }
    }

    let mut seen = HashSet::new();
    for job in &config.jobs {
        if !seen.insert(job.name.as_str()) {
            errors.push(ValidationError::DuplicateJob(job.name.clone()));
        }
        if !job.path.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field: format!("jobs.{}.path", job.name),
            });
        }
        if job.interval_secs == 0 {
            errors.push(ValidationError::Zero {
                field: format!("jobs.{}.interval_secs", job.name),
            });
        }
        if job.offline_interval_secs == 0 {
            errors.push(ValidationError::Zero {
                field: format!("jobs.{}.offline_interval_secs", job.name),
            });
        }
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
