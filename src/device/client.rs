//! HTTP client for the device.
//!
//! # Responsibilities
//! - Build request URLs from the configured base URL
//! - Enforce a per-request deadline
//! - Classify failures (timeout, connection, status, payload)

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::config::DeviceConfig;
use crate::device::DeviceError;

/// Something that can fetch JSON documents from the device.
///
/// Implementations must not retry; the breaker owns retry policy.
pub trait DeviceClient: Send + Sync + 'static {
    fn get_json(&self, path: &str) -> impl Future<Output = Result<Value, DeviceError>> + Send;
}

/// `reqwest`-backed device client.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    base_url: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDeviceClient {
    pub fn new(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| DeviceError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        let timeout = Duration::from_millis(config.timeout_ms);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("fpp-guard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeviceError::Connection(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<Url, DeviceError> {
        self.base_url
            .join(path)
            .map_err(|e| DeviceError::InvalidUrl(format!("{}: {}", path, e)))
    }
}

impl DeviceClient for HttpDeviceClient {
    async fn get_json(&self, path: &str) -> Result<Value, DeviceError> {
        let url = self.url_for(path)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DeviceError::Timeout(self.timeout.as_millis() as u64)
            } else {
                DeviceError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Status(status.as_u16()));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                DeviceError::Timeout(self.timeout.as_millis() as u64)
            } else {
                DeviceError::Malformed(e.to_string())
            }
        })
    }
}
