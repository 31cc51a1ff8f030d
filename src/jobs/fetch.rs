//! Built-in cache refresher: fetch a device document on a schedule.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::time;

use crate::clock::Clock;
use crate::config::{DeviceConfig, JobConfig};
use crate::device::{DeviceClient, DeviceError};
use crate::jobs::{JobError, PeriodicJob};

#[derive(Debug, Clone, PartialEq)]
struct CachedResource {
    body: Value,
    fetched_at_ms: u64,
}

/// A resource as served to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServedResource {
    pub name: String,
    pub body: Value,
    pub cached: bool,
    pub cache_age_seconds: u64,
}

/// Latest body of each fetched resource, keyed by job name.
pub struct ResourceCache {
    entries: DashMap<String, CachedResource>,
    clock: Arc<dyn Clock>,
}

impl ResourceCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn insert(&self, name: &str, body: Value) {
        self.entries.insert(
            name.to_string(),
            CachedResource {
                body,
                fetched_at_ms: self.clock.now_ms(),
            },
        );
    }

    pub fn serve(&self, name: &str) -> Option<ServedResource> {
        let entry = self.entries.get(name)?;
        let age_ms = self.clock.now_ms().saturating_sub(entry.fetched_at_ms);
        Some(ServedResource {
            name: name.to_string(),
            body: entry.body.clone(),
            cached: true,
            cache_age_seconds: age_ms / 1_000,
        })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}

/// GETs one device path and stores the JSON body in a [`ResourceCache`].
pub struct DeviceFetchJob<C> {
    name: String,
    path: String,
    client: Arc<C>,
    cache: Arc<ResourceCache>,
    timeout: Duration,
}

impl<C: DeviceClient> DeviceFetchJob<C> {
    pub fn new(
        config: &JobConfig,
        device: &DeviceConfig,
        client: Arc<C>,
        cache: Arc<ResourceCache>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            path: config.path.clone(),
            client,
            cache,
            timeout: Duration::from_millis(device.timeout_ms),
        }
    }
}

impl<C: DeviceClient> PeriodicJob for DeviceFetchJob<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), JobError> {
        let body = time::timeout(self.timeout, self.client.get_json(&self.path))
            .await
            .map_err(|_| DeviceError::Timeout(self.timeout.as_millis() as u64))??;

        tracing::debug!(job = %self.name, path = %self.path, "Resource refreshed");
        self.cache.insert(&self.name, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    struct FixedClient(Result<Value, DeviceError>);

    impl DeviceClient for FixedClient {
        async fn get_json(&self, _path: &str) -> Result<Value, DeviceError> {
            self.0.clone()
        }
    }

    fn job(client: FixedClient, cache: Arc<ResourceCache>) -> DeviceFetchJob<FixedClient> {
        let config = JobConfig {
            name: "playlists".into(),
            path: "/api/playlists".into(),
            interval_secs: 60,
            offline_interval_secs: 300,
        };
        DeviceFetchJob::new(&config, &DeviceConfig::default(), Arc::new(client), cache)
    }

    #[tokio::test]
    async fn test_fetch_stores_body() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(ResourceCache::new(clock.clone()));
        let job = job(FixedClient(Ok(json!(["Christmas", "Halloween"]))), cache.clone());

        job.run().await.unwrap();
        clock.advance(12_500);

        let served = cache.serve("playlists").unwrap();
        assert_eq!(served.body, json!(["Christmas", "Halloween"]));
        assert!(served.cached);
        assert_eq!(served.cache_age_seconds, 12);
        assert_eq!(cache.names(), vec!["playlists"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_body() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(ResourceCache::new(clock));
        cache.insert("playlists", json!(["old"]));

        let job = job(FixedClient(Err(DeviceError::Status(503))), cache.clone());
        assert!(matches!(job.run().await, Err(JobError::Device(DeviceError::Status(503)))));
        assert_eq!(cache.serve("playlists").unwrap().body, json!(["old"]));
    }
}
