//! Device status poller.
//!
//! # Responsibilities
//! - Ask the breaker before every contact; skip the cycle when refused
//! - Perform one bounded-timeout status fetch per permitted cycle
//! - Report the outcome and refresh the snapshot on success
//! - Stretch the tick interval while the circuit is OPEN

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::{DeviceConfig, PollerConfig};
use crate::device::{DeviceClient, DeviceError, DeviceStatus};
use crate::observability::metrics;
use crate::poller::snapshot::SnapshotCache;
use crate::resilience::events::{discard_pending, sleep_or_wake, Wake};
use crate::resilience::{CircuitBreaker, CircuitState};

/// Floor for the OPEN-state delay once a probe is already due.
const MIN_DELAY: Duration = Duration::from_millis(100);

/// Result of a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The breaker refused; no contact was made.
    Skipped,
    Success,
    Failure(DeviceError),
}

pub struct DevicePoller<C> {
    client: Arc<C>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<SnapshotCache>,
    config: PollerConfig,
    status_path: String,
    timeout: Duration,
}

impl<C: DeviceClient> DevicePoller<C> {
    pub fn new(
        client: Arc<C>,
        breaker: Arc<CircuitBreaker>,
        cache: Arc<SnapshotCache>,
        config: PollerConfig,
        device: &DeviceConfig,
    ) -> Self {
        Self {
            client,
            breaker,
            cache,
            config,
            status_path: device.status_path.clone(),
            timeout: Duration::from_millis(device.timeout_ms),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Device poller disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            open_interval = self.config.open_interval_secs,
            path = %self.status_path,
            "Device poller starting"
        );

        let mut events = self.breaker.subscribe();
        loop {
            self.poll_once().await;
            // A Closed event caused by this poll's own report is not a reason to poll again now
            discard_pending(&mut events);

            let delay = self.next_delay();
            match sleep_or_wake(delay, &mut events, &mut shutdown).await {
                Wake::Elapsed | Wake::Recovered => {}
                Wake::Shutdown => {
                    tracing::info!("Device poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one cycle. The fetch is awaited inline under a deadline, so a
    /// timed-out attempt is dropped before this returns.
    pub async fn poll_once(&self) -> PollOutcome {
        if !self.breaker.allow_request() {
            tracing::trace!("Circuit open, skipping device poll");
            metrics::record_poll("skipped");
            return PollOutcome::Skipped;
        }

        let result = match time::timeout(self.timeout, self.client.get_json(&self.status_path)).await {
            Ok(Ok(payload)) => DeviceStatus::from_json(payload),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(status) => {
                self.breaker.record_success();
                tracing::debug!(
                    status = %status.status_name,
                    playing = status.is_playing(),
                    "Device status refreshed"
                );
                self.cache.store(status);
                metrics::record_poll("success");
                PollOutcome::Success
            }
            Err(e) => {
                self.breaker.record_failure(Some(&e.to_string()));
                metrics::record_poll("failure");
                PollOutcome::Failure(e)
            }
        }
    }

    /// Delay before the next cycle, based on the breaker's current state.
    pub fn next_delay(&self) -> Duration {
        let stats = self.breaker.stats();
        match stats.state {
            CircuitState::Open => {
                let open = Duration::from_secs(self.config.open_interval_secs);
                let retry = Duration::from_millis(stats.next_retry_in_ms.unwrap_or(0));
                open.min(retry).max(MIN_DELAY)
            }
            CircuitState::Closed | CircuitState::HalfOpen => {
                Duration::from_secs(self.config.interval_secs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BreakerConfig;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted responses and counts calls.
    struct ScriptedClient {
        responses: Mutex<Vec<Result<Value, DeviceError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(mut responses: Vec<Result<Value, DeviceError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DeviceClient for ScriptedClient {
        async fn get_json(&self, _path: &str) -> Result<Value, DeviceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(DeviceError::Connection("script exhausted".into())))
        }
    }

    /// Never answers.
    struct HangingClient;

    impl DeviceClient for HangingClient {
        async fn get_json(&self, _path: &str) -> Result<Value, DeviceError> {
            std::future::pending().await
        }
    }

    fn setup<C: DeviceClient>(client: C) -> (DevicePoller<C>, Arc<C>, Arc<CircuitBreaker>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let breaker = Arc::new(CircuitBreaker::with_clock(
            BreakerConfig::default(),
            MemoryStore::new(),
            clock.clone(),
        ));
        let cache = Arc::new(SnapshotCache::new(clock.clone(), 30));
        let client = Arc::new(client);
        let device = DeviceConfig {
            timeout_ms: 50,
            ..Default::default()
        };
        let poller = DevicePoller::new(client.clone(), breaker.clone(), cache, PollerConfig::default(), &device);
        (poller, client, breaker, clock)
    }

    #[tokio::test]
    async fn test_success_refreshes_snapshot() {
        let (poller, _, breaker, _) = setup(ScriptedClient::new(vec![Ok(json!({ "status_name": "idle" }))]));

        assert_eq!(poller.poll_once().await, PollOutcome::Success);
        assert_eq!(poller.cache.latest().unwrap().status.status_name, "idle");
        assert!(breaker.is_online());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_failure_and_keeps_snapshot() {
        let (poller, _, breaker, clock) = setup(ScriptedClient::new(vec![
            Ok(json!({ "status_name": "playing" })),
            Ok(json!({ "unexpected": true })),
        ]));

        poller.poll_once().await;
        clock.advance(5_000);
        assert!(matches!(poller.poll_once().await, PollOutcome::Failure(DeviceError::Malformed(_))));

        let snapshot = poller.cache.latest().unwrap();
        assert_eq!(snapshot.status.status_name, "playing");
        assert_eq!(snapshot.captured_at_ms, 1_000_000);
        assert_eq!(breaker.stats().failure_count, 1);
    }

    #[tokio::test]
    async fn test_no_contact_while_open() {
        let (poller, client, breaker, clock) = setup(ScriptedClient::new(vec![
            Err(DeviceError::Status(503)),
            Err(DeviceError::Status(503)),
            Err(DeviceError::Status(503)),
            Ok(json!({ "status_name": "idle" })),
            Ok(json!({ "status_name": "idle" })),
        ]));

        for _ in 0..3 {
            poller.poll_once().await;
        }
        assert!(breaker.is_offline());
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);

        for _ in 0..5 {
            clock.advance(10_000);
            assert_eq!(poller.poll_once().await, PollOutcome::Skipped);
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);

        clock.advance(10_000);
        assert_eq!(poller.poll_once().await, PollOutcome::Success);
        assert!(breaker.is_testing_recovery());
        assert_eq!(poller.poll_once().await, PollOutcome::Success);
        assert!(breaker.is_online());
        assert_eq!(client.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_closing_poll_does_not_trigger_extra_poll() {
        let (poller, client, breaker, clock) = setup(ScriptedClient::new(vec![
            Ok(json!({ "status_name": "idle" })),
            Ok(json!({ "status_name": "idle" })),
        ]));

        // HALF_OPEN with one success already banked; the next poll closes it.
        for _ in 0..3 {
            breaker.record_failure(None);
        }
        clock.advance(60_000);
        assert!(breaker.allow_request());
        breaker.record_success();
        assert!(breaker.is_testing_recovery());

        let shutdown = crate::lifecycle::Shutdown::new();
        let handle = tokio::spawn(poller.run(shutdown.subscribe()));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(breaker.is_online());
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let (poller, _, breaker, _) = setup(HangingClient);
        assert_eq!(poller.poll_once().await, PollOutcome::Failure(DeviceError::Timeout(50)));
        assert_eq!(breaker.stats().failure_count, 1);
        assert_eq!(breaker.stats().probes_in_flight, 0);
    }

    #[tokio::test]
    async fn test_delay_follows_state() {
        let (poller, _, breaker, clock) = setup(HangingClient);
        assert_eq!(poller.next_delay(), Duration::from_secs(5));

        for _ in 0..3 {
            breaker.record_failure(None);
        }
        assert_eq!(poller.next_delay(), Duration::from_secs(30));

        clock.advance(45_000);
        assert_eq!(poller.next_delay(), Duration::from_secs(15));

        clock.advance(20_000);
        assert_eq!(poller.next_delay(), MIN_DELAY);
    }
}
