//! Poller and device client against a mock device over real HTTP.

use std::sync::Arc;

use fpp_guard::clock::ManualClock;
use fpp_guard::config::{BreakerConfig, DeviceConfig, PollerConfig};
use fpp_guard::device::{DeviceClient, DeviceError, HttpDeviceClient};
use fpp_guard::poller::{DevicePoller, PollOutcome, SnapshotCache};
use fpp_guard::resilience::{CircuitBreaker, CircuitState};
use fpp_guard::store::MemoryStore;

mod common;
use common::{start_mock_device, DeviceMode, MockDevice};

const T0: u64 = 1_700_000_000_000;

struct Harness {
    device: MockDevice,
    clock: Arc<ManualClock>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<SnapshotCache>,
    poller: DevicePoller<HttpDeviceClient>,
}

async fn harness(timeout_ms: u64) -> Harness {
    let device = start_mock_device().await;
    let device_config = DeviceConfig {
        base_url: device.base_url(),
        timeout_ms,
        ..Default::default()
    };
    let clock = Arc::new(ManualClock::new(T0));
    let breaker = Arc::new(CircuitBreaker::with_clock(
        BreakerConfig::default(),
        MemoryStore::new(),
        clock.clone(),
    ));
    let cache = Arc::new(SnapshotCache::new(clock.clone(), 30));
    let client = Arc::new(HttpDeviceClient::new(&device_config).unwrap());
    let poller = DevicePoller::new(
        client,
        breaker.clone(),
        cache.clone(),
        PollerConfig::default(),
        &device_config,
    );

    Harness {
        device,
        clock,
        breaker,
        cache,
        poller,
    }
}

#[tokio::test]
async fn test_healthy_poll_refreshes_snapshot() {
    let h = harness(2_000).await;

    assert_eq!(h.poller.poll_once().await, PollOutcome::Success);

    let served = h.cache.serve().unwrap();
    assert!(served.cached);
    assert!(!served.stale);
    assert_eq!(served.status.status_name, "playing");
    assert_eq!(served.status.current_playlist.as_deref(), Some("Christmas"));
    assert_eq!(served.status.seconds_played, Some(42));
    assert_eq!(h.breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_no_contact_while_open() {
    let h = harness(2_000).await;
    h.device.set_mode(DeviceMode::Status(503));

    for _ in 0..3 {
        assert!(matches!(
            h.poller.poll_once().await,
            PollOutcome::Failure(DeviceError::Status(503))
        ));
    }
    assert_eq!(h.breaker.state(), CircuitState::Open);
    let hits = h.device.hits();

    h.clock.advance(30_000);
    for _ in 0..5 {
        assert_eq!(h.poller.poll_once().await, PollOutcome::Skipped);
    }
    assert_eq!(h.device.hits(), hits);
}

#[tokio::test]
async fn test_last_snapshot_served_while_offline() {
    let h = harness(2_000).await;
    h.poller.poll_once().await;

    h.device.set_mode(DeviceMode::Status(500));
    for _ in 0..3 {
        h.poller.poll_once().await;
    }
    h.clock.advance(45_000);

    let served = h.cache.serve().unwrap();
    assert_eq!(served.status.status_name, "playing");
    assert_eq!(served.cache_age_seconds, 45);
    assert!(served.stale);
}

#[tokio::test]
async fn test_recovery_through_half_open() {
    let h = harness(2_000).await;
    h.device.set_mode(DeviceMode::Status(500));
    for _ in 0..3 {
        h.poller.poll_once().await;
    }
    assert_eq!(h.breaker.state(), CircuitState::Open);

    h.device.set_mode(DeviceMode::Healthy);
    h.clock.advance(60_000);

    assert_eq!(h.poller.poll_once().await, PollOutcome::Success);
    assert_eq!(h.breaker.state(), CircuitState::HalfOpen);
    assert_eq!(h.poller.poll_once().await, PollOutcome::Success);
    assert_eq!(h.breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_hanging_device_times_out() {
    let h = harness(200).await;
    h.device.set_mode(DeviceMode::Hang);

    let outcome = h.poller.poll_once().await;
    assert_eq!(outcome, PollOutcome::Failure(DeviceError::Timeout(200)));
    assert_eq!(h.breaker.stats().failure_count, 1);
}

#[tokio::test]
async fn test_non_json_body_is_a_failure() {
    let h = harness(2_000).await;
    h.device.set_mode(DeviceMode::Garbage);

    assert!(matches!(
        h.poller.poll_once().await,
        PollOutcome::Failure(DeviceError::Malformed(_))
    ));
    assert!(h.cache.serve().is_none());
}

#[tokio::test]
async fn test_unreachable_device_is_a_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpDeviceClient::new(&DeviceConfig {
        base_url: format!("http://{addr}"),
        timeout_ms: 1_000,
        ..Default::default()
    })
    .unwrap();

    let result = client.get_json("/api/fppd/status").await;
    assert!(matches!(result, Err(DeviceError::Connection(_))));
}
