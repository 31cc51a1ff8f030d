//! Breaker events.
//!
//! Every transition emits a [`BreakerEvent::StateChange`] followed by the
//! state-specific event. Subscribers get their own receiver; a slow
//! subscriber lags and loses old events rather than blocking the breaker.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::resilience::state::CircuitState;

/// Channel depth per subscriber.
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BreakerEvent {
    StateChange {
        new: CircuitState,
        previous: CircuitState,
    },
    Open {
        failure_count: u32,
        /// Earliest wall-clock ms at which a probe is allowed.
        next_retry_ms: u64,
    },
    HalfOpen,
    Closed,
}

pub type EventReceiver = broadcast::Receiver<BreakerEvent>;

/// Why a [`sleep_or_wake`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    /// The breaker closed while sleeping.
    Recovered,
    Shutdown,
}

/// Sleep for `delay`, returning early if the breaker closes or shutdown
/// is signalled.
pub async fn sleep_or_wake(
    delay: Duration,
    events: &mut EventReceiver,
    shutdown: &mut broadcast::Receiver<()>,
) -> Wake {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    let mut events_open = true;

    loop {
        tokio::select! {
            _ = &mut sleep => return Wake::Elapsed,
            _ = shutdown.recv() => return Wake::Shutdown,
            event = events.recv(), if events_open => match event {
                Ok(BreakerEvent::Closed) => return Wake::Recovered,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => events_open = false,
            },
        }
    }
}

/// Drop every event already queued on `events`, returning how many.
///
/// Used by a caller whose own report may have produced the queued events,
/// so they do not wake it on the next [`sleep_or_wake`].
pub fn discard_pending(events: &mut EventReceiver) -> usize {
    let mut discarded = 0;
    loop {
        match events.try_recv() {
            Ok(_) => discarded += 1,
            Err(TryRecvError::Lagged(skipped)) => discarded += skipped as usize,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return discarded,
        }
    }
}

/// Spawn a task that logs every breaker event until the channel closes.
pub fn spawn_event_logger(mut events: EventReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BreakerEvent::StateChange { new, previous }) => {
                    tracing::info!(%previous, %new, "Device circuit state changed");
                }
                Ok(BreakerEvent::Open { failure_count, next_retry_ms }) => {
                    tracing::warn!(failure_count, next_retry_ms, "Device marked offline");
                }
                Ok(BreakerEvent::HalfOpen) => {
                    tracing::info!("Probing device for recovery");
                }
                Ok(BreakerEvent::Closed) => {
                    tracing::info!("Device back online");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wakes_on_closed() {
        let (tx, mut events) = broadcast::channel(EVENT_CAPACITY);
        let (_shutdown_tx, mut shutdown) = broadcast::channel(1);

        tx.send(BreakerEvent::HalfOpen).unwrap();
        tx.send(BreakerEvent::Closed).unwrap();
        let wake = sleep_or_wake(Duration::from_secs(60), &mut events, &mut shutdown).await;
        assert_eq!(wake, Wake::Recovered);
    }

    #[tokio::test]
    async fn test_wakes_on_shutdown() {
        let (_tx, mut events) = broadcast::channel::<BreakerEvent>(EVENT_CAPACITY);
        let (shutdown_tx, mut shutdown) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();
        let wake = sleep_or_wake(Duration::from_secs(60), &mut events, &mut shutdown).await;
        assert_eq!(wake, Wake::Shutdown);
    }

    #[tokio::test]
    async fn test_discarded_events_do_not_wake() {
        let (tx, mut events) = broadcast::channel(EVENT_CAPACITY);
        let (_shutdown_tx, mut shutdown) = broadcast::channel::<()>(1);

        tx.send(BreakerEvent::HalfOpen).unwrap();
        tx.send(BreakerEvent::Closed).unwrap();
        assert_eq!(discard_pending(&mut events), 2);
        assert_eq!(discard_pending(&mut events), 0);

        let wake = sleep_or_wake(Duration::from_millis(10), &mut events, &mut shutdown).await;
        assert_eq!(wake, Wake::Elapsed);
    }

    #[tokio::test]
    async fn test_elapses() {
        let (_tx, mut events) = broadcast::channel::<BreakerEvent>(EVENT_CAPACITY);
        let (_shutdown_tx, mut shutdown) = broadcast::channel::<()>(1);
        let wake = sleep_or_wake(Duration::from_millis(10), &mut events, &mut shutdown).await;
        assert_eq!(wake, Wake::Elapsed);
    }
}
