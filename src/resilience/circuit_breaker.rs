//! Circuit breaker guarding contact with the device.
//!
//! # Responsibilities
//! - Decide whether a device contact may be attempted right now
//! - Count outcomes and drive CLOSED / OPEN / HALF_OPEN transitions
//! - Persist the full record after every state-affecting call
//! - Broadcast transition events to the poller, jobs and logger
//!
//! # Design Decisions
//! - One breaker per device, shared by `Arc`; no global instance
//! - Read-modify-write-persist runs under one mutex so transitions are linear
//! - Persistence failures are logged and reported in stats, never returned
//! - Thresholds are clamped into range instead of rejected
//! - The HALF_OPEN probe budget is enforced here; an abandoned probe slot
//!   is reclaimed after one reset timeout

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::events::{BreakerEvent, EventReceiver, EVENT_CAPACITY};
use crate::resilience::state::{CircuitRecord, CircuitState};
use crate::store::{StateStore, StoreError};

/// Longest failure reason kept for logging, in characters.
pub const MAX_REASON_LEN: usize = 200;

const FAILURE_THRESHOLD_RANGE: (u32, u32) = (1, 10);
const RESET_TIMEOUT_RANGE_MS: (u64, u64) = (10_000, 300_000);
const SUCCESS_THRESHOLD_RANGE: (u32, u32) = (1, 5);
const HALF_OPEN_ATTEMPTS_RANGE: (u32, u32) = (1, 5);

impl BreakerConfig {
    /// Pull every threshold into its valid range, warning about each change.
    pub fn clamped(self) -> Self {
        let clamped = Self {
            failure_threshold: self
                .failure_threshold
                .clamp(FAILURE_THRESHOLD_RANGE.0, FAILURE_THRESHOLD_RANGE.1),
            reset_timeout_ms: self
                .reset_timeout_ms
                .clamp(RESET_TIMEOUT_RANGE_MS.0, RESET_TIMEOUT_RANGE_MS.1),
            success_threshold: self
                .success_threshold
                .clamp(SUCCESS_THRESHOLD_RANGE.0, SUCCESS_THRESHOLD_RANGE.1),
            half_open_max_attempts: self
                .half_open_max_attempts
                .clamp(HALF_OPEN_ATTEMPTS_RANGE.0, HALF_OPEN_ATTEMPTS_RANGE.1),
        };

        if clamped.failure_threshold != self.failure_threshold {
            tracing::warn!(requested = self.failure_threshold, using = clamped.failure_threshold, "failure_threshold out of range");
        }
        if clamped.reset_timeout_ms != self.reset_timeout_ms {
            tracing::warn!(requested = self.reset_timeout_ms, using = clamped.reset_timeout_ms, "reset_timeout_ms out of range");
        }
        if clamped.success_threshold != self.success_threshold {
            tracing::warn!(requested = self.success_threshold, using = clamped.success_threshold, "success_threshold out of range");
        }
        if clamped.half_open_max_attempts != self.half_open_max_attempts {
            tracing::warn!(requested = self.half_open_max_attempts, using = clamped.half_open_max_attempts, "half_open_max_attempts out of range");
        }

        clamped
    }
}

/// Read-only view of the breaker, safe to hand to status consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time_ms: Option<u64>,
    pub time_since_last_failure_ms: Option<u64>,
    pub time_in_state_ms: u64,
    /// Milliseconds until a probe is allowed; `None` unless OPEN.
    pub next_retry_in_ms: Option<u64>,
    pub total_transitions: u64,
    pub uptime_ms: u64,
    pub probes_in_flight: u32,
    /// False when the most recent persistence write failed.
    pub persistence_ok: bool,
    pub config: BreakerConfig,
}

struct Inner {
    record: CircuitRecord,
    store: Option<Box<dyn StateStore>>,
    probes_in_flight: u32,
    last_probe_ms: u64,
    persistence_ok: bool,
}

/// Persisted circuit breaker for a single device.
pub struct CircuitBreaker {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<BreakerEvent>,
    started_at_ms: u64,
}

impl CircuitBreaker {
    /// Create a breaker on the system clock.
    pub fn new<S>(config: BreakerConfig, store: S) -> Self
    where
        S: StateStore + 'static,
    {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Create a breaker, loading (or inserting) the durable record.
    ///
    /// A missing row is inserted as CLOSED. An unreadable row is replaced by
    /// a CLOSED row with zeroed counters. An OPEN row whose reset timeout has
    /// already elapsed is promoted to HALF_OPEN before this returns.
    pub fn with_clock<S>(config: BreakerConfig, store: S, clock: Arc<dyn Clock>) -> Self
    where
        S: StateStore + 'static,
    {
        let config = config.clamped();
        let now = clock.now_ms();
        let mut store: Box<dyn StateStore> = Box::new(store);

        let (record, needs_insert) = match store.load() {
            Ok(Some(record)) => {
                tracing::info!(
                    state = %record.state,
                    failure_count = record.failure_count,
                    total_transitions = record.total_transitions,
                    "Loaded circuit record"
                );
                (record, false)
            }
            Ok(None) => {
                tracing::warn!("No circuit record found, initializing CLOSED");
                (CircuitRecord::new(now), true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Circuit record unusable, defaulting to CLOSED");
                (CircuitRecord::new(now), true)
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let breaker = Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                record,
                store: Some(store),
                probes_in_flight: 0,
                last_probe_ms: 0,
                persistence_ok: true,
            }),
            events,
            started_at_ms: now,
        };

        {
            let mut inner = breaker.lock();
            if needs_insert {
                breaker.persist(&mut inner, now);
            }
            if inner.record.state == CircuitState::Open && breaker.retry_due(&inner.record, now) {
                tracing::info!("Reset timeout elapsed while stopped, resuming in HALF_OPEN");
                let mut pending = Vec::new();
                breaker.transition(&mut inner, CircuitState::HalfOpen, now, &mut pending);
                breaker.persist(&mut inner, now);
            }
            metrics::record_breaker_state(inner.record.state);
        }

        breaker
    }

    /// Subscribe to transition events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().record.state
    }

    /// True when the device is considered reachable (CLOSED).
    pub fn is_online(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// True while contacts are being skipped (OPEN).
    pub fn is_offline(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// True while probing for recovery (HALF_OPEN).
    pub fn is_testing_recovery(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// Ask permission for one device contact.
    ///
    /// May promote OPEN to HALF_OPEN. A `true` answer must be followed by
    /// exactly one `record_success` or `record_failure`.
    pub fn allow_request(&self) -> bool {
        self.apply(|breaker, inner, now, pending| match inner.record.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if breaker.retry_due(&inner.record, now) {
                    breaker.transition(inner, CircuitState::HalfOpen, now, pending);
                    breaker.take_probe(inner, now)
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => breaker.take_probe(inner, now),
        })
    }

    /// Report a successful device contact.
    pub fn record_success(&self) {
        self.apply(|breaker, inner, now, pending| {
            let had_permit = breaker.release_probe(inner);
            inner.record.failure_count = 0;

            match inner.record.state {
                CircuitState::Closed => {}
                CircuitState::HalfOpen => {
                    if !had_permit {
                        tracing::debug!("Success recorded in HALF_OPEN without an outstanding probe");
                    }
                    inner.record.success_count += 1;
                    if inner.record.success_count >= breaker.config.success_threshold {
                        breaker.transition(inner, CircuitState::Closed, now, pending);
                    }
                }
                CircuitState::Open => {
                    tracing::debug!("Success recorded while OPEN; state unchanged");
                }
            }
        })
    }

    /// Report a failed device contact. The reason is only logged.
    pub fn record_failure(&self, reason: Option<&str>) {
        let reason = sanitize_reason(reason.unwrap_or("unspecified"));

        self.apply(|breaker, inner, now, pending| {
            breaker.release_probe(inner);
            inner.record.failure_count = inner.record.failure_count.saturating_add(1);
            inner.record.last_failure_time_ms = now;

            tracing::debug!(
                reason = %reason,
                state = %inner.record.state,
                failure_count = inner.record.failure_count,
                "Device contact failed"
            );

            match inner.record.state {
                CircuitState::Closed => {
                    if inner.record.failure_count >= breaker.config.failure_threshold {
                        breaker.transition(inner, CircuitState::Open, now, pending);
                    }
                }
                CircuitState::HalfOpen => {
                    breaker.transition(inner, CircuitState::Open, now, pending);
                }
                CircuitState::Open => {
                    tracing::debug!("Failure recorded while OPEN; retry window restarted");
                }
            }
        })
    }

    /// Force CLOSED and zero the counters.
    pub fn reset(&self) {
        self.apply(|breaker, inner, now, pending| {
            let previous = inner.record.state;
            if previous != CircuitState::Closed {
                breaker.transition(inner, CircuitState::Closed, now, pending);
            }
            inner.record.failure_count = 0;
            inner.record.success_count = 0;
            inner.probes_in_flight = 0;
            tracing::info!(%previous, "Circuit breaker manually reset");
        })
    }

    /// Point-in-time statistics. Never mutates the breaker.
    pub fn stats(&self) -> BreakerStats {
        let now = self.clock.now_ms();
        let inner = self.lock();
        let record = &inner.record;

        let last_failure = (record.last_failure_time_ms > 0).then_some(record.last_failure_time_ms);
        let next_retry_in_ms = (record.state == CircuitState::Open).then(|| {
            self.config
                .reset_timeout_ms
                .saturating_sub(now.saturating_sub(record.last_failure_time_ms))
        });

        BreakerStats {
            state: record.state,
            failure_count: record.failure_count,
            success_count: record.success_count,
            last_failure_time_ms: last_failure,
            time_since_last_failure_ms: last_failure.map(|t| now.saturating_sub(t)),
            time_in_state_ms: now.saturating_sub(record.last_state_change_ms),
            next_retry_in_ms,
            total_transitions: record.total_transitions,
            uptime_ms: now.saturating_sub(self.started_at_ms),
            probes_in_flight: inner.probes_in_flight,
            persistence_ok: inner.persistence_ok,
            config: self.config,
        }
    }

    /// A copy of the durable record as currently held in memory.
    pub fn record(&self) -> CircuitRecord {
        self.lock().record.clone()
    }

    /// Persist the final state and release the store.
    ///
    /// The breaker keeps working in memory afterwards; it just stops writing.
    pub fn close(&self) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        inner.record.updated_at_ms = now;

        let record = inner.record.clone();
        let Some(mut store) = inner.store.take() else {
            return Ok(());
        };

        let saved = store.save(&record);
        let closed = store.close();
        tracing::info!(state = %record.state, "Circuit breaker closed");
        saved.and(closed)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one read-modify-write under the lock, persist if the record
    /// changed, then publish any events the mutation produced.
    ///
    /// Events go out before the guard drops so subscribers see transitions
    /// in the order they were applied. `send` never blocks.
    fn apply<R>(&self, f: impl FnOnce(&Self, &mut Inner, u64, &mut Vec<BreakerEvent>) -> R) -> R {
        let now = self.clock.now_ms();
        let mut pending = Vec::new();

        let mut inner = self.lock();
        let before = inner.record.clone();
        let result = f(self, &mut *inner, now, &mut pending);
        if inner.record != before {
            self.persist(&mut *inner, now);
        }

        for event in pending {
            let _ = self.events.send(event);
        }
        drop(inner);
        result
    }

    fn retry_due(&self, record: &CircuitRecord, now: u64) -> bool {
        now.saturating_sub(record.last_failure_time_ms) >= self.config.reset_timeout_ms
    }

    fn take_probe(&self, inner: &mut Inner, now: u64) -> bool {
        if inner.probes_in_flight > 0
            && now.saturating_sub(inner.last_probe_ms) >= self.config.reset_timeout_ms
        {
            tracing::warn!(
                probes = inner.probes_in_flight,
                "Reclaiming probe slots that never reported an outcome"
            );
            inner.probes_in_flight = 0;
        }

        if inner.probes_in_flight < self.config.half_open_max_attempts {
            inner.probes_in_flight += 1;
            inner.last_probe_ms = now;
            true
        } else {
            false
        }
    }

    fn release_probe(&self, inner: &mut Inner) -> bool {
        if inner.probes_in_flight > 0 {
            inner.probes_in_flight -= 1;
            true
        } else {
            false
        }
    }

    fn transition(
        &self,
        inner: &mut Inner,
        to: CircuitState,
        now: u64,
        pending: &mut Vec<BreakerEvent>,
    ) {
        let previous = inner.record.state;
        let record = &mut inner.record;

        record.state = to;
        record.last_state_change_ms = now;
        record.total_transitions += 1;
        record.success_count = 0;
        inner.probes_in_flight = 0;

        pending.push(BreakerEvent::StateChange { new: to, previous });
        match to {
            CircuitState::Closed => {
                record.failure_count = 0;
                pending.push(BreakerEvent::Closed);
            }
            CircuitState::Open => {
                pending.push(BreakerEvent::Open {
                    failure_count: record.failure_count,
                    next_retry_ms: record.last_failure_time_ms + self.config.reset_timeout_ms,
                });
            }
            CircuitState::HalfOpen => pending.push(BreakerEvent::HalfOpen),
        }

        metrics::record_breaker_transition(previous, to);
        metrics::record_breaker_state(to);
    }

    fn persist(&self, inner: &mut Inner, now: u64) {
        inner.record.updated_at_ms = now;
        let Some(store) = inner.store.as_mut() else {
            tracing::debug!("Breaker closed, skipping persistence");
            return;
        };

        match store.save(&inner.record) {
            Ok(()) => {
                if !inner.persistence_ok {
                    tracing::info!("Circuit record persistence recovered");
                }
                inner.persistence_ok = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, state = %inner.record.state, "Failed to persist circuit record");
                inner.persistence_ok = false;
            }
        }
    }
}

/// Make a failure reason safe to log: no control characters, bounded length.
pub fn sanitize_reason(reason: &str) -> String {
    let cleaned: String = reason
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_REASON_LEN)
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "unspecified".to_string()
    } else {
        trimmed.to_string()
    }
}
