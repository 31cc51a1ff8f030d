//! Circuit state and the durable record.
//!
//! # States
//! - Closed: device reachable, contacts pass through
//! - Open: device assumed down, contacts are skipped
//! - HalfOpen: probing whether the device recovered
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     failure_count >= failure_threshold
//! Open     → HalfOpen: reset timeout elapsed since last failure
//! HalfOpen → Closed:   success_count >= success_threshold
//! HalfOpen → Open:     any failure
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Circuit state, stored as `"CLOSED"`, `"OPEN"` or `"HALF_OPEN"`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single persisted breaker row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitRecord {
    /// Always 1; there is exactly one row.
    #[serde(default = "record_id")]
    pub id: u32,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Milliseconds since epoch of the most recent failure, 0 if none.
    #[serde(rename = "last_failure_time")]
    pub last_failure_time_ms: u64,
    #[serde(rename = "last_state_change")]
    pub last_state_change_ms: u64,
    pub total_transitions: u64,
    #[serde(rename = "created_at")]
    pub created_at_ms: u64,
    #[serde(rename = "updated_at")]
    pub updated_at_ms: u64,
}

fn record_id() -> u32 {
    1
}

impl CircuitRecord {
    /// A fresh CLOSED row.
    pub fn new(now_ms: u64) -> Self {
        Self {
            id: 1,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time_ms: 0,
            last_state_change_ms: now_ms,
            total_transitions: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}
