//! In-process store.
//!
//! Clones share the same slot, so a test can keep one handle while the
//! breaker owns another and inspect what was persisted.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::resilience::state::CircuitRecord;
use crate::store::{StateStore, StoreError};

#[derive(Debug, Default)]
struct Slot {
    record: Option<CircuitRecord>,
    corrupt: bool,
    fail_writes: bool,
    writes: usize,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `record`.
    pub fn with_record(record: CircuitRecord) -> Self {
        let store = Self::default();
        store.lock().record = Some(record);
        store
    }

    /// A store whose row exists but cannot be decoded.
    pub fn corrupt() -> Self {
        let store = Self::default();
        store.lock().corrupt = true;
        store
    }

    /// Make subsequent writes fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn record(&self) -> Option<CircuitRecord> {
        self.lock().record.clone()
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateStore for MemoryStore {
    fn load(&mut self) -> Result<Option<CircuitRecord>, StoreError> {
        let slot = self.lock();
        if slot.closed {
            return Err(StoreError::Closed);
        }
        if slot.corrupt {
            return Err(StoreError::Corrupt("unreadable row".into()));
        }
        Ok(slot.record.clone())
    }

    fn save(&mut self, record: &CircuitRecord) -> Result<(), StoreError> {
        let mut slot = self.lock();
        if slot.closed {
            return Err(StoreError::Closed);
        }
        if slot.fail_writes {
            return Err(StoreError::Io(std::io::Error::other("injected write failure")));
        }
        slot.record = Some(record.clone());
        slot.corrupt = false;
        slot.writes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.lock().closed = true;
        Ok(())
    }
}
