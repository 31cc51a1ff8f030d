//! Durable breaker state.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker::new
//!     → StateStore::load (missing → insert CLOSED row, corrupt → warn + default)
//!
//! record_success / record_failure / reset
//!     → StateStore::save (full overwrite, one atomic write)
//!
//! CircuitBreaker::close
//!     → final save → StateStore::close
//! ```
//!
//! # Design Decisions
//! - One row, always overwritten wholesale
//! - Stores are synchronous; writes are small and local
//! - Errors are reported, never panicked on; the breaker decides what to do

pub mod file;
pub mod memory;

use thiserror::Error;

use crate::resilience::state::CircuitRecord;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors from the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored row exists but cannot be decoded.
    #[error("corrupt circuit record: {0}")]
    Corrupt(String),

    #[error("store is closed")]
    Closed,
}

/// Persistence for the single circuit record.
pub trait StateStore: Send {
    /// Load the row. `Ok(None)` means it was never written.
    fn load(&mut self) -> Result<Option<CircuitRecord>, StoreError>;

    /// Overwrite the row.
    fn save(&mut self, record: &CircuitRecord) -> Result<(), StoreError>;

    /// Release the handle. Later calls fail with [`StoreError::Closed`].
    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
