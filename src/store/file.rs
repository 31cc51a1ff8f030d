//! JSON file store.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::resilience::state::CircuitRecord;
use crate::store::{StateStore, StoreError};

/// Keeps the circuit record in a single JSON file.
///
/// Writes go to a sibling temp file which is synced and renamed over the
/// target, so a crash mid-write leaves the previous record intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    closed: bool,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "circuit".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStore {
    fn load(&mut self) -> Result<Option<CircuitRecord>, StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let record: CircuitRecord = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(record))
    }

    fn save(&mut self, record: &CircuitRecord) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, record)
                .map_err(|e| StoreError::Io(e.into()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::trace!(path = %self.path.display(), state = %record.state, "Circuit record saved");
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::state::CircuitState;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("circuit.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("circuit.json");
        let mut store = FileStore::new(&path);

        let mut record = CircuitRecord::new(1_000);
        record.state = CircuitState::Open;
        record.failure_count = 3;
        record.last_failure_time_ms = 2_000;
        store.save(&record).unwrap();

        let mut reopened = FileStore::new(&path);
        assert_eq!(reopened.load().unwrap(), Some(record));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_invalid_state_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("circuit.json");
        fs::write(
            &path,
            r#"{"id":1,"state":"EXPLODED","failure_count":0,"success_count":0,
               "last_failure_time":0,"last_state_change":0,"total_transitions":0,
               "created_at":0,"updated_at":0}"#,
        )
        .unwrap();

        let mut store = FileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_closed_store_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("circuit.json"));
        store.close().unwrap();
        assert!(matches!(store.save(&CircuitRecord::new(0)), Err(StoreError::Closed)));
    }
}
