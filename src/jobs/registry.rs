//! Per-job run bookkeeping.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub runs: u64,
    pub skips: u64,
    pub failures: u64,
    pub last_run_ms: Option<u64>,
    pub last_skip_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl JobStatus {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runs: 0,
            skips: 0,
            failures: 0,
            last_run_ms: None,
            last_skip_ms: None,
            last_error: None,
        }
    }
}

/// Thread-safe status table shared by all job tasks and the admin API.
pub struct JobRegistry {
    jobs: DashMap<String, JobStatus>,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: DashMap::new(),
            clock,
        }
    }

    pub fn register(&self, name: &str) {
        self.jobs
            .entry(name.to_string())
            .or_insert_with(|| JobStatus::new(name));
    }

    pub fn record_run(&self, name: &str, error: Option<String>) {
        let now = self.clock.now_ms();
        let mut entry = self
            .jobs
            .entry(name.to_string())
            .or_insert_with(|| JobStatus::new(name));
        entry.runs += 1;
        entry.last_run_ms = Some(now);
        if error.is_some() {
            entry.failures += 1;
        }
        entry.last_error = error;
    }

    pub fn record_skip(&self, name: &str) {
        let now = self.clock.now_ms();
        let mut entry = self
            .jobs
            .entry(name.to_string())
            .or_insert_with(|| JobStatus::new(name));
        entry.skips += 1;
        entry.last_skip_ms = Some(now);
    }

    pub fn get(&self, name: &str) -> Option<JobStatus> {
        self.jobs.get(name).map(|r| r.value().clone())
    }

    /// All jobs, sorted by name.
    pub fn list(&self) -> Vec<JobStatus> {
        let mut all: Vec<_> = self.jobs.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_registry_counts() {
        let clock = Arc::new(ManualClock::new(100));
        let registry = JobRegistry::new(clock.clone());
        registry.register("schedule");
        registry.record_skip("playlists");
        clock.advance(50);
        registry.record_run("playlists", Some("device returned HTTP 500".into()));
        registry.record_run("playlists", None);

        let status = registry.get("playlists").unwrap();
        assert_eq!(status.runs, 2);
        assert_eq!(status.skips, 1);
        assert_eq!(status.failures, 1);
        assert_eq!(status.last_run_ms, Some(150));
        assert_eq!(status.last_skip_ms, Some(100));
        assert_eq!(status.last_error, None);

        let names: Vec<_> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["playlists", "schedule"]);
    }
}
