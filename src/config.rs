//! Engine configuration

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::index::fulltext::DEFAULT_MIN_TOKEN_LEN;

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tokens shorter than this are not indexed or searched
    pub full_text_min_token_len: usize,
    /// Commit log location; `None` keeps everything in memory
    pub commit_log: Option<PathBuf>,
    /// fsync the commit log on every commit
    pub sync_on_commit: bool,
    /// Where schema definitions are saved; `Database::new` loads it if present
    pub catalog_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            full_text_min_token_len: DEFAULT_MIN_TOKEN_LEN,
            commit_log: None,
            sync_on_commit: true,
            catalog_file: None,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Set the minimum full-text token length
    pub fn full_text_min_token_len(mut self, len: usize) -> Self {
        self.full_text_min_token_len = len;
        self
    }

    /// Persist commits to a log at `path`
    pub fn commit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.commit_log = Some(path.into());
        self
    }

    /// Set whether commits fsync the log
    pub fn sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    /// Save the catalog to `path` after every definition
    pub fn catalog_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_file = Some(path.into());
        self
    }
}

/// Source of `NOW()` for defaults and triggers
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.full_text_min_token_len, 3);
        assert!(config.commit_log.is_none());
        assert!(config.sync_on_commit);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inkdb.json");
        std::fs::write(&path, r#"{ "full_text_min_token_len": 4 }"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.full_text_min_token_len, 4);
        assert!(config.sync_on_commit);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        clock.advance(5);
        assert_eq!(clock.now_millis(), 105);
        clock.set(1);
        assert_eq!(clock.now_millis(), 1);
    }
}
