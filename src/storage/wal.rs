//! Commit log
//!
//! Handles durability by appending every committed transaction's row changes
//! to a JSON-lines file before the commit becomes visible. Recovery replays
//! the records in order.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::state::RowChange;
use crate::error::{Error, Result};

/// One committed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log Sequence Number
    pub lsn: u64,
    /// Transaction ID
    pub txn_id: u64,
    /// Commit timestamp (milliseconds since epoch)
    pub commit_ts: i64,
    /// Row changes in application order
    pub changes: Vec<RowChange>,
}

/// Append-only commit log
#[derive(Debug)]
pub struct CommitLog {
    path: PathBuf,
    file: Mutex<File>,
    /// fsync after every append
    sync: bool,
}

impl CommitLog {
    /// Open (or create) a log file for appending
    ///
    /// A torn final record left by a crash is cut off first, so new records
    /// always start on a fresh line.
    pub fn open(path: impl AsRef<Path>, sync: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let scan = scan(&std::fs::read(&path)?, &path)?;
        let mut repaired = false;
        if scan.valid_len < file.metadata()?.len() {
            warn!(path = %path.display(), keep = scan.valid_len, "truncating torn commit log tail");
            file.set_len(scan.valid_len)?;
            repaired = true;
        }
        if !scan.terminated {
            file.write_all(b"\n")?;
            repaired = true;
        }
        if repaired {
            file.sync_data()?;
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
            sync,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record; the commit is durable once this returns
    ///
    /// A failed write is rolled back to the previous end of the log.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        let end = file.metadata()?.len();
        let written = match file.write_all(&line) {
            Ok(()) => file.flush(),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(undo) = file.set_len(end) {
                warn!(path = %self.path.display(), error = %undo, "could not drop partial commit record");
            }
            return Err(e.into());
        }
        if self.sync {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Read all records from a log file (for recovery)
    ///
    /// A malformed final line is a commit that never completed and is
    /// skipped; a malformed line anywhere else is corruption.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(scan(&std::fs::read(path)?, path)?.records)
    }
}

/// Result of parsing a log file
struct Scan {
    records: Vec<LogRecord>,
    /// Byte length of the well-formed prefix
    valid_len: u64,
    /// Whether that prefix ends with a newline (or is empty)
    terminated: bool,
}

fn scan(data: &[u8], path: &Path) -> Result<Scan> {
    let mut scan = Scan {
        records: Vec::new(),
        valid_len: 0,
        terminated: true,
    };
    let lines: Vec<&[u8]> = data.split_inclusive(|b| *b == b'\n').collect();
    let last = lines.len().saturating_sub(1);

    let mut offset = 0u64;
    for (i, chunk) in lines.iter().enumerate() {
        let line = chunk.strip_suffix(b"\n").unwrap_or(chunk);
        let is_blank = line.iter().all(u8::is_ascii_whitespace);
        if !is_blank {
            match serde_json::from_slice::<LogRecord>(line) {
                Ok(record) => scan.records.push(record),
                Err(e) if i == last => {
                    warn!(path = %path.display(), error = %e, "ignoring torn commit log tail");
                    break;
                }
                Err(e) => return Err(Error::Serialization(format!("line {}: {}", i + 1, e))),
            }
        }
        offset += chunk.len() as u64;
        scan.valid_len = offset;
        scan.terminated = chunk.ends_with(b"\n");
    }
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RowKey, Tuple, Value};

    fn record(lsn: u64) -> LogRecord {
        LogRecord {
            lsn,
            txn_id: lsn + 10,
            commit_ts: 1_700_000_000_000,
            changes: vec![RowChange {
                table: "users".into(),
                key: RowKey::single("u1"),
                after: Some(Tuple::new(vec![Value::from("u1")])),
            }],
        }
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.log");

        let log = CommitLog::open(&path, false).unwrap();
        log.append(&record(1)).unwrap();
        log.append(&record(2)).unwrap();

        let records = CommitLog::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].lsn, 2);
        assert_eq!(records[0].changes[0].key, RowKey::single("u1"));
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.log");

        let log = CommitLog::open(&path, false).unwrap();
        log.append(&record(1)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{\"lsn\":2,\"txn")
            .unwrap();

        let records = CommitLog::read_all(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_open_cuts_torn_tail_before_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.log");

        let log = CommitLog::open(&path, false).unwrap();
        log.append(&record(1)).unwrap();
        drop(log);
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{\"lsn\":2,\"txn_id\":9,\"com")
            .unwrap();

        let log = CommitLog::open(&path, false).unwrap();
        log.append(&record(2)).unwrap();
        log.append(&record(3)).unwrap();

        let lsns: Vec<u64> = CommitLog::read_all(&path).unwrap().iter().map(|r| r.lsn).collect();
        assert_eq!(lsns, vec![1, 2, 3]);
    }

    #[test]
    fn test_open_terminates_unfinished_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.log");
        std::fs::write(&path, serde_json::to_vec(&record(1)).unwrap()).unwrap();

        let log = CommitLog::open(&path, false).unwrap();
        log.append(&record(2)).unwrap();

        assert_eq!(CommitLog::read_all(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_middle_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.log");
        let mut data = b"garbage\n".to_vec();
        data.extend(serde_json::to_vec(&record(1)).unwrap());
        data.push(b'\n');
        std::fs::write(&path, data).unwrap();

        assert!(matches!(
            CommitLog::read_all(&path),
            Err(Error::Serialization(_))
        ));
        assert!(CommitLog::open(&path, false).is_err());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CommitLog::read_all(dir.path().join("none.log"))
            .unwrap()
            .is_empty());
    }
}
