//! Transaction Manager
//!
//! Owns the committed state and is the only place it changes. Transactions
//! read from the snapshot published when they began; commit is serialized
//! by a single lock held while validating, logging and publishing.

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::Clock;
use crate::error::{Error, Result};
use crate::executor::{Executor, Workspace, WriteOp};
use crate::storage::{CommitLog, DatabaseState, LogRecord, RowKey, Value};

pub struct TransactionManager {
    /// Last committed state
    committed: RwLock<Arc<DatabaseState>>,
    /// Held for the whole of a commit
    commit_lock: Mutex<()>,
    /// Next Transaction ID
    next_trans_id: AtomicU64,
    /// Next hidden row id for tables without a primary key
    next_row_id: AtomicU64,
    /// Active Transactions
    active: Mutex<HashSet<u64>>,
    commit_log: Option<CommitLog>,
    clock: Arc<dyn Clock>,
}

impl TransactionManager {
    pub fn new(clock: Arc<dyn Clock>, commit_log: Option<CommitLog>) -> Self {
        Self {
            committed: RwLock::new(Arc::new(DatabaseState::new())),
            commit_lock: Mutex::new(()),
            next_trans_id: AtomicU64::new(1),
            next_row_id: AtomicU64::new(1),
            active: Mutex::new(HashSet::new()),
            commit_log,
            clock,
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    /// The current committed state
    pub fn snapshot(&self) -> Arc<DatabaseState> {
        self.committed.read().clone()
    }

    /// Start a transaction: allocate an id and capture the snapshot
    pub fn begin(&self) -> (u64, Arc<DatabaseState>) {
        let id = self.next_trans_id.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.snapshot();
        self.active.lock().insert(id);
        debug!(txn = id, version = snapshot.version(), "transaction started");
        (id, snapshot)
    }

    /// Forget a finished transaction
    pub fn end(&self, id: u64) {
        self.active.lock().remove(&id);
    }

    pub fn is_active(&self, id: u64) -> bool {
        self.active.lock().contains(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Allocate a hidden row id; ids are never reused
    pub fn next_row_id(&self) -> RowKey {
        let id = self.next_row_id.fetch_add(1, Ordering::SeqCst);
        RowKey::single(Value::Integer(id as i64))
    }

    /// Change the structure of committed state (new tables, new indexes)
    ///
    /// Open snapshots are unaffected; the version does not move.
    pub fn alter<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut DatabaseState) -> Result<()>,
    {
        let _guard = self.commit_lock.lock();
        let mut next = (*self.snapshot()).clone();
        f(&mut next)?;
        *self.committed.write() = Arc::new(next);
        Ok(())
    }

    /// Commit a transaction's statement log
    ///
    /// First committer wins: if any row this transaction wrote has changed
    /// since its snapshot, the commit fails with `WriteConflict`. Otherwise
    /// the log is re-run on the latest state at commit time, the result is
    /// made durable and then published. Returns the new committed version.
    pub fn commit(
        &self,
        catalog: &Catalog,
        id: u64,
        workspace: &Workspace,
        statements: &[WriteOp],
    ) -> Result<u64> {
        let _guard = self.commit_lock.lock();
        let latest = self.snapshot();
        let snapshot = workspace.base();

        if latest.version() != snapshot.version() {
            for (table, key) in workspace.touched() {
                let seen = snapshot.table(table).and_then(|t| t.get(key));
                let current = latest.table(table).and_then(|t| t.get(key));
                if seen != current {
                    warn!(txn = id, table, key = %key, "write conflict");
                    return Err(Error::WriteConflict {
                        table: table.to_string(),
                        key: key.to_string(),
                    });
                }
            }
        }

        let commit_ts = self.now();
        let mut replay = Workspace::new(latest.clone());
        {
            let mut executor = Executor::new(catalog, &mut replay, commit_ts);
            for statement in statements {
                executor.apply(statement)?;
            }
        }
        let changes = replay.changes();
        if changes.is_empty() {
            debug!(txn = id, "committed read-only transaction");
            return Ok(latest.version());
        }

        let mut next = (*latest).clone();
        next.apply(&changes)?;
        if let Some(log) = &self.commit_log {
            log.append(&LogRecord {
                lsn: next.version(),
                txn_id: id,
                commit_ts,
                changes,
            })?;
        }
        let version = next.version();
        *self.committed.write() = Arc::new(next);
        debug!(txn = id, version, "transaction committed");
        Ok(version)
    }

    /// Rebuild committed state from commit log records
    pub fn recover(&self, records: Vec<LogRecord>) -> Result<usize> {
        let _guard = self.commit_lock.lock();
        let mut next = (*self.snapshot()).clone();
        let mut max_txn = 0;
        let count = records.len();
        for record in records {
            for change in &record.changes {
                if let [Value::Integer(id)] = change.key.values() {
                    if let Ok(id) = u64::try_from(*id) {
                        self.next_row_id
                            .fetch_max(id.saturating_add(1), Ordering::SeqCst);
                    }
                }
            }
            next.apply(&record.changes)?;
            max_txn = max_txn.max(record.txn_id);
        }
        self.next_trans_id.fetch_max(max_txn + 1, Ordering::SeqCst);
        *self.committed.write() = Arc::new(next);
        info!(records = count, "recovered from commit log");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, TableBuilder};
    use crate::config::ManualClock;

    fn setup() -> (Catalog, TransactionManager) {
        let catalog = Catalog::new();
        catalog
            .define_table(
                TableBuilder::new("tags")
                    .column(Column::new("id", DataType::Integer))
                    .column(Column::new("name", DataType::Varchar(20)))
                    .primary_key(["id"])
                    .build(),
            )
            .unwrap();
        let manager = TransactionManager::new(Arc::new(ManualClock::new(7)), None);
        manager
            .alter(|state| {
                state.add_table("tags");
                Ok(())
            })
            .unwrap();
        (catalog, manager)
    }

    fn insert(id: i64) -> WriteOp {
        WriteOp::Insert {
            table: "tags".into(),
            values: vec![
                ("id".into(), Value::Integer(id)),
                ("name".into(), Value::from("t")),
            ],
            row_id: None,
        }
    }

    fn stage(catalog: &Catalog, snapshot: Arc<DatabaseState>, ops: &[WriteOp]) -> Workspace {
        let mut ws = Workspace::new(snapshot);
        let mut exec = Executor::new(catalog, &mut ws, 0);
        for op in ops {
            exec.apply(op).unwrap();
        }
        ws
    }

    #[test]
    fn test_begin_commit() {
        let (catalog, manager) = setup();
        let (id, snapshot) = manager.begin();
        assert!(manager.is_active(id));

        let ops = vec![insert(1)];
        let ws = stage(&catalog, snapshot, &ops);
        assert_eq!(manager.commit(&catalog, id, &ws, &ops).unwrap(), 1);
        manager.end(id);

        assert!(!manager.is_active(id));
        assert_eq!(manager.snapshot().table("tags").unwrap().len(), 1);
    }

    #[test]
    fn test_first_committer_wins() {
        let (catalog, manager) = setup();
        let (a, snap_a) = manager.begin();
        let (b, snap_b) = manager.begin();
        let ops = vec![insert(1)];
        let ws_a = stage(&catalog, snap_a, &ops);
        let ws_b = stage(&catalog, snap_b, &ops);

        manager.commit(&catalog, a, &ws_a, &ops).unwrap();
        assert!(matches!(
            manager.commit(&catalog, b, &ws_b, &ops),
            Err(Error::WriteConflict { .. })
        ));
        assert_eq!(manager.snapshot().version(), 1);
    }

    #[test]
    fn test_disjoint_writers_both_commit() {
        let (catalog, manager) = setup();
        let (a, snap_a) = manager.begin();
        let (b, snap_b) = manager.begin();
        let ops_a = vec![insert(1)];
        let ops_b = vec![insert(2)];
        let ws_a = stage(&catalog, snap_a, &ops_a);
        let ws_b = stage(&catalog, snap_b, &ops_b);

        manager.commit(&catalog, a, &ws_a, &ops_a).unwrap();
        manager.commit(&catalog, b, &ws_b, &ops_b).unwrap();
        assert_eq!(manager.snapshot().table("tags").unwrap().len(), 2);
    }

    #[test]
    fn test_row_ids_are_unique() {
        let (_, manager) = setup();
        assert_ne!(manager.next_row_id(), manager.next_row_id());
    }
}
