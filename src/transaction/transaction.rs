//! Transaction handle
//!
//! Handles the lifecycle of one transaction (Begin, Commit, Rollback) and
//! the statements run inside it. Writes are staged in the transaction's
//! workspace and logged; nothing is visible to others until commit.

use tracing::{debug, warn};

use super::manager::TransactionManager;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::executor::{
    procedure, query, Applied, Executor, ProcedureRows, QueryResult, ScoredRow, Workspace, WriteOp,
};
use crate::query::{Predicate, Select};
use crate::storage::{RowKey, Tuple, Value};

/// Transaction State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// An open transaction
///
/// Dropping an active transaction rolls it back.
pub struct Transaction<'db> {
    id: u64,
    state: TransactionState,
    catalog: &'db Catalog,
    manager: &'db TransactionManager,
    min_token_len: usize,
    workspace: Workspace,
    /// Statements that succeeded, in order
    statements: Vec<WriteOp>,
    /// First statement failure; the transaction can only roll back
    failure: Option<Error>,
}

fn pairs<I, S, V>(values: I) -> Vec<(String, Value)>
where
    I: IntoIterator<Item = (S, V)>,
    S: Into<String>,
    V: Into<Value>,
{
    values
        .into_iter()
        .map(|(c, v)| (c.into(), v.into()))
        .collect()
}

impl<'db> Transaction<'db> {
    pub(crate) fn begin(
        catalog: &'db Catalog,
        manager: &'db TransactionManager,
        min_token_len: usize,
    ) -> Self {
        let (id, snapshot) = manager.begin();
        Self {
            id,
            state: TransactionState::Active,
            catalog,
            manager,
            min_token_len,
            workspace: Workspace::new(snapshot),
            statements: Vec::new(),
            failure: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Committed version this transaction reads from
    pub fn snapshot_version(&self) -> u64 {
        self.workspace.base().version()
    }

    fn check_usable(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::TransactionNotActive(self.id));
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn execute(&mut self, op: WriteOp) -> Result<Applied> {
        self.check_usable()?;
        let now = self.manager.now();
        let result = Executor::new(self.catalog, &mut self.workspace, now).apply(&op);
        match result {
            Ok(applied) => {
                self.statements.push(op);
                Ok(applied)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Record a failed statement; the transaction can only roll back now
    fn fail(&mut self, err: Error) -> Error {
        debug!(txn = self.id, error = %err, "statement failed");
        self.failure = Some(err.clone());
        err
    }

    /// `INSERT INTO table (cols...) VALUES (...)`; returns the row's key
    pub fn insert<I, S, V>(&mut self, table: &str, values: I) -> Result<RowKey>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        self.check_usable()?;
        let def = self.catalog.get_table(table).map_err(|err| self.fail(err))?;
        let row_id = (!def.has_primary_key()).then(|| self.manager.next_row_id());
        let op = WriteOp::Insert {
            table: def.name.clone(),
            values: pairs(values),
            row_id,
        };
        match self.execute(op)? {
            Applied::Inserted(key) => Ok(key),
            other => Err(Error::Internal(format!("insert returned {:?}", other))),
        }
    }

    /// `UPDATE table SET ... WHERE <key>`; returns the row's key afterwards
    pub fn update<I, S, V>(&mut self, table: &str, key: impl Into<RowKey>, assignments: I) -> Result<RowKey>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        let op = WriteOp::Update {
            table: table.to_string(),
            key: key.into(),
            assignments: pairs(assignments),
        };
        match self.execute(op)? {
            Applied::Updated(key) => Ok(key),
            other => Err(Error::Internal(format!("update returned {:?}", other))),
        }
    }

    /// `DELETE FROM table WHERE <key>`; returns rows removed including cascades
    pub fn delete(&mut self, table: &str, key: impl Into<RowKey>) -> Result<usize> {
        let op = WriteOp::Delete {
            table: table.to_string(),
            key: key.into(),
        };
        match self.execute(op)? {
            Applied::Deleted(removed) => Ok(removed),
            other => Err(Error::Internal(format!("delete returned {:?}", other))),
        }
    }

    /// `UPDATE table SET ... WHERE filter`; returns rows updated
    pub fn update_where<I, S, V>(&mut self, table: &str, filter: &Predicate, assignments: I) -> Result<usize>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        let assignments = pairs(assignments);
        let keys = self.matching_keys(table, filter)?;
        for key in &keys {
            self.update(table, key.clone(), assignments.clone())?;
        }
        Ok(keys.len())
    }

    /// `DELETE FROM table WHERE filter`; returns rows removed including cascades
    pub fn delete_where(&mut self, table: &str, filter: &Predicate) -> Result<usize> {
        let keys = self.matching_keys(table, filter)?;
        let mut removed = 0;
        for key in keys {
            // an earlier cascade may already have taken it
            if self.workspace.contains(table, &key) {
                removed += self.delete(table, key)?;
            }
        }
        Ok(removed)
    }

    fn matching_keys(&mut self, table: &str, filter: &Predicate) -> Result<Vec<RowKey>> {
        self.check_usable()?;
        let now = self.manager.now();
        let keys = Executor::new(self.catalog, &mut self.workspace, now)
            .matching_keys(table, Some(filter));
        keys.map_err(|err| self.fail(err))
    }

    /// Point lookup by key
    pub fn get(&self, table: &str, key: impl Into<RowKey>) -> Result<Option<Tuple>> {
        self.check_usable()?;
        let def = self.catalog.get_table(table)?;
        Ok(self.workspace.get(&def.name, &key.into()).cloned())
    }

    /// Lazy scan of the rows this transaction sees
    pub fn scan<'a>(&'a self, table: &str) -> Result<impl Iterator<Item = &'a Tuple> + 'a> {
        self.check_usable()?;
        let def = self.catalog.get_table(table)?;
        Ok(self.workspace.scan(&def.name).map(|(_, tuple)| tuple))
    }

    /// Run a SELECT against this transaction's view
    pub fn select(&self, query: &Select) -> Result<QueryResult> {
        self.check_usable()?;
        query::select(self.catalog, &self.workspace, self.min_token_len, query)
    }

    /// Full-text search, best match first
    pub fn search(&self, table: &str, terms: &str) -> Result<Vec<ScoredRow>> {
        self.check_usable()?;
        query::search(self.catalog, &self.workspace, self.min_token_len, table, terms)
    }

    /// `CALL name(args...)`
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<ProcedureRows> {
        self.check_usable()?;
        procedure::call(self.catalog, &self.workspace, self.min_token_len, name, args)
    }

    /// Commit; on any error the transaction is rolled back instead
    pub fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::TransactionNotActive(self.id));
        }
        if let Some(err) = self.failure.clone() {
            self.finish(TransactionState::RolledBack);
            warn!(txn = self.id, error = %err, "commit refused after failed statement");
            return Err(err);
        }

        let result = if self.statements.is_empty() {
            Ok(self.snapshot_version())
        } else {
            self.manager
                .commit(self.catalog, self.id, &self.workspace, &self.statements)
        };
        match result {
            Ok(version) => {
                self.finish(TransactionState::Committed);
                debug!(txn = self.id, version, "commit complete");
                Ok(())
            }
            Err(err) => {
                self.finish(TransactionState::RolledBack);
                warn!(txn = self.id, error = %err, "commit failed, rolled back");
                Err(err)
            }
        }
    }

    /// Discard everything this transaction did
    pub fn rollback(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::TransactionNotActive(self.id));
        }
        self.finish(TransactionState::RolledBack);
        debug!(txn = self.id, "transaction rolled back");
        Ok(())
    }

    fn finish(&mut self, state: TransactionState) {
        self.state = state;
        self.workspace = Workspace::new(self.workspace.base().clone());
        self.statements.clear();
        self.manager.end(self.id);
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            self.finish(TransactionState::RolledBack);
            debug!(txn = self.id, "transaction dropped, rolled back");
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("statements", &self.statements.len())
            .finish()
    }
}
