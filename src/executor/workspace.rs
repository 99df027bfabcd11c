//! Transaction workspace
//!
//! A transaction's view of the database: the committed snapshot taken at
//! `begin()` with the transaction's own staged writes laid over it. Nothing
//! here is visible to other transactions.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::storage::{DatabaseState, RowChange, RowKey, Tuple, Value};

#[derive(Debug, Clone)]
pub struct Workspace {
    base: Arc<DatabaseState>,
    /// table -> key -> staged image (`None` = deleted), in first-touch order
    staged: IndexMap<String, IndexMap<RowKey, Option<Tuple>>>,
}

impl Workspace {
    pub fn new(base: Arc<DatabaseState>) -> Self {
        Self {
            base,
            staged: IndexMap::new(),
        }
    }

    /// The snapshot this workspace overlays
    pub fn base(&self) -> &Arc<DatabaseState> {
        &self.base
    }

    /// Visible version of a row
    pub fn get(&self, table: &str, key: &RowKey) -> Option<&Tuple> {
        match self.staged.get(table).and_then(|rows| rows.get(key)) {
            Some(staged) => staged.as_ref(),
            None => self.base.table(table).and_then(|t| t.get(key)),
        }
    }

    pub fn contains(&self, table: &str, key: &RowKey) -> bool {
        self.get(table, key).is_some()
    }

    /// Whether this workspace has written `key`
    pub fn is_staged(&self, table: &str, key: &RowKey) -> bool {
        self.staged
            .get(table)
            .is_some_and(|rows| rows.contains_key(key))
    }

    /// Stage a new version of a row
    pub fn put(&mut self, table: &str, key: RowKey, tuple: Tuple) {
        self.staged
            .entry(table.to_string())
            .or_default()
            .insert(key, Some(tuple));
    }

    /// Stage a delete
    pub fn remove(&mut self, table: &str, key: &RowKey) {
        self.staged
            .entry(table.to_string())
            .or_default()
            .insert(key.clone(), None);
    }

    /// Lazy scan of the visible rows; each call starts over
    ///
    /// Snapshot rows come first in storage order, then rows staged here.
    pub fn scan<'a>(&'a self, table: &str) -> impl Iterator<Item = (&'a RowKey, &'a Tuple)> + 'a {
        let staged = self.staged.get(table);
        let committed = self
            .base
            .table(table)
            .into_iter()
            .flat_map(|t| t.scan())
            .filter(move |(key, _)| staged.map_or(true, |rows| !rows.contains_key(*key)));
        let own = staged
            .into_iter()
            .flat_map(|rows| rows.iter())
            .filter_map(|(key, tuple)| tuple.as_ref().map(|t| (key, t)));
        committed.chain(own)
    }

    /// Rows staged for `table`, including deletes
    pub fn staged_rows<'a>(
        &'a self,
        table: &str,
    ) -> impl Iterator<Item = (&'a RowKey, Option<&'a Tuple>)> + 'a {
        self.staged
            .get(table)
            .into_iter()
            .flat_map(|rows| rows.iter().map(|(k, t)| (k, t.as_ref())))
    }

    /// Number of visible rows
    pub fn row_count(&self, table: &str) -> usize {
        self.scan(table).count()
    }

    /// Keys of visible rows whose `columns` equal `values`
    ///
    /// Uses a committed secondary index over exactly those columns when one
    /// exists, otherwise scans.
    pub fn lookup_eq(&self, table: &str, columns: &[usize], values: &[Value]) -> Vec<RowKey> {
        let matches = |tuple: &Tuple| tuple.project(columns).values() == values;

        let index = self.base.table(table).and_then(|t| t.index_on(columns));
        match index {
            Some(index) => {
                let mut keys: Vec<RowKey> = index
                    .lookup(values)
                    .filter(|key| !self.is_staged(table, key))
                    .cloned()
                    .collect();
                keys.extend(
                    self.staged_rows(table)
                        .filter_map(|(key, tuple)| tuple.filter(|t| matches(t)).map(|_| key.clone())),
                );
                keys
            }
            None => self
                .scan(table)
                .filter(|(_, tuple)| matches(tuple))
                .map(|(key, _)| key.clone())
                .collect(),
        }
    }

    /// Every (table, key) this workspace has written
    pub fn touched(&self) -> impl Iterator<Item = (&str, &RowKey)> {
        self.staged
            .iter()
            .flat_map(|(table, rows)| rows.keys().map(move |key| (table.as_str(), key)))
    }

    /// Net row changes relative to the base snapshot
    ///
    /// Rows inserted and deleted again within the workspace cancel out.
    pub fn changes(&self) -> Vec<RowChange> {
        self.staged
            .iter()
            .flat_map(|(table, rows)| {
                rows.iter().filter_map(move |(key, after)| {
                    let existed = self.base.table(table).is_some_and(|t| t.contains_key(key));
                    if after.is_none() && !existed {
                        return None;
                    }
                    Some(RowChange {
                        table: table.clone(),
                        key: key.clone(),
                        after: after.clone(),
                    })
                })
            })
            .collect()
    }
}
