//! Committed database state
//!
//! The committed state is immutable once published; transactions hold an
//! `Arc` to the version current at `begin()`. Committing builds the next
//! version, copying only the tables it touches.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::table::TableData;
use super::tuple::{RowKey, Tuple};
use crate::error::{Error, Result};

/// Net effect of a transaction on one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub table: String,
    pub key: RowKey,
    /// New row image, `None` for a delete
    pub after: Option<Tuple>,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseState {
    /// Number of commits applied
    version: u64,
    tables: HashMap<String, Arc<TableData>>,
}

impl DatabaseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn table(&self, name: &str) -> Option<&TableData> {
        self.tables.get(name).map(|t| t.as_ref())
    }

    /// Copy-on-write access to a table
    pub fn table_mut(&mut self, name: &str) -> Result<&mut TableData> {
        self.tables
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Register an empty table; existing tables are left as they are
    pub fn add_table(&mut self, name: &str) {
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(TableData::new()));
    }

    /// Apply a committed change set and advance the version
    pub fn apply(&mut self, changes: &[RowChange]) -> Result<()> {
        for change in changes {
            self.table_mut(&change.table)?
                .apply(&change.key, change.after.clone());
        }
        self.version += 1;
        Ok(())
    }
}
