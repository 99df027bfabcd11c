//! Statement executor for inkdb
//!
//! Runs one write statement against a workspace: builds the row image, fires
//! triggers, enforces constraints and cascades deletes. A statement either
//! completes or returns an error; callers discard the workspace on error.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::workspace::Workspace;
use super::{cascade, constraints, trigger};
use crate::catalog::{Catalog, TableDef, TriggerEvent, TriggerTiming};
use crate::error::{Error, Result};
use crate::query::Predicate;
use crate::storage::{RowKey, Tuple, Value};

/// A logged write statement
///
/// Transactions record the statements they ran so commit can re-run them
/// on top of the latest committed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    Insert {
        table: String,
        values: Vec<(String, Value)>,
        /// Hidden row id for tables without a primary key
        row_id: Option<RowKey>,
    },
    Update {
        table: String,
        key: RowKey,
        assignments: Vec<(String, Value)>,
    },
    Delete {
        table: String,
        key: RowKey,
    },
}

/// Outcome of one write statement
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Inserted(RowKey),
    Updated(RowKey),
    /// Rows removed, cascades included
    Deleted(usize),
}

/// Execution Engine
pub struct Executor<'a> {
    catalog: &'a Catalog,
    workspace: &'a mut Workspace,
    /// Statement time for defaults and `NOW()` triggers
    now: i64,
}

impl<'a> Executor<'a> {
    pub fn new(catalog: &'a Catalog, workspace: &'a mut Workspace, now: i64) -> Self {
        Self {
            catalog,
            workspace,
            now,
        }
    }

    /// Run a logged statement
    pub fn apply(&mut self, op: &WriteOp) -> Result<Applied> {
        match op {
            WriteOp::Insert {
                table,
                values,
                row_id,
            } => self
                .insert(table, values, row_id.as_ref())
                .map(Applied::Inserted),
            WriteOp::Update {
                table,
                key,
                assignments,
            } => self.update(table, key, assignments).map(Applied::Updated),
            WriteOp::Delete { table, key } => self.delete(table, key).map(Applied::Deleted),
        }
    }

    /// INSERT one row
    ///
    /// Unlisted columns take their default, or NULL.
    pub fn insert(
        &mut self,
        table: &str,
        values: &[(String, Value)],
        row_id: Option<&RowKey>,
    ) -> Result<RowKey> {
        let def = self.catalog.get_table(table)?;
        let mut tuple = self.build_row(&def, values)?;
        trigger::fire_before(self.catalog, &def, TriggerEvent::Insert, &mut tuple, self.now)?;

        let key = match def.key_of(&tuple)? {
            Some(key) => key,
            None => row_id.cloned().ok_or_else(|| {
                Error::Internal(format!("insert into '{}' without a row id", def.name))
            })?,
        };
        self.validate(&def, &key, &tuple, None)?;
        self.workspace.put(&def.name, key.clone(), tuple.clone());
        self.fire_after(&def, TriggerEvent::Insert, &key, tuple)?;

        debug!(table = %def.name, key = %key, "inserted row");
        Ok(key)
    }

    /// UPDATE one row by key; returns the row's key afterwards
    pub fn update(
        &mut self,
        table: &str,
        key: &RowKey,
        assignments: &[(String, Value)],
    ) -> Result<RowKey> {
        let def = self.catalog.get_table(table)?;
        let old = self
            .workspace
            .get(&def.name, key)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                table: def.name.clone(),
                key: key.to_string(),
            })?;

        let mut tuple = old.clone();
        for (column, value) in assignments {
            let idx = column_index(&def, column)?;
            tuple.set(idx, value.clone());
        }
        trigger::fire_before(self.catalog, &def, TriggerEvent::Update, &mut tuple, self.now)?;

        let new_key = def.key_of(&tuple)?.unwrap_or_else(|| key.clone());
        self.validate(&def, &new_key, &tuple, Some(key))?;
        constraints::check_references_kept(self.workspace, self.catalog, &def, &old, &tuple)?;

        if new_key != *key {
            self.workspace.remove(&def.name, key);
        }
        self.workspace.put(&def.name, new_key.clone(), tuple.clone());
        self.fire_after(&def, TriggerEvent::Update, &new_key, tuple)?;

        debug!(table = %def.name, key = %new_key, "updated row");
        Ok(new_key)
    }

    /// DELETE one row by key, cascading to referencing rows
    pub fn delete(&mut self, table: &str, key: &RowKey) -> Result<usize> {
        let def = self.catalog.get_table(table)?;
        let old = self
            .workspace
            .get(&def.name, key)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                table: def.name.clone(),
                key: key.to_string(),
            })?;

        // DELETE triggers see the row but have nothing to write back to
        let mut image = old;
        trigger::fire_before(self.catalog, &def, TriggerEvent::Delete, &mut image, self.now)?;
        constraints::check_row(&def, &image)?;

        let removed = cascade::delete_row(self.catalog, self.workspace, &def, key)?;

        for after in self
            .catalog
            .triggers_for(&def.name, TriggerTiming::After, TriggerEvent::Delete)
        {
            trigger::apply(&def, &after, &mut image, self.now)?;
            constraints::check_row(&def, &image).map_err(|e| Error::TriggerViolation {
                trigger: after.name.clone(),
                reason: e.to_string(),
            })?;
        }

        debug!(table = %def.name, key = %key, removed, "deleted row");
        Ok(removed)
    }

    /// Keys of the visible rows matching `filter`, in key order
    pub fn matching_keys(&self, table: &str, filter: Option<&Predicate>) -> Result<Vec<RowKey>> {
        let def = self.catalog.get_table(table)?;
        let mut keys = Vec::new();
        for (key, tuple) in self.workspace.scan(&def.name) {
            let matched = match filter {
                Some(filter) => filter.evaluate(&def, tuple)?,
                None => true,
            };
            if matched {
                keys.push(key.clone());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn build_row(&self, def: &TableDef, values: &[(String, Value)]) -> Result<Tuple> {
        let mut slots: Vec<Option<Value>> = vec![None; def.schema.column_count()];
        for (column, value) in values {
            let idx = column_index(def, column)?;
            if slots[idx].is_some() {
                return Err(Error::InvalidDefinition(format!(
                    "column '{}' assigned more than once",
                    column
                )));
            }
            slots[idx] = Some(value.clone());
        }

        Ok(def
            .schema
            .columns()
            .iter()
            .zip(slots)
            .map(|(column, slot)| match slot {
                Some(value) => value,
                None => column
                    .default
                    .as_ref()
                    .map(|d| d.evaluate(self.now))
                    .unwrap_or(Value::Null),
            })
            .collect())
    }

    /// Types, key, unique and foreign-key checks, in that order
    fn validate(
        &self,
        def: &TableDef,
        key: &RowKey,
        tuple: &Tuple,
        replacing: Option<&RowKey>,
    ) -> Result<()> {
        constraints::check_row(def, tuple)?;
        constraints::check_key_free(self.workspace, def, key, replacing)?;
        constraints::check_unique(self.workspace, def, key, tuple, replacing)?;
        constraints::check_foreign_keys(self.workspace, self.catalog, def, tuple)
    }

    /// Run AFTER triggers against the staged row
    ///
    /// Each trigger's assignment must leave a row that still satisfies every
    /// constraint and keeps its key.
    fn fire_after(&mut self, def: &TableDef, event: TriggerEvent, key: &RowKey, mut tuple: Tuple) -> Result<()> {
        for after in self.catalog.triggers_for(&def.name, TriggerTiming::After, event) {
            let before = tuple.clone();
            trigger::apply(def, &after, &mut tuple, self.now)?;
            self.check_after(def, key, &before, &tuple)
                .map_err(|e| Error::TriggerViolation {
                    trigger: after.name.clone(),
                    reason: e.to_string(),
                })?;
            self.workspace.put(&def.name, key.clone(), tuple.clone());
        }
        Ok(())
    }

    fn check_after(&self, def: &TableDef, key: &RowKey, before: &Tuple, after: &Tuple) -> Result<()> {
        if let Some(new_key) = def.key_of(after)? {
            if new_key != *key {
                return Err(Error::Internal(format!(
                    "primary key changed from {} to {}",
                    key, new_key
                )));
            }
        }
        self.validate(def, key, after, Some(key))?;
        constraints::check_references_kept(self.workspace, self.catalog, def, before, after)
    }
}

fn column_index(def: &TableDef, column: &str) -> Result<usize> {
    def.schema
        .get_column_index(column)
        .ok_or_else(|| Error::UnknownColumn {
            column: column.to_string(),
            table: def.name.clone(),
        })
}
