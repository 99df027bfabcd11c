//! Constraint enforcement
//!
//! Every check runs against the statement's workspace, so rows staged
//! earlier in the same transaction count.

use crate::catalog::{Catalog, TableDef};
use crate::error::{Error, Result};
use crate::storage::{RowKey, Tuple, Value};

use super::workspace::Workspace;

/// Column types, NOT NULL and lengths
pub fn check_row(def: &TableDef, tuple: &Tuple) -> Result<()> {
    if tuple.len() != def.schema.column_count() {
        return Err(Error::Internal(format!(
            "row for '{}' has {} values, expected {}",
            def.name,
            tuple.len(),
            def.schema.column_count()
        )));
    }
    for (column, value) in def.schema.columns().iter().zip(tuple.values()) {
        if value.is_null() {
            if !column.nullable {
                return Err(Error::NullNotAllowed {
                    table: def.name.clone(),
                    column: column.name.clone(),
                });
            }
            continue;
        }
        column.data_type.check(&column.name, value)?;
    }
    Ok(())
}

/// The key must be free, unless the row is replacing itself
pub fn check_key_free(
    ws: &Workspace,
    def: &TableDef,
    key: &RowKey,
    replacing: Option<&RowKey>,
) -> Result<()> {
    if replacing != Some(key) && ws.contains(&def.name, key) {
        return Err(Error::DuplicateKey {
            table: def.name.clone(),
            key: key.to_string(),
        });
    }
    Ok(())
}

/// UNIQUE constraints in declaration order
///
/// Tuples with a NULL in any constrained column never conflict.
pub fn check_unique(
    ws: &Workspace,
    def: &TableDef,
    key: &RowKey,
    tuple: &Tuple,
    replacing: Option<&RowKey>,
) -> Result<()> {
    for constraint in &def.unique {
        let columns = def.column_indices(&constraint.columns)?;
        let values = tuple.project(&columns).into_values();
        if values.iter().any(Value::is_null) {
            continue;
        }
        let clash = ws
            .lookup_eq(&def.name, &columns, &values)
            .into_iter()
            .any(|other| &other != key && Some(&other) != replacing);
        if clash {
            return Err(Error::UniqueViolation {
                table: def.name.clone(),
                constraint: constraint.name.clone(),
            });
        }
    }
    Ok(())
}

/// Every non-NULL foreign key must name a visible parent row
pub fn check_foreign_keys(
    ws: &Workspace,
    catalog: &Catalog,
    def: &TableDef,
    tuple: &Tuple,
) -> Result<()> {
    for fk in &def.foreign_keys {
        let values = tuple.project(&def.column_indices(&fk.columns)?).into_values();
        if values.iter().any(Value::is_null) {
            continue;
        }
        let parent = catalog.get_table(&fk.ref_table)?;
        let found = if fk.ref_columns == parent.primary_key {
            ws.contains(&parent.name, &RowKey::new(values.clone()))
        } else {
            let columns = parent.column_indices(&fk.ref_columns)?;
            !ws.lookup_eq(&parent.name, &columns, &values).is_empty()
        };
        if !found {
            return Err(Error::ForeignKeyViolation {
                table: def.name.clone(),
                detail: format!(
                    "'{}' value {} has no matching row in '{}'",
                    fk.name,
                    RowKey::new(values),
                    fk.ref_table
                ),
            });
        }
    }
    Ok(())
}

/// Changing referenced values is refused while children still point at them
pub fn check_references_kept(
    ws: &Workspace,
    catalog: &Catalog,
    def: &TableDef,
    old: &Tuple,
    new: &Tuple,
) -> Result<()> {
    for edge in catalog.referencing(&def.name) {
        let fk = edge.foreign_key();
        let columns = def.column_indices(&fk.ref_columns)?;
        let before = old.project(&columns).into_values();
        if before == new.project(&columns).into_values() || before.iter().any(Value::is_null) {
            continue;
        }
        let child_columns = edge.table.column_indices(&fk.columns)?;
        if !ws.lookup_eq(&edge.table.name, &child_columns, &before).is_empty() {
            return Err(Error::ForeignKeyViolation {
                table: edge.table.name.clone(),
                detail: format!(
                    "'{}' still references {} in '{}'",
                    fk.name,
                    RowKey::new(before),
                    def.name
                ),
            });
        }
    }
    Ok(())
}
