//! Schema definitions for inkdb
//!
//! This module defines table schemas, column metadata, constraints, and the
//! derived objects (indexes, triggers) attached to a table.

use super::types::DataType;
use crate::error::{Error, Result};
use crate::storage::{RowKey, Tuple, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default value rule for a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// A constant
    Literal(Value),
    /// The statement's timestamp (`DEFAULT CURRENT_TIMESTAMP`)
    CurrentTimestamp,
}

impl DefaultValue {
    /// Evaluate the rule at time `now` (milliseconds since epoch)
    pub fn evaluate(&self, now: i64) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::CurrentTimestamp => Value::Timestamp(now),
        }
    }
}

/// Column definition in a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Column position (0-indexed)
    pub position: usize,
    /// Is this column nullable?
    pub nullable: bool,
    /// Default value rule
    pub default: Option<DefaultValue>,
}

impl Column {
    /// Create a new nullable column without a default
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            position: 0,
            nullable: true,
            default: None,
        }
    }

    /// Set nullable flag
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Shorthand for `nullable(false)`
    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    /// Set a literal default value
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Default to the statement timestamp
    pub fn default_current_timestamp(mut self) -> Self {
        self.default = Some(DefaultValue::CurrentTimestamp);
        self
    }
}

/// Table schema - defines the structure of a table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,
    /// Column name to index mapping
    name_to_index: HashMap<String, usize>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema from a list of columns
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let mut schema = Self::new();
        for col in columns {
            schema.add_column(col);
        }
        schema
    }

    /// Add a column to the schema
    pub fn add_column(&mut self, mut column: Column) {
        column.position = self.columns.len();
        self.name_to_index
            .insert(column.name.clone(), column.position);
        self.columns.push(column);
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.name_to_index.get(name).map(|&idx| &self.columns[idx])
    }

    /// Get column index by name
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// What happens to referencing rows when the referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// Refuse the delete while referencing rows exist
    #[default]
    Restrict,
    /// Delete the referencing rows too
    Cascade,
}

/// Foreign key constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name
    pub name: String,
    /// Referencing columns in this table
    pub columns: Vec<String>,
    /// Referenced (parent) table
    pub ref_table: String,
    /// Referenced columns in the parent table
    pub ref_columns: Vec<String>,
    /// Action on parent delete
    pub on_delete: ReferentialAction,
}

impl ForeignKey {
    /// Create a single-column foreign key with RESTRICT semantics
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: vec![column.into()],
            ref_table: ref_table.into(),
            ref_columns: vec![ref_column.into()],
            on_delete: ReferentialAction::Restrict,
        }
    }

    /// `ON DELETE CASCADE`
    pub fn on_delete_cascade(mut self) -> Self {
        self.on_delete = ReferentialAction::Cascade;
        self
    }
}

/// Unique constraint over one or more columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Constraint name
    pub name: String,
    /// Constrained columns
    pub columns: Vec<String>,
}

/// Table definition - full table metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name
    pub name: String,
    /// Table schema
    pub schema: Schema,
    /// Table ID (assigned by the catalog)
    pub id: u32,
    /// Primary key columns, empty when the table has none
    pub primary_key: Vec<String>,
    /// Unique constraints in declaration order
    pub unique: Vec<UniqueConstraint>,
    /// Foreign keys in declaration order
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDef {
    /// Create a new table definition without constraints
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            id: 0,
            primary_key: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the table schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.schema.get_column(name)
    }

    /// Does this table declare a primary key?
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Resolve column names to positions
    pub fn column_indices(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.schema
                    .get_column_index(name)
                    .ok_or_else(|| Error::UnknownColumn {
                        column: name.clone(),
                        table: self.name.clone(),
                    })
            })
            .collect()
    }

    /// Extract the primary key of a row, `None` for tables without one
    pub fn key_of(&self, tuple: &Tuple) -> Result<Option<RowKey>> {
        if !self.has_primary_key() {
            return Ok(None);
        }
        let indices = self.column_indices(&self.primary_key)?;
        Ok(Some(RowKey::new(
            tuple.project(&indices).into_values(),
        )))
    }

    /// Is `columns` exactly the primary key or a unique constraint?
    pub fn is_candidate_key(&self, columns: &[String]) -> bool {
        (!self.primary_key.is_empty() && self.primary_key == columns)
            || self.unique.iter().any(|u| u.columns == columns)
    }
}

/// Index definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name
    pub name: String,
    /// Table this index belongs to
    pub table_name: String,
    /// Columns included in the index
    pub columns: Vec<String>,
    /// Index ID
    pub id: u32,
}

/// Full-text index definition (at most one per table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullTextIndexDef {
    /// Index name
    pub name: String,
    /// Table this index belongs to
    pub table_name: String,
    /// Indexed text columns
    pub columns: Vec<String>,
}

/// When a trigger fires relative to its row mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerTiming {
    Before,
    After,
}

/// Row event a trigger reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

/// Value a trigger assigns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerAction {
    /// `SET col = NOW()`
    Now,
    /// `SET col = <literal>`
    Literal(Value),
}

/// Row-level trigger: `CREATE TRIGGER name timing event ON table FOR EACH ROW SET column = action`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDef {
    pub name: String,
    pub table_name: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub column: String,
    pub action: TriggerAction,
}

impl TriggerDef {
    /// Create a trigger definition
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        timing: TriggerTiming,
        event: TriggerEvent,
        column: impl Into<String>,
        action: TriggerAction,
    ) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            timing,
            event,
            column: column.into(),
            action,
        }
    }
}

/// Builder for creating table definitions with a fluent API
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    unique: Vec<UniqueConstraint>,
    foreign_keys: Vec<ForeignKey>,
}

impl TableBuilder {
    /// Start building a new table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Add a column
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare the primary key
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a named unique constraint
    pub fn unique<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique.push(UniqueConstraint {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add a foreign key
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Finish the definition; validation happens in the catalog
    pub fn build(self) -> TableDef {
        let primary_key = self.primary_key;
        let columns = self
            .columns
            .into_iter()
            .map(|c| {
                if primary_key.contains(&c.name) {
                    c.not_null()
                } else {
                    c
                }
            })
            .collect();
        TableDef {
            name: self.name,
            schema: Schema::from_columns(columns),
            id: 0,
            primary_key,
            unique: self.unique,
            foreign_keys: self.foreign_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let mut schema = Schema::new();
        schema.add_column(Column::new("id", DataType::Integer).not_null());
        schema.add_column(Column::new("name", DataType::Varchar(100)).not_null());
        schema.add_column(Column::new("email", DataType::Varchar(255)));

        assert_eq!(schema.column_count(), 3);
        assert!(schema.has_column("id"));
        assert!(!schema.has_column("unknown"));
        assert_eq!(schema.get_column("email").unwrap().position, 2);
    }

    #[test]
    fn test_builder_forces_primary_key_not_null() {
        let def = TableBuilder::new("post_tags")
            .column(Column::new("post_id", DataType::Varchar(36)))
            .column(Column::new("tag_id", DataType::Integer))
            .primary_key(["post_id", "tag_id"])
            .build();

        assert!(def.schema().columns().iter().all(|c| !c.nullable));
        assert!(def.is_candidate_key(&["post_id".to_string(), "tag_id".to_string()]));
        assert!(!def.is_candidate_key(&["post_id".to_string()]));
    }

    #[test]
    fn test_key_of() {
        let def = TableBuilder::new("users")
            .column(Column::new("id", DataType::Integer))
            .column(Column::new("name", DataType::Text))
            .primary_key(["id"])
            .build();
        let row = Tuple::new(vec![Value::Integer(9), Value::from("ann")]);
        assert_eq!(def.key_of(&row).unwrap(), Some(RowKey::single(9i64)));
    }
}
