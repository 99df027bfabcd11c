//! System Catalog for inkdb
//!
//! This module manages metadata about tables, constraints, indexes, triggers,
//! and stored procedures. Every `define_*` call validates completely before
//! touching any map, so a failed definition leaves the catalog unchanged.

use super::procedure::ProcedureDef;
use super::schema::{
    FullTextIndexDef, IndexDef, ReferentialAction, TableDef, TriggerAction, TriggerDef,
    TriggerEvent, TriggerTiming,
};
use crate::error::{Error, Result};
use crate::storage::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// An edge of the foreign-key graph, seen from the referenced table
#[derive(Debug, Clone)]
pub struct ChildEdge {
    /// Referencing table
    pub table: Arc<TableDef>,
    /// Position of the foreign key in the referencing table's declaration
    pub fk_index: usize,
}

impl ChildEdge {
    /// The foreign key this edge follows
    pub fn foreign_key(&self) -> &super::schema::ForeignKey {
        &self.table.foreign_keys[self.fk_index]
    }

    pub fn cascades(&self) -> bool {
        self.foreign_key().on_delete == ReferentialAction::Cascade
    }
}

/// System Catalog - manages all database metadata
#[derive(Debug)]
pub struct Catalog {
    /// Table definitions by name, in definition order
    tables: RwLock<IndexMap<String, Arc<TableDef>>>,
    /// Foreign-key adjacency list: parent table -> referencing edges
    referencing: RwLock<HashMap<String, Vec<ChildEdge>>>,
    /// Index definitions by name
    indexes: RwLock<IndexMap<String, Arc<IndexDef>>>,
    /// Full-text index definitions by table name
    full_text: RwLock<HashMap<String, Arc<FullTextIndexDef>>>,
    /// Triggers in declaration order
    triggers: RwLock<Vec<Arc<TriggerDef>>>,
    /// Stored procedures by name
    procedures: RwLock<HashMap<String, Arc<ProcedureDef>>>,
    /// Next table ID
    next_table_id: RwLock<u32>,
    /// Next index ID
    next_index_id: RwLock<u32>,
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(IndexMap::new()),
            referencing: RwLock::new(HashMap::new()),
            indexes: RwLock::new(IndexMap::new()),
            full_text: RwLock::new(HashMap::new()),
            triggers: RwLock::new(Vec::new()),
            procedures: RwLock::new(HashMap::new()),
            next_table_id: RwLock::new(1),
            next_index_id: RwLock::new(1),
        }
    }

    /// `CREATE TABLE`
    pub fn define_table(&self, mut def: TableDef) -> Result<Arc<TableDef>> {
        let mut tables = self.tables.write();

        if tables.contains_key(&def.name) {
            return Err(Error::DuplicateTable(def.name.clone()));
        }
        validate_table(&def, &tables)?;

        let mut next_id = self.next_table_id.write();
        def.id = *next_id;
        *next_id += 1;

        let def = Arc::new(def);
        let mut referencing = self.referencing.write();
        for (fk_index, fk) in def.foreign_keys.iter().enumerate() {
            referencing
                .entry(fk.ref_table.clone())
                .or_default()
                .push(ChildEdge {
                    table: def.clone(),
                    fk_index,
                });
        }
        tables.insert(def.name.clone(), def.clone());

        debug!(table = %def.name, id = def.id, "defined table");
        Ok(def)
    }

    /// Get a table by name
    pub fn get_table(&self, name: &str) -> Result<Arc<TableDef>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Check if a table exists
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// List all table names in definition order
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Foreign keys that reference `table`, in definition order
    pub fn referencing(&self, table: &str) -> Vec<ChildEdge> {
        self.referencing
            .read()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// `CREATE INDEX name ON table (columns)`
    pub fn define_index(
        &self,
        name: &str,
        table_name: &str,
        columns: Vec<String>,
    ) -> Result<Arc<IndexDef>> {
        let table = self.get_table(table_name)?;
        if columns.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "index '{}' has no columns",
                name
            )));
        }
        table.column_indices(&columns)?;

        if self.full_text_name_taken(name) {
            return Err(Error::DuplicateIndex(name.to_string()));
        }
        let mut indexes = self.indexes.write();
        if indexes.contains_key(name) {
            return Err(Error::DuplicateIndex(name.to_string()));
        }

        let mut next_id = self.next_index_id.write();
        let index_def = Arc::new(IndexDef {
            name: name.to_string(),
            table_name: table_name.to_string(),
            columns,
            id: *next_id,
        });
        *next_id += 1;

        indexes.insert(name.to_string(), index_def.clone());
        debug!(index = %name, table = %table_name, "defined index");
        Ok(index_def)
    }

    /// Get an index by name
    pub fn get_index(&self, name: &str) -> Option<Arc<IndexDef>> {
        self.indexes.read().get(name).cloned()
    }

    /// Get all indexes for a table
    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexDef>> {
        self.indexes
            .read()
            .values()
            .filter(|idx| idx.table_name == table_name)
            .cloned()
            .collect()
    }

    /// `ALTER TABLE table ADD FULLTEXT name (columns)`
    pub fn define_full_text_index(
        &self,
        name: &str,
        table_name: &str,
        columns: Vec<String>,
    ) -> Result<Arc<FullTextIndexDef>> {
        let table = self.get_table(table_name)?;
        if columns.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "full-text index '{}' has no columns",
                name
            )));
        }
        for idx in table.column_indices(&columns)? {
            let column = &table.schema().columns()[idx];
            if !column.data_type.is_string() {
                return Err(Error::InvalidDefinition(format!(
                    "full-text column '{}' must be a string type, not {}",
                    column.name, column.data_type
                )));
            }
        }

        if self.indexes.read().contains_key(name) {
            return Err(Error::DuplicateIndex(name.to_string()));
        }
        let mut full_text = self.full_text.write();
        if full_text.contains_key(table_name) {
            return Err(Error::InvalidDefinition(format!(
                "table '{}' already has a full-text index",
                table_name
            )));
        }
        if full_text.values().any(|f| f.name == name) {
            return Err(Error::DuplicateIndex(name.to_string()));
        }

        let def = Arc::new(FullTextIndexDef {
            name: name.to_string(),
            table_name: table_name.to_string(),
            columns,
        });
        full_text.insert(table_name.to_string(), def.clone());
        debug!(index = %name, table = %table_name, "defined full-text index");
        Ok(def)
    }

    /// The table's full-text index, if any
    pub fn full_text_index(&self, table_name: &str) -> Option<Arc<FullTextIndexDef>> {
        self.full_text.read().get(table_name).cloned()
    }

    fn full_text_name_taken(&self, name: &str) -> bool {
        self.full_text.read().values().any(|f| f.name == name)
    }

    /// `CREATE TRIGGER`
    pub fn define_trigger(&self, def: TriggerDef) -> Result<Arc<TriggerDef>> {
        let table = self.get_table(&def.table_name)?;
        let column = table
            .get_column(&def.column)
            .ok_or_else(|| Error::UnknownColumn {
                column: def.column.clone(),
                table: def.table_name.clone(),
            })?;
        match &def.action {
            TriggerAction::Now => {
                if column.data_type != super::DataType::Timestamp {
                    return Err(Error::InvalidDefinition(format!(
                        "trigger '{}' assigns NOW() to non-timestamp column '{}'",
                        def.name, def.column
                    )));
                }
            }
            TriggerAction::Literal(value) => column.data_type.check(&column.name, value)?,
        }

        let mut triggers = self.triggers.write();
        if triggers.iter().any(|t| t.name == def.name) {
            return Err(Error::DuplicateTrigger(def.name.clone()));
        }
        let def = Arc::new(def);
        triggers.push(def.clone());
        debug!(trigger = %def.name, table = %def.table_name, "defined trigger");
        Ok(def)
    }

    /// Triggers for one (table, timing, event), in declaration order
    pub fn triggers_for(
        &self,
        table_name: &str,
        timing: TriggerTiming,
        event: TriggerEvent,
    ) -> Vec<Arc<TriggerDef>> {
        self.triggers
            .read()
            .iter()
            .filter(|t| t.table_name == table_name && t.timing == timing && t.event == event)
            .cloned()
            .collect()
    }

    /// `CREATE PROCEDURE`
    pub fn define_procedure(&self, def: ProcedureDef) -> Result<Arc<ProcedureDef>> {
        let table = self.get_table(&def.body.table)?;

        let declared: HashSet<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
        if declared.len() != def.params.len() {
            return Err(Error::InvalidDefinition(format!(
                "procedure '{}' declares a parameter twice",
                def.name
            )));
        }
        if let Some(param) = def.body.params().into_iter().find(|p| !declared.contains(p)) {
            return Err(Error::InvalidDefinition(format!(
                "procedure '{}' uses undeclared parameter '{}'",
                def.name, param
            )));
        }
        let mut referenced: Vec<String> = def
            .body
            .filter
            .as_ref()
            .map(|f| f.columns().into_iter().map(String::from).collect())
            .unwrap_or_default();
        referenced.extend(def.body.order_by.iter().map(|o| o.column.clone()));
        referenced.extend(def.body.columns.iter().flatten().cloned());
        table.column_indices(&referenced)?;
        if def.body.matching.is_some() && self.full_text_index(&table.name).is_none() {
            return Err(Error::InvalidDefinition(format!(
                "procedure '{}' matches against '{}' which has no full-text index",
                def.name, table.name
            )));
        }

        let mut procedures = self.procedures.write();
        if procedures.contains_key(&def.name) {
            return Err(Error::DuplicateProcedure(def.name.clone()));
        }
        let def = Arc::new(def);
        procedures.insert(def.name.clone(), def.clone());
        debug!(procedure = %def.name, "defined procedure");
        Ok(def)
    }

    /// Get a procedure by name
    pub fn get_procedure(&self, name: &str) -> Result<Arc<ProcedureDef>> {
        self.procedures
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProcedure(name.to_string()))
    }

    /// Get table schema info as a formatted string (for .schema command)
    pub fn get_table_info(&self, name: &str) -> Result<String> {
        let table = self.get_table(name)?;
        let mut info = format!("Table: {}\n", table.name());
        info.push_str("Columns:\n");

        for col in table.schema().columns() {
            let mut flags = Vec::new();
            if table.primary_key.contains(&col.name) {
                flags.push("PRIMARY KEY".to_string());
            }
            if !col.nullable {
                flags.push("NOT NULL".to_string());
            }
            if let Some(default) = &col.default {
                flags.push(match default {
                    super::DefaultValue::Literal(v) => format!("DEFAULT {}", v),
                    super::DefaultValue::CurrentTimestamp => "DEFAULT CURRENT_TIMESTAMP".into(),
                });
            }

            let flags_str = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };

            info.push_str(&format!("  {} {}{}\n", col.name, col.data_type, flags_str));
        }

        if !table.unique.is_empty() || !table.foreign_keys.is_empty() {
            info.push_str("Constraints:\n");
            for u in &table.unique {
                info.push_str(&format!("  {} UNIQUE ({})\n", u.name, u.columns.join(", ")));
            }
            for fk in &table.foreign_keys {
                info.push_str(&format!(
                    "  {} FOREIGN KEY ({}) REFERENCES {}({}){}\n",
                    fk.name,
                    fk.columns.join(", "),
                    fk.ref_table,
                    fk.ref_columns.join(", "),
                    if fk.on_delete == ReferentialAction::Cascade {
                        " ON DELETE CASCADE"
                    } else {
                        ""
                    }
                ));
            }
        }

        let indexes = self.get_table_indexes(name);
        let full_text = self.full_text_index(name);
        if !indexes.is_empty() || full_text.is_some() {
            info.push_str("Indexes:\n");
            for idx in indexes {
                info.push_str(&format!("  {} ({})\n", idx.name, idx.columns.join(", ")));
            }
            if let Some(ft) = full_text {
                info.push_str(&format!("  {} FULLTEXT ({})\n", ft.name, ft.columns.join(", ")));
            }
        }

        let triggers: Vec<Arc<TriggerDef>> = self
            .triggers
            .read()
            .iter()
            .filter(|t| t.table_name == name)
            .cloned()
            .collect();
        if !triggers.is_empty() {
            info.push_str("Triggers:\n");
            for t in triggers {
                info.push_str(&format!(
                    "  {} {:?} {:?} SET {} = {}\n",
                    t.name,
                    t.timing,
                    t.event,
                    t.column,
                    match &t.action {
                        TriggerAction::Now => "NOW()".to_string(),
                        TriggerAction::Literal(v) => v.to_string(),
                    }
                ));
            }
        }

        Ok(info)
    }

    /// Save catalog to disk
    pub fn save_to_disk(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let data = CatalogData {
            tables: self.tables.read().values().map(|t| (**t).clone()).collect(),
            indexes: self.indexes.read().values().map(|i| (**i).clone()).collect(),
            full_text: self.full_text.read().values().map(|f| (**f).clone()).collect(),
            triggers: self.triggers.read().iter().map(|t| (**t).clone()).collect(),
            procedures: self.procedures.read().values().map(|p| (**p).clone()).collect(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load catalog from disk, re-validating every definition
    pub fn load_from_disk(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let data: CatalogData = serde_json::from_str(&json)?;

        let catalog = Self::new();
        for table in data.tables {
            catalog.define_table(table)?;
        }
        for index in data.indexes {
            catalog.define_index(&index.name, &index.table_name, index.columns)?;
        }
        for ft in data.full_text {
            catalog.define_full_text_index(&ft.name, &ft.table_name, ft.columns)?;
        }
        for trigger in data.triggers {
            catalog.define_trigger(trigger)?;
        }
        for procedure in data.procedures {
            catalog.define_procedure(procedure)?;
        }
        Ok(catalog)
    }
}

/// Check a new table against itself and the already-defined tables
fn validate_table(def: &TableDef, tables: &IndexMap<String, Arc<TableDef>>) -> Result<()> {
    let schema = def.schema();
    if schema.column_count() == 0 {
        return Err(Error::InvalidDefinition(format!(
            "table '{}' has no columns",
            def.name
        )));
    }
    if schema.column_names().iter().collect::<HashSet<_>>().len() != schema.column_count() {
        return Err(Error::InvalidDefinition(format!(
            "table '{}' declares a column twice",
            def.name
        )));
    }

    for col in schema.columns() {
        match &col.default {
            Some(super::DefaultValue::Literal(Value::Null)) if !col.nullable => {
                return Err(Error::InvalidDefinition(format!(
                    "column '{}' is NOT NULL but defaults to NULL",
                    col.name
                )));
            }
            Some(super::DefaultValue::Literal(value)) => {
                col.data_type
                    .check(&col.name, value)
                    .map_err(|e| Error::InvalidDefinition(e.to_string()))?;
            }
            Some(super::DefaultValue::CurrentTimestamp)
                if col.data_type != super::DataType::Timestamp =>
            {
                return Err(Error::InvalidDefinition(format!(
                    "column '{}' defaults to CURRENT_TIMESTAMP but is {}",
                    col.name, col.data_type
                )));
            }
            _ => {}
        }
    }

    def.column_indices(&def.primary_key)?;
    for unique in &def.unique {
        if unique.columns.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "unique constraint '{}' has no columns",
                unique.name
            )));
        }
        def.column_indices(&unique.columns)?;
    }

    for fk in &def.foreign_keys {
        if fk.columns.is_empty() || fk.columns.len() != fk.ref_columns.len() {
            return Err(Error::InvalidDefinition(format!(
                "foreign key '{}' column count must match referenced column count",
                fk.name
            )));
        }
        let local = def.column_indices(&fk.columns)?;

        let parent: &TableDef = if fk.ref_table == def.name {
            def
        } else {
            tables
                .get(&fk.ref_table)
                .map(|t| t.as_ref())
                .ok_or_else(|| Error::UnknownReference {
                    table: def.name.clone(),
                    reference: format!("table '{}'", fk.ref_table),
                })?
        };
        let remote = parent
            .column_indices(&fk.ref_columns)
            .map_err(|_| Error::UnknownReference {
                table: def.name.clone(),
                reference: format!("columns {}({})", fk.ref_table, fk.ref_columns.join(", ")),
            })?;
        if !parent.is_candidate_key(&fk.ref_columns) {
            return Err(Error::UnknownReference {
                table: def.name.clone(),
                reference: format!(
                    "key {}({}) (not a primary key or unique constraint)",
                    fk.ref_table,
                    fk.ref_columns.join(", ")
                ),
            });
        }
        for (l, r) in local.into_iter().zip(remote) {
            let (child_col, parent_col) = (&schema.columns()[l], &parent.schema().columns()[r]);
            let compatible = child_col.data_type == parent_col.data_type
                || (child_col.data_type.is_string() && parent_col.data_type.is_string());
            if !compatible {
                return Err(Error::InvalidDefinition(format!(
                    "foreign key '{}' column '{}' ({}) does not match '{}.{}' ({})",
                    fk.name,
                    child_col.name,
                    child_col.data_type,
                    fk.ref_table,
                    parent_col.name,
                    parent_col.data_type
                )));
            }
        }
    }
    Ok(())
}

/// Serializable proxy for Catalog
#[derive(serde::Serialize, serde::Deserialize)]
struct CatalogData {
    tables: Vec<TableDef>,
    indexes: Vec<IndexDef>,
    full_text: Vec<FullTextIndexDef>,
    triggers: Vec<TriggerDef>,
    procedures: Vec<ProcedureDef>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, ForeignKey, Parameter, TableBuilder};
    use crate::query::{Predicate, Select};

    fn users() -> TableDef {
        TableBuilder::new("users")
            .column(Column::new("id", DataType::Varchar(36)))
            .column(Column::new("email", DataType::Varchar(100)).not_null())
            .primary_key(["id"])
            .unique("uq_users_email", ["email"])
            .build()
    }

    fn posts() -> TableDef {
        TableBuilder::new("posts")
            .column(Column::new("id", DataType::Integer))
            .column(Column::new("user_id", DataType::Varchar(36)).not_null())
            .column(Column::new("body", DataType::Text))
            .column(Column::new("updated_at", DataType::Timestamp).default_current_timestamp())
            .primary_key(["id"])
            .foreign_key(ForeignKey::new("fk_posts_user", "user_id", "users", "id").on_delete_cascade())
            .build()
    }

    #[test]
    fn test_create_and_get_table() {
        let catalog = Catalog::new();
        let table = catalog.define_table(users()).unwrap();

        assert_eq!(table.name(), "users");
        assert_eq!(table.id, 1);
        assert_eq!(catalog.get_table("users").unwrap().schema().column_count(), 2);
    }

    #[test]
    fn test_duplicate_table() {
        let catalog = Catalog::new();
        catalog.define_table(users()).unwrap();
        assert!(matches!(
            catalog.define_table(users()),
            Err(Error::DuplicateTable(_))
        ));
    }

    #[test]
    fn test_unknown_reference_leaves_catalog_unchanged() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.define_table(posts()),
            Err(Error::UnknownReference { .. })
        ));
        assert!(!catalog.table_exists("posts"));
        assert!(catalog.referencing("users").is_empty());
    }

    #[test]
    fn test_reference_must_be_candidate_key() {
        let catalog = Catalog::new();
        catalog.define_table(users()).unwrap();
        let def = TableBuilder::new("profiles")
            .column(Column::new("id", DataType::Integer))
            .column(Column::new("email", DataType::Varchar(100)))
            .primary_key(["id"])
            .foreign_key(ForeignKey::new("fk_email", "email", "users", "email"))
            .build();
        assert!(catalog.define_table(def).is_ok());

        let def = TableBuilder::new("bad")
            .column(Column::new("id", DataType::Integer))
            .primary_key(["id"])
            .foreign_key(ForeignKey::new("fk_nope", "id", "users", "nope"))
            .build();
        assert!(matches!(
            catalog.define_table(def),
            Err(Error::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_foreign_key_graph() {
        let catalog = Catalog::new();
        catalog.define_table(users()).unwrap();
        catalog.define_table(posts()).unwrap();

        let edges = catalog.referencing("users");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].table.name(), "posts");
        assert!(edges[0].cascades());
    }

    #[test]
    fn test_attachments_require_table() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.define_index("idx", "ghost", vec!["id".into()]),
            Err(Error::UnknownTable(_))
        ));
        assert!(matches!(
            catalog.define_full_text_index("ft", "ghost", vec!["id".into()]),
            Err(Error::UnknownTable(_))
        ));
        assert!(matches!(
            catalog.define_trigger(TriggerDef::new(
                "t",
                "ghost",
                TriggerTiming::Before,
                TriggerEvent::Update,
                "updated_at",
                TriggerAction::Now
            )),
            Err(Error::UnknownTable(_))
        ));
        assert!(matches!(
            catalog.define_procedure(ProcedureDef::new("p", vec![], Select::from("ghost"))),
            Err(Error::UnknownTable(_))
        ));
    }

    #[test]
    fn test_single_full_text_index_per_table() {
        let catalog = Catalog::new();
        catalog.define_table(users()).unwrap();
        catalog.define_table(posts()).unwrap();
        catalog
            .define_full_text_index("ft_posts", "posts", vec!["body".into()])
            .unwrap();
        assert!(matches!(
            catalog.define_full_text_index("ft_posts_2", "posts", vec!["body".into()]),
            Err(Error::InvalidDefinition(_))
        ));
        assert!(matches!(
            catalog.define_full_text_index("ft_ids", "users", vec!["id".into(), "missing".into()]),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_procedure_undeclared_parameter() {
        let catalog = Catalog::new();
        catalog.define_table(users()).unwrap();
        catalog.define_table(posts()).unwrap();
        let def = ProcedureDef::new(
            "GetUserPosts",
            vec![Parameter::new("userId", DataType::Varchar(36))],
            Select::from("posts").filter(Predicate::eq_param("user_id", "uid")),
        );
        assert!(matches!(
            catalog.define_procedure(def),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let catalog = Catalog::new();
        catalog.define_table(users()).unwrap();
        catalog.define_table(posts()).unwrap();
        catalog
            .define_index("idx_posts_user", "posts", vec!["user_id".into()])
            .unwrap();
        catalog.save_to_disk(&path).unwrap();

        let loaded = Catalog::load_from_disk(&path).unwrap();
        assert_eq!(loaded.list_tables(), vec!["users", "posts"]);
        assert_eq!(loaded.referencing("users").len(), 1);
        assert!(loaded.get_index("idx_posts_user").is_some());
    }
}
