//! Database handle
//!
//! Ties the catalog, the committed state and the commit log together.
//! Schema objects are defined here so the catalog and the stored tables
//! never disagree.

use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{Catalog, FullTextIndexDef, IndexDef, ProcedureDef, TableDef, TriggerDef};
use crate::config::{Clock, EngineConfig, SystemClock};
use crate::error::Result;
use crate::executor::{ProcedureRows, QueryResult, ScoredRow};
use crate::query::Select;
use crate::storage::{CommitLog, DatabaseState, Value};
use crate::transaction::{Transaction, TransactionManager};

pub struct Database {
    catalog: Catalog,
    manager: TransactionManager,
    config: EngineConfig,
}

impl Database {
    /// An empty in-memory database with default settings
    pub fn in_memory() -> Self {
        Self {
            catalog: Catalog::new(),
            manager: TransactionManager::new(Arc::new(SystemClock), None),
            config: EngineConfig::default(),
        }
    }

    /// A database over the saved catalog at `config.catalog_file`
    ///
    /// Starts with an empty catalog when no file is configured or none has
    /// been written yet. Fails if the commit log refers to tables the
    /// catalog does not define.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let catalog = match &config.catalog_file {
            Some(path) if path.exists() => Catalog::load_from_disk(path)?,
            _ => Catalog::new(),
        };
        Self::open(config, catalog)
    }

    /// Open a database over an existing catalog
    ///
    /// Storage is created for every table and index the catalog defines,
    /// then the commit log (if configured) is replayed on top.
    pub fn open(config: EngineConfig, catalog: Catalog) -> Result<Self> {
        let commit_log = match &config.commit_log {
            Some(path) => Some(CommitLog::open(path, config.sync_on_commit)?),
            None => None,
        };
        let records = match &config.commit_log {
            Some(path) => CommitLog::read_all(path)?,
            None => Vec::new(),
        };

        let db = Self {
            catalog,
            manager: TransactionManager::new(Arc::new(SystemClock), commit_log),
            config,
        };
        db.manager.alter(|state| {
            for name in db.catalog.list_tables() {
                let def = db.catalog.get_table(&name)?;
                state.add_table(&def.name);
                for index in db.catalog.get_table_indexes(&def.name) {
                    build_index(state, &def, &index)?;
                }
                if let Some(index) = db.catalog.full_text_index(&def.name) {
                    build_full_text(state, &def, &index, db.config.full_text_min_token_len)?;
                }
            }
            Ok(())
        })?;

        if !records.is_empty() {
            let count = db.manager.recover(records)?;
            info!(commits = count, version = db.committed_version(), "database opened");
        }
        db.save_catalog()?;
        Ok(db)
    }

    fn save_catalog(&self) -> Result<()> {
        if let Some(path) = &self.config.catalog_file {
            self.catalog.save_to_disk(path)?;
            debug!(path = %path.display(), "saved catalog");
        }
        Ok(())
    }

    /// Use `clock` for `NOW()` from here on
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.manager.set_clock(clock);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `CREATE TABLE`
    pub fn define_table(&self, def: TableDef) -> Result<Arc<TableDef>> {
        let def = self.catalog.define_table(def)?;
        self.manager.alter(|state| {
            state.add_table(&def.name);
            Ok(())
        })?;
        self.save_catalog()?;
        Ok(def)
    }

    /// `CREATE INDEX name ON table (columns...)`
    pub fn define_index<I, S>(&self, name: &str, table: &str, columns: I) -> Result<Arc<IndexDef>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let index = self.catalog.define_index(name, table, columns)?;
        let def = self.catalog.get_table(table)?;
        self.manager.alter(|state| build_index(state, &def, &index))?;
        self.save_catalog()?;
        Ok(index)
    }

    /// `ALTER TABLE table ADD FULLTEXT name (columns...)`
    pub fn define_full_text_index<I, S>(
        &self,
        name: &str,
        table: &str,
        columns: I,
    ) -> Result<Arc<FullTextIndexDef>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let index = self.catalog.define_full_text_index(name, table, columns)?;
        let def = self.catalog.get_table(table)?;
        let min_len = self.config.full_text_min_token_len;
        self.manager
            .alter(|state| build_full_text(state, &def, &index, min_len))?;
        self.save_catalog()?;
        Ok(index)
    }

    /// `CREATE TRIGGER`
    pub fn define_trigger(&self, def: TriggerDef) -> Result<Arc<TriggerDef>> {
        let def = self.catalog.define_trigger(def)?;
        self.save_catalog()?;
        Ok(def)
    }

    /// `CREATE PROCEDURE`
    pub fn define_procedure(&self, def: ProcedureDef) -> Result<Arc<ProcedureDef>> {
        let def = self.catalog.define_procedure(def)?;
        self.save_catalog()?;
        Ok(def)
    }

    /// `START TRANSACTION`
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::begin(&self.catalog, &self.manager, self.config.full_text_min_token_len)
    }

    /// Number of commits applied so far
    pub fn committed_version(&self) -> u64 {
        self.manager.snapshot().version()
    }

    pub fn active_transactions(&self) -> usize {
        self.manager.active_count()
    }

    /// Run `f` in a transaction, committing on success
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut txn = self.begin();
        let value = f(&mut txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// SELECT against the latest committed state
    pub fn select(&self, query: &Select) -> Result<QueryResult> {
        self.begin().select(query)
    }

    /// Full-text search against the latest committed state
    pub fn search(&self, table: &str, terms: &str) -> Result<Vec<ScoredRow>> {
        self.begin().search(table, terms)
    }

    /// `CALL` against the latest committed state
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<ProcedureRows> {
        self.begin().call(name, args)
    }
}

fn build_index(state: &mut DatabaseState, def: &TableDef, index: &IndexDef) -> Result<()> {
    let columns = def.column_indices(&index.columns)?;
    state.table_mut(&def.name)?.create_index(index.name.clone(), columns);
    Ok(())
}

fn build_full_text(
    state: &mut DatabaseState,
    def: &TableDef,
    index: &FullTextIndexDef,
    min_token_len: usize,
) -> Result<()> {
    let columns = def.column_indices(&index.columns)?;
    state
        .table_mut(&def.name)?
        .create_full_text_index(columns, min_token_len);
    Ok(())
}
