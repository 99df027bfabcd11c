//! Table storage for inkdb
//!
//! A table's committed rows keyed by primary key, together with the derived
//! indexes that must stay consistent with them. Every row mutation goes
//! through this type so the indexes are maintained in one place.

use indexmap::IndexMap;
use std::collections::HashMap;

use super::tuple::{RowKey, Tuple};
use crate::index::{FullTextIndex, SecondaryIndex};

#[derive(Debug, Clone, Default)]
pub struct TableData {
    /// Rows by key, in insertion order
    rows: IndexMap<RowKey, Tuple>,
    /// Secondary indexes by name
    indexes: HashMap<String, SecondaryIndex>,
    /// Full-text index, if the table has one
    full_text: Option<FullTextIndex>,
}

impl TableData {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Point lookup by key
    pub fn get(&self, key: &RowKey) -> Option<&Tuple> {
        self.rows.get(key)
    }

    pub fn contains_key(&self, key: &RowKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lazy scan over all rows; each call starts over
    pub fn scan(&self) -> impl Iterator<Item = (&RowKey, &Tuple)> {
        self.rows.iter()
    }

    /// Set the row stored under `key` to `after`, deleting it when `None`
    pub fn apply(&mut self, key: &RowKey, after: Option<Tuple>) {
        if let Some(old) = self.rows.get(key).cloned() {
            self.unindex_row(key, &old);
        }
        match after {
            Some(tuple) => {
                self.index_row(key, &tuple);
                self.rows.insert(key.clone(), tuple);
            }
            None => {
                self.rows.shift_remove(key);
            }
        }
    }

    fn index_row(&mut self, key: &RowKey, tuple: &Tuple) {
        for index in self.indexes.values_mut() {
            index.insert(key, tuple);
        }
        if let Some(ft) = self.full_text.as_mut() {
            ft.insert(key, tuple);
        }
    }

    fn unindex_row(&mut self, key: &RowKey, tuple: &Tuple) {
        for index in self.indexes.values_mut() {
            index.remove(key, tuple);
        }
        if let Some(ft) = self.full_text.as_mut() {
            ft.remove(key, tuple);
        }
    }

    /// Create a secondary index populated from the current rows
    pub fn create_index(&mut self, name: impl Into<String>, columns: Vec<usize>) {
        let index = SecondaryIndex::build(columns, self.rows.iter());
        self.indexes.insert(name.into(), index);
    }

    /// Find an index over exactly these column positions
    pub fn index_on(&self, columns: &[usize]) -> Option<&SecondaryIndex> {
        self.indexes.values().find(|idx| idx.columns() == columns)
    }

    /// Create the full-text index populated from the current rows
    pub fn create_full_text_index(&mut self, columns: Vec<usize>, min_token_len: usize) {
        self.full_text = Some(FullTextIndex::build(
            columns,
            min_token_len,
            self.rows.iter(),
        ));
    }

    pub fn full_text(&self) -> Option<&FullTextIndex> {
        self.full_text.as_ref()
    }
}
