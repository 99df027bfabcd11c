//! Secondary (equality) indexes
//!
//! Maps the values of the indexed columns to the keys of the rows holding
//! them. Used for `CREATE INDEX` lookups and for finding referencing rows
//! during cascades.

use std::collections::{BTreeSet, HashMap};

use crate::storage::{RowKey, Tuple, Value};

#[derive(Debug, Clone)]
pub struct SecondaryIndex {
    /// Positions of the indexed columns
    columns: Vec<usize>,
    entries: HashMap<Vec<Value>, BTreeSet<RowKey>>,
}

impl SecondaryIndex {
    /// Create an empty index over column positions
    pub fn new(columns: Vec<usize>) -> Self {
        Self {
            columns,
            entries: HashMap::new(),
        }
    }

    /// Build an index from existing rows
    pub fn build<'a>(
        columns: Vec<usize>,
        rows: impl IntoIterator<Item = (&'a RowKey, &'a Tuple)>,
    ) -> Self {
        let mut index = Self::new(columns);
        for (key, tuple) in rows {
            index.insert(key, tuple);
        }
        index
    }

    /// Indexed column positions
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    fn index_key(&self, tuple: &Tuple) -> Vec<Value> {
        tuple.project(&self.columns).into_values()
    }

    pub fn insert(&mut self, key: &RowKey, tuple: &Tuple) {
        self.entries
            .entry(self.index_key(tuple))
            .or_default()
            .insert(key.clone());
    }

    pub fn remove(&mut self, key: &RowKey, tuple: &Tuple) {
        let index_key = self.index_key(tuple);
        if let Some(keys) = self.entries.get_mut(&index_key) {
            keys.remove(key);
            if keys.is_empty() {
                self.entries.remove(&index_key);
            }
        }
    }

    /// Row keys whose indexed columns equal `values`, in key order
    pub fn lookup(&self, values: &[Value]) -> impl Iterator<Item = &RowKey> {
        self.entries.get(values).into_iter().flatten()
    }

    /// Number of distinct indexed values
    pub fn distinct_values(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_after_insert_and_remove() {
        let a = Tuple::new(vec![Value::Integer(1), Value::from("u1")]);
        let b = Tuple::new(vec![Value::Integer(2), Value::from("u1")]);
        let (ka, kb) = (RowKey::single(1i64), RowKey::single(2i64));

        let mut index = SecondaryIndex::build(vec![1], [(&ka, &a), (&kb, &b)]);
        let hits: Vec<_> = index.lookup(&[Value::from("u1")]).cloned().collect();
        assert_eq!(hits, vec![ka.clone(), kb.clone()]);

        index.remove(&ka, &a);
        index.remove(&kb, &b);
        assert_eq!(index.lookup(&[Value::from("u1")]).count(), 0);
        assert_eq!(index.distinct_values(), 0);
    }
}
