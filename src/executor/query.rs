//! Read execution: SELECT and full-text search
//!
//! Reads see exactly what the caller's workspace sees.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::catalog::{Catalog, FullTextIndexDef, TableDef};
use crate::error::{Error, Result};
use crate::index::fulltext::{document_terms, query_terms, rank};
use crate::index::SearchHit;
use crate::query::{Select, SortDirection};
use crate::storage::{RowKey, Tuple, Value};

use super::workspace::Workspace;

/// Query result
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Tuple>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// A full-text match with its row
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub key: RowKey,
    pub row: Tuple,
    pub score: f64,
}

struct Candidate {
    key: RowKey,
    row: Tuple,
}

/// Execute a bound SELECT
pub fn select(
    catalog: &Catalog,
    ws: &Workspace,
    min_token_len: usize,
    query: &Select,
) -> Result<QueryResult> {
    if let Some(param) = query.params().first() {
        return Err(Error::UnboundParameter(param.to_string()));
    }
    let def = catalog.get_table(&query.table)?;

    let mut candidates = match &query.matching {
        Some(terms) => {
            let terms = terms.value()?;
            let text = terms.as_str().ok_or_else(|| Error::TypeMismatch {
                expected: "TEXT".into(),
                found: terms.type_name().into(),
            })?;
            search_hits(catalog, ws, &def, min_token_len, text)?
                .into_iter()
                .filter_map(|hit| {
                    ws.get(&def.name, &hit.key).map(|row| Candidate {
                        key: hit.key,
                        row: row.clone(),
                    })
                })
                .collect()
        }
        None => candidate_rows(catalog, ws, &def, query),
    };

    if let Some(filter) = &query.filter {
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if filter.evaluate(&def, &candidate.row)? {
                kept.push(candidate);
            }
        }
        candidates = kept;
    }

    if !query.order_by.is_empty() {
        let order: Vec<(usize, SortDirection)> = query
            .order_by
            .iter()
            .map(|o| {
                def.schema
                    .get_column_index(&o.column)
                    .map(|idx| (idx, o.direction))
                    .ok_or_else(|| Error::UnknownColumn {
                        column: o.column.clone(),
                        table: def.name.clone(),
                    })
            })
            .collect::<Result<_>>()?;
        candidates.sort_by(|a, b| {
            order
                .iter()
                .map(|&(idx, direction)| {
                    let ord = a.row.get(idx).cmp(&b.row.get(idx));
                    match direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
    } else if query.matching.is_none() {
        candidates.sort_by(|a, b| a.key.cmp(&b.key));
    }

    let (columns, projection) = match &query.columns {
        Some(names) => (names.clone(), def.column_indices(names)?),
        None => (
            def.schema.column_names().into_iter().map(String::from).collect(),
            (0..def.schema.column_count()).collect(),
        ),
    };
    let rows = candidates
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .map(|c| c.row.project(&projection))
        .collect();

    Ok(QueryResult { columns, rows })
}

/// Pick the narrowest access path the filter allows
fn candidate_rows(catalog: &Catalog, ws: &Workspace, def: &TableDef, query: &Select) -> Vec<Candidate> {
    let equalities = query
        .filter
        .as_ref()
        .map(|f| f.equalities())
        .unwrap_or_default();
    let bound = |columns: &[String]| -> Option<Vec<Value>> {
        columns
            .iter()
            .map(|c| {
                equalities
                    .iter()
                    .find(|(col, _)| *col == c.as_str())
                    .map(|(_, v)| (*v).clone())
            })
            .collect()
    };

    let by_primary_key = def
        .has_primary_key()
        .then(|| bound(&def.primary_key))
        .flatten()
        .map(|values| vec![RowKey::new(values)]);
    let keys = by_primary_key.or_else(|| {
        catalog.get_table_indexes(&def.name).iter().find_map(|index| {
            let values = bound(&index.columns)?;
            let columns = def.column_indices(&index.columns).ok()?;
            Some(ws.lookup_eq(&def.name, &columns, &values))
        })
    });

    match keys {
        Some(keys) => keys
            .into_iter()
            .filter_map(|key| {
                ws.get(&def.name, &key)
                    .cloned()
                    .map(|row| Candidate { key, row })
            })
            .collect(),
        None => ws
            .scan(&def.name)
            .map(|(key, row)| Candidate {
                key: key.clone(),
                row: row.clone(),
            })
            .collect(),
    }
}

fn full_text_def(catalog: &Catalog, def: &TableDef) -> Result<Arc<FullTextIndexDef>> {
    catalog.full_text_index(&def.name).ok_or_else(|| {
        Error::InvalidDefinition(format!("table '{}' has no full-text index", def.name))
    })
}

/// Rank the visible rows of a table against a natural-language query
pub fn search_hits(
    catalog: &Catalog,
    ws: &Workspace,
    def: &TableDef,
    min_token_len: usize,
    text: &str,
) -> Result<Vec<SearchHit>> {
    let index_def = full_text_def(catalog, def)?;
    let columns = def.column_indices(&index_def.columns)?;
    let terms = query_terms(text, min_token_len);
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let mut per_term: Vec<BTreeMap<RowKey, u32>> = vec![BTreeMap::new(); terms.len()];

    let committed = ws.base().table(&def.name);
    let index = committed
        .and_then(|t| t.full_text())
        .filter(|ft| ft.columns() == columns.as_slice() && ft.min_token_len() == min_token_len);
    match index {
        Some(index) => {
            for (slot, term) in per_term.iter_mut().zip(&terms) {
                if let Some(postings) = index.postings(term) {
                    slot.extend(
                        postings
                            .iter()
                            .filter(|(key, _)| !ws.is_staged(&def.name, key))
                            .map(|(key, tf)| (key.clone(), *tf)),
                    );
                }
            }
        }
        None => {
            for (key, row) in committed.into_iter().flat_map(|t| t.scan()) {
                if !ws.is_staged(&def.name, key) {
                    let doc = document_terms(row, &columns, min_token_len);
                    add_document(&mut per_term, &terms, key, &doc);
                }
            }
        }
    }
    for (key, row) in ws.staged_rows(&def.name) {
        if let Some(row) = row {
            let doc = document_terms(row, &columns, min_token_len);
            add_document(&mut per_term, &terms, key, &doc);
        }
    }

    Ok(rank(&per_term, ws.row_count(&def.name)))
}

fn add_document(
    per_term: &mut [BTreeMap<RowKey, u32>],
    terms: &[String],
    key: &RowKey,
    doc: &HashMap<String, u32>,
) {
    for (slot, term) in per_term.iter_mut().zip(terms) {
        if let Some(&tf) = doc.get(term) {
            slot.insert(key.clone(), tf);
        }
    }
}

/// `MATCH(...) AGAINST(text)`: matching rows by descending relevance
pub fn search(
    catalog: &Catalog,
    ws: &Workspace,
    min_token_len: usize,
    table: &str,
    text: &str,
) -> Result<Vec<ScoredRow>> {
    let def = catalog.get_table(table)?;
    let hits = search_hits(catalog, ws, &def, min_token_len, text)?;
    Ok(hits
        .into_iter()
        .filter_map(|hit| {
            ws.get(table, &hit.key).map(|row| ScoredRow {
                row: row.clone(),
                key: hit.key,
                score: hit.score,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, TableBuilder};
    use crate::query::{OrderBy, Predicate};
    use crate::storage::DatabaseState;

    fn setup() -> (Catalog, Workspace) {
        let catalog = Catalog::new();
        catalog
            .define_table(
                TableBuilder::new("notes")
                    .column(Column::new("id", DataType::Integer))
                    .column(Column::new("body", DataType::Text))
                    .column(Column::new("rank", DataType::Integer))
                    .primary_key(["id"])
                    .build(),
            )
            .unwrap();
        let mut state = DatabaseState::new();
        state.add_table("notes");
        let mut ws = Workspace::new(Arc::new(state));
        for (id, body, rank) in [(3, "gamma", 1), (1, "alpha", 2), (2, "beta", 1)] {
            ws.put(
                "notes",
                RowKey::single(id),
                Tuple::new(vec![Value::Integer(id), Value::from(body), Value::Integer(rank)]),
            );
        }
        (catalog, ws)
    }

    #[test]
    fn test_rows_default_to_key_order() {
        let (catalog, ws) = setup();
        let result = select(&catalog, &ws, 3, &Select::from("notes").columns(["body"])).unwrap();
        assert_eq!(result.columns, vec!["body"]);
        let bodies: Vec<_> = result.rows.iter().map(|r| r.values()[0].clone()).collect();
        assert_eq!(bodies, vec![Value::from("alpha"), Value::from("beta"), Value::from("gamma")]);
    }

    #[test]
    fn test_order_ties_break_on_key() {
        let (catalog, ws) = setup();
        let query = Select::from("notes")
            .columns(["id"])
            .order_by(OrderBy::asc("rank"))
            .offset(1)
            .limit(1);
        let result = select(&catalog, &ws, 3, &query).unwrap();
        // rank 1: ids 2 and 3, then rank 2: id 1
        assert_eq!(result.value(0, "id"), Some(&Value::Integer(3)));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_primary_key_lookup_applies_rest_of_filter() {
        let (catalog, ws) = setup();
        let hit = Select::from("notes").filter(Predicate::eq("id", 2i64).and(Predicate::eq("rank", 1i64)));
        assert_eq!(select(&catalog, &ws, 3, &hit).unwrap().len(), 1);

        let miss = Select::from("notes").filter(Predicate::eq("id", 2i64).and(Predicate::eq("rank", 2i64)));
        assert!(select(&catalog, &ws, 3, &miss).unwrap().is_empty());
    }

    #[test]
    fn test_unbound_parameter_rejected() {
        let (catalog, ws) = setup();
        let query = Select::from("notes").filter(Predicate::eq_param("id", "noteId"));
        assert!(matches!(
            select(&catalog, &ws, 3, &query),
            Err(Error::UnboundParameter(ref p)) if p == "noteId"
        ));
    }

    #[test]
    fn test_unknown_order_column() {
        let (catalog, ws) = setup();
        let query = Select::from("notes").order_by(OrderBy::desc("missing"));
        assert!(matches!(
            select(&catalog, &ws, 3, &query),
            Err(Error::UnknownColumn { .. })
        ));
    }
}
