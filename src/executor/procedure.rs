//! Stored procedure calls

use tracing::debug;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::storage::{Tuple, Value};

use super::query;
use super::workspace::Workspace;

/// Result set of a procedure call
///
/// Rows are handed out once, in the procedure's order; the set cannot be
/// rewound.
#[derive(Debug)]
pub struct ProcedureRows {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Tuple>,
}

impl ProcedureRows {
    /// Column names of every row
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for ProcedureRows {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for ProcedureRows {}

/// `CALL name(args...)`
pub fn call(
    catalog: &Catalog,
    ws: &Workspace,
    min_token_len: usize,
    name: &str,
    args: Vec<Value>,
) -> Result<ProcedureRows> {
    let procedure = catalog.get_procedure(name)?;
    let bound = procedure.bind_arguments(args)?;
    let body = procedure.body.bind(&bound)?;
    let result = query::select(catalog, ws, min_token_len, &body)?;
    debug!(procedure = name, rows = result.rows.len(), "called procedure");
    Ok(ProcedureRows {
        columns: result.columns,
        rows: result.rows.into_iter(),
    })
}
