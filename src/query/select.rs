//! Structured SELECT
//!
//! `SELECT cols FROM t [WHERE pred] [MATCH(...) AGAINST(terms)]
//! [ORDER BY col [ASC|DESC], ...] [LIMIT n [OFFSET m]]`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::predicate::{Operand, Predicate};
use crate::error::{Error, Result};
use crate::storage::Value;

/// Sort direction for ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One ORDER BY item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A read query against a single table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Source table
    pub table: String,
    /// Projected columns, `None` for `*`
    pub columns: Option<Vec<String>>,
    /// WHERE clause
    pub filter: Option<Predicate>,
    /// Full-text query over the table's full-text index
    pub matching: Option<Operand>,
    /// ORDER BY; relevance order is used when empty and `matching` is set
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Select {
    /// `SELECT * FROM table`
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            filter: None,
            matching: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add a WHERE condition, AND-ed with any existing one
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// `MATCH(...) AGAINST('terms')`
    pub fn matching(mut self, terms: impl Into<String>) -> Self {
        self.matching = Some(Operand::Value(Value::String(terms.into())));
        self
    }

    /// `MATCH(...) AGAINST(:param)`
    pub fn matching_param(mut self, param: impl Into<String>) -> Self {
        self.matching = Some(Operand::Param(param.into()));
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Parameters referenced anywhere in the query
    pub fn params(&self) -> Vec<&str> {
        let mut out = self
            .filter
            .as_ref()
            .map(|f| f.params())
            .unwrap_or_default();
        if let Some(Operand::Param(name)) = &self.matching {
            out.push(name.as_str());
        }
        out
    }

    /// Substitute parameters with argument values
    pub fn bind(&self, args: &HashMap<String, Value>) -> Result<Select> {
        let mut bound = self.clone();
        bound.filter = self.filter.as_ref().map(|f| f.bind(args)).transpose()?;
        bound.matching = match &self.matching {
            Some(Operand::Param(name)) => Some(Operand::Value(
                args.get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnboundParameter(name.clone()))?,
            )),
            other => other.clone(),
        };
        Ok(bound)
    }
}
