//! Row predicates
//!
//! Predicates arrive pre-parsed. Operands are either literal values or named
//! parameters, the latter only legal inside stored-procedure templates until
//! they are bound.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::catalog::TableDef;
use crate::error::{Error, Result};
use crate::storage::{Tuple, Value};

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// A literal value
    Value(Value),
    /// A named procedure parameter
    Param(String),
}

impl Operand {
    /// Resolve against bound arguments
    fn bind(&self, args: &HashMap<String, Value>) -> Result<Operand> {
        match self {
            Operand::Value(v) => Ok(Operand::Value(v.clone())),
            Operand::Param(name) => args
                .get(name)
                .cloned()
                .map(Operand::Value)
                .ok_or_else(|| Error::UnboundParameter(name.clone())),
        }
    }

    /// The literal value, failing for an unbound parameter
    pub fn value(&self) -> Result<&Value> {
        match self {
            Operand::Value(v) => Ok(v),
            Operand::Param(name) => Err(Error::UnboundParameter(name.clone())),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::NotEq => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::LtEq => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::GtEq => ord != Ordering::Less,
        }
    }
}

/// A boolean condition over one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        operand: Operand,
    },
    IsNull(String),
    IsNotNull(String),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// `column <op> operand`
    pub fn compare(column: impl Into<String>, op: CompareOp, operand: Operand) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            operand,
        }
    }

    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, Operand::Value(value.into()))
    }

    /// `column = :param`
    pub fn eq_param(column: impl Into<String>, param: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Eq, Operand::Param(param.into()))
    }

    /// `column > value`
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, Operand::Value(value.into()))
    }

    /// `column < value`
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, Operand::Value(value.into()))
    }

    /// `self AND other`
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// `self OR other`
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// `NOT self`
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Substitute parameters with argument values
    pub fn bind(&self, args: &HashMap<String, Value>) -> Result<Predicate> {
        Ok(match self {
            Predicate::Compare {
                column,
                op,
                operand,
            } => Predicate::Compare {
                column: column.clone(),
                op: *op,
                operand: operand.bind(args)?,
            },
            Predicate::IsNull(c) => Predicate::IsNull(c.clone()),
            Predicate::IsNotNull(c) => Predicate::IsNotNull(c.clone()),
            Predicate::And(l, r) => Predicate::And(Box::new(l.bind(args)?), Box::new(r.bind(args)?)),
            Predicate::Or(l, r) => Predicate::Or(Box::new(l.bind(args)?), Box::new(r.bind(args)?)),
            Predicate::Not(p) => Predicate::Not(Box::new(p.bind(args)?)),
        })
    }

    /// Names of all parameters referenced
    pub fn params(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit(&mut |p| {
            if let Predicate::Compare {
                operand: Operand::Param(name),
                ..
            } = p
            {
                out.push(name.as_str());
            }
        });
        out
    }

    /// Names of all columns referenced
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit(&mut |p| match p {
            Predicate::Compare { column, .. }
            | Predicate::IsNull(column)
            | Predicate::IsNotNull(column) => out.push(column.as_str()),
            _ => {}
        });
        out
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Predicate)) {
        f(self);
        match self {
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.visit(f);
                r.visit(f);
            }
            Predicate::Not(p) => p.visit(f),
            _ => {}
        }
    }

    /// Top-level `column = literal` conjuncts, usable for index lookups
    pub fn equalities(&self) -> Vec<(&str, &Value)> {
        match self {
            Predicate::Compare {
                column,
                op: CompareOp::Eq,
                operand: Operand::Value(v),
            } => vec![(column.as_str(), v)],
            Predicate::And(l, r) => {
                let mut out = l.equalities();
                out.extend(r.equalities());
                out
            }
            _ => Vec::new(),
        }
    }

    /// Evaluate against a row; unknown (NULL) results count as false
    pub fn evaluate(&self, def: &TableDef, tuple: &Tuple) -> Result<bool> {
        Ok(self.evaluate3(def, tuple)?.unwrap_or(false))
    }

    /// Three-valued evaluation, `None` meaning unknown
    fn evaluate3(&self, def: &TableDef, tuple: &Tuple) -> Result<Option<bool>> {
        match self {
            Predicate::Compare {
                column,
                op,
                operand,
            } => {
                let left = column_value(def, tuple, column)?;
                let right = operand.value()?;
                if left.is_null() || right.is_null() {
                    return Ok(None);
                }
                let ord = left.compare(right).ok_or_else(|| Error::TypeMismatch {
                    expected: left.type_name().to_string(),
                    found: right.type_name().to_string(),
                })?;
                Ok(Some(op.holds(ord)))
            }
            Predicate::IsNull(column) => Ok(Some(column_value(def, tuple, column)?.is_null())),
            Predicate::IsNotNull(column) => {
                Ok(Some(!column_value(def, tuple, column)?.is_null()))
            }
            Predicate::And(l, r) => {
                let (l, r) = (l.evaluate3(def, tuple)?, r.evaluate3(def, tuple)?);
                Ok(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                })
            }
            Predicate::Or(l, r) => {
                let (l, r) = (l.evaluate3(def, tuple)?, r.evaluate3(def, tuple)?);
                Ok(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                })
            }
            Predicate::Not(p) => Ok(p.evaluate3(def, tuple)?.map(|b| !b)),
        }
    }
}

fn column_value<'t>(def: &TableDef, tuple: &'t Tuple, column: &str) -> Result<&'t Value> {
    def.schema()
        .get_column_index(column)
        .and_then(|idx| tuple.get(idx))
        .ok_or_else(|| Error::UnknownColumn {
            column: column.to_string(),
            table: def.name().to_string(),
        })
}
