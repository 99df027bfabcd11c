//! Data types for inkdb
//!
//! This module defines the column types supported by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::storage::Value;

/// Column data types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean type
    Boolean,
    /// Integer (64-bit)
    Integer,
    /// Variable-length character string with max length in characters
    Varchar(usize),
    /// Unlimited text
    Text,
    /// Date (days since epoch)
    Date,
    /// Timestamp (milliseconds since epoch)
    Timestamp,
    /// One of a fixed set of strings
    Enum(Vec<String>),
}

impl DataType {
    /// Build an enum type from its members
    pub fn enumeration<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DataType::Enum(members.into_iter().map(Into::into).collect())
    }

    /// Check if this type is a string type
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            DataType::Varchar(_) | DataType::Text | DataType::Enum(_)
        )
    }

    /// Check whether a non-null value has this type, ignoring length limits
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Boolean, Value::Boolean(_)) => true,
            (DataType::Integer, Value::Integer(_)) => true,
            (DataType::Varchar(_) | DataType::Text, Value::String(_)) => true,
            (DataType::Enum(members), Value::String(s)) => members.iter().any(|m| m == s),
            (DataType::Date, Value::Date(_)) => true,
            (DataType::Timestamp, Value::Timestamp(_)) => true,
            _ => false,
        }
    }

    /// Validate a value destined for `column`
    ///
    /// NULL always passes here; nullability is the column's concern.
    pub fn check(&self, column: &str, value: &Value) -> Result<()> {
        if !self.accepts(value) {
            return Err(Error::TypeMismatch {
                expected: format!("{} for column '{}'", self, column),
                found: match value {
                    Value::String(s) => format!("'{}'", s),
                    other => other.type_name().to_string(),
                },
            });
        }
        if let (DataType::Varchar(max), Value::String(s)) = (self, value) {
            if s.chars().count() > *max {
                return Err(Error::ValueTooLarge {
                    column: column.to_string(),
                    max: *max,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Varchar(n) => write!(f, "VARCHAR({})", n),
            DataType::Text => write!(f, "TEXT"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Enum(members) => {
                let quoted: Vec<String> = members.iter().map(|m| format!("'{}'", m)).collect();
                write!(f, "ENUM({})", quoted.join(", "))
            }
        }
    }
}
