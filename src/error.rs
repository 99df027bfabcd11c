//! Error types for inkdb
//!
//! This module defines all error types used throughout the storage engine.

use std::sync::Arc;
use thiserror::Error;

/// The main error type for inkdb
///
/// Errors are `Clone` so that a failed statement can be reported again by
/// the `commit` of the transaction it poisoned.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' already exists")]
    DuplicateTable(String),

    #[error("Catalog error: table '{0}' not found")]
    UnknownTable(String),

    #[error("Catalog error: table '{table}' references unknown {reference}")]
    UnknownReference { table: String, reference: String },

    #[error("Catalog error: column '{column}' not found in table '{table}'")]
    UnknownColumn { column: String, table: String },

    #[error("Catalog error: index '{0}' already exists")]
    DuplicateIndex(String),

    #[error("Catalog error: trigger '{0}' already exists")]
    DuplicateTrigger(String),

    #[error("Catalog error: procedure '{0}' already exists")]
    DuplicateProcedure(String),

    #[error("Catalog error: invalid definition - {0}")]
    InvalidDefinition(String),

    // ========== Constraint Errors ==========
    #[error("Constraint error: duplicate primary key {key} in table '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("Constraint error: unique constraint '{constraint}' violated in table '{table}'")]
    UniqueViolation { table: String, constraint: String },

    #[error("Constraint error: foreign key violation on '{table}' - {detail}")]
    ForeignKeyViolation { table: String, detail: String },

    #[error("Constraint error: null value not allowed for column '{table}.{column}'")]
    NullNotAllowed { table: String, column: String },

    #[error("Constraint error: value too large for column '{column}' (max {max})")]
    ValueTooLarge { column: String, max: usize },

    #[error("Type error: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    // ========== Execution Errors ==========
    #[error("Execution error: row {key} not found in table '{table}'")]
    NotFound { table: String, key: String },

    #[error("Execution error: cascade cycle detected at {key} in table '{table}'")]
    CascadeCycle { table: String, key: String },

    #[error("Execution error: trigger '{trigger}' violated a constraint - {reason}")]
    TriggerViolation { trigger: String, reason: String },

    #[error("Execution error: parameter '{0}' is not bound")]
    UnboundParameter(String),

    // ========== Procedure Errors ==========
    #[error("Procedure error: procedure '{0}' not found")]
    UnknownProcedure(String),

    #[error("Procedure error: '{procedure}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        procedure: String,
        expected: usize,
        found: usize,
    },

    // ========== Transaction Errors ==========
    #[error("Transaction error: transaction {0} is not active")]
    TransactionNotActive(u64),

    #[error("Transaction error: write conflict on {key} in table '{table}'")]
    WriteConflict { table: String, key: String },

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors raised while defining schema objects
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Error::DuplicateTable(_)
                | Error::UnknownTable(_)
                | Error::UnknownReference { .. }
                | Error::UnknownColumn { .. }
                | Error::DuplicateIndex(_)
                | Error::DuplicateTrigger(_)
                | Error::DuplicateProcedure(_)
                | Error::InvalidDefinition(_)
        )
    }

    /// Errors that violate a declared constraint on stored rows
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::DuplicateKey { .. }
                | Error::UniqueViolation { .. }
                | Error::ForeignKeyViolation { .. }
                | Error::NullNotAllowed { .. }
                | Error::ValueTooLarge { .. }
                | Error::TypeMismatch { .. }
                | Error::TriggerViolation { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias for inkdb operations
pub type Result<T> = std::result::Result<T, Error>;
