//! Statement execution module
//!
//! This module contains the write executor with its constraint, cascade and
//! trigger stages, plus the read paths (SELECT, full-text search, procedure
//! calls). Everything runs against a transaction's `Workspace`.

pub mod cascade;
pub mod constraints;
pub mod executor;
pub mod procedure;
pub mod query;
pub mod trigger;
pub mod workspace;

pub use executor::{Applied, Executor, WriteOp};
pub use procedure::ProcedureRows;
pub use query::{QueryResult, ScoredRow};
pub use workspace::Workspace;
