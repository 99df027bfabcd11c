//! inkdb - A constraint-enforcing relational storage engine written in Rust
//!
//! This library provides the core components of the engine:
//! - System catalog (tables, constraints, indexes, triggers, procedures)
//! - Row store with secondary and full-text indexes
//! - Statement execution (constraint checks, cascades, triggers)
//! - Snapshot-isolated transactions with a durable commit log
//! - The `blog_system` reference schema

pub mod blog;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod index;
pub mod query;
pub mod storage;
pub mod transaction;

pub use config::{Clock, EngineConfig, ManualClock, SystemClock};
pub use database::Database;
pub use error::{Error, Result};
pub use executor::{ProcedureRows, QueryResult, ScoredRow};
pub use storage::{RowKey, Tuple, Value};
pub use transaction::{Transaction, TransactionState};
