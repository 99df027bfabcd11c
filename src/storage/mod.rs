//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Values, tuples, and row keys
//! - The per-table row store with its derived indexes
//! - Versioned committed state
//! - The commit log

pub mod state;
pub mod table;
pub mod tuple;
pub mod wal;

pub use state::{DatabaseState, RowChange};
pub use table::TableData;
pub use tuple::{RowKey, Tuple, Value};
pub use wal::{CommitLog, LogRecord};
