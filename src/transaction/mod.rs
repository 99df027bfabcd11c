//! Transaction module
//!
//! Snapshot-isolated transactions over the committed database state:
//! - `TransactionManager` owns committed state and serializes commits
//! - `Transaction` is the handle statements run through

pub mod manager;
pub mod transaction;

pub use manager::TransactionManager;
pub use transaction::{Transaction, TransactionState};
