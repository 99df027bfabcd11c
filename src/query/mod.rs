//! Query module
//!
//! Pre-parsed read queries: predicates and SELECT descriptions.

pub mod predicate;
pub mod select;

pub use predicate::{CompareOp, Operand, Predicate};
pub use select::{OrderBy, Select, SortDirection};
