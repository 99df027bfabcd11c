//! Catalog module
//!
//! This module contains the system catalog, schema definitions, and data types.

pub mod catalog;
pub mod procedure;
pub mod schema;
pub mod types;

pub use catalog::{Catalog, ChildEdge};
pub use procedure::{Parameter, ProcedureDef};
pub use schema::{
    Column, DefaultValue, ForeignKey, FullTextIndexDef, IndexDef, ReferentialAction, Schema,
    TableBuilder, TableDef, TriggerAction, TriggerDef, TriggerEvent, TriggerTiming,
    UniqueConstraint,
};
pub use types::DataType;
