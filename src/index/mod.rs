//! Index module
//!
//! Derived structures maintained alongside the row store:
//! - Secondary equality indexes
//! - The full-text inverted index and its ranking

pub mod fulltext;
pub mod secondary;

pub use fulltext::{FullTextIndex, SearchHit};
pub use secondary::SecondaryIndex;
