//! Tantivy keyword index used as an auxiliary retrieval backend.

pub mod index;
pub mod tantivy_utils;

pub use index::KeywordIndex;
