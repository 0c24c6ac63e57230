//! Vector store implementations: an in-memory arena and a LanceDB table.

pub mod embed;
pub mod memory;
pub mod schema;
pub mod store;
pub mod table;

pub use embed::HashEmbedder;
pub use memory::InMemoryVectorStore;
pub use store::LanceVectorStore;
