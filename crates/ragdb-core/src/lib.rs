pub mod config;
pub mod error;
pub mod files;
pub mod terms;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
