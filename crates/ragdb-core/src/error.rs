use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    /// File unreadable, no loader for its extension, or the loader failed.
    #[error("Failed to load {file}: {message}")]
    Load { file: String, message: String },

    /// Unknown splitter name or an invalid separator pattern.
    #[error("Split failed: {0}")]
    Split(String),

    /// Summarization or child splitting failed; the file's derived chunks are discarded.
    #[error("Multi-vector expansion failed: {0}")]
    Expansion(String),

    /// Vector store, keyword sink or metadata store write failed.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Retrieval backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },
}

impl Error {
    pub fn load(file: &str, err: impl std::fmt::Display) -> Self {
        Self::Load { file: file.to_string(), message: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
