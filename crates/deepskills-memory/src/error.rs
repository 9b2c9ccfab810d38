//! Error types for the memory store

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`MemoryStore`](crate::MemoryStore)
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Key is empty or would escape the memory directory
    #[error("invalid memory key '{0}'")]
    InvalidKey(String),

    /// Reading or writing a memory file failed
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl MemoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, MemoryError>;
