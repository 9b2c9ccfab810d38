//! Error types for the skills subsystem

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or discovering skills
#[derive(Debug, Error)]
pub enum SkillError {
    /// Directory has no `SKILL.md`
    #[error("SKILL.md not found in {0:?}")]
    MissingSkillFile(PathBuf),

    /// `SKILL.md` exceeds the size limit
    #[error("skill file {path:?} is {size} bytes, limit is {limit}")]
    TooLarge {
        /// File path
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Allowed size in bytes
        limit: u64,
    },

    /// Frontmatter delimiters are missing or malformed
    #[error("invalid frontmatter: {0}")]
    Frontmatter(String),

    /// Frontmatter parsed but the metadata is unusable
    #[error("invalid skill metadata: {0}")]
    InvalidMetadata(String),

    /// Frontmatter is not valid YAML for the metadata schema
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, SkillError>;

/// Failure reported by a [`SkillHandler`](crate::SkillHandler).
///
/// The executor turns it into a failed step carrying [`HandlerError::message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}
