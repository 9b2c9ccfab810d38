//! deepskills memory
//!
//! Notes are plain Markdown files named `<key>.md`, kept in a user-wide and
//! a project-level directory. Project notes take precedence when loading.

#![warn(missing_docs)]

pub mod error;
pub mod prompt;
pub mod store;

pub use error::{MemoryError, Result};
pub use prompt::{MemoryContext, MemoryPrompt};
pub use store::{MemoryEntry, MemoryHit, MemoryListing, MemoryScope, MemoryStore};
