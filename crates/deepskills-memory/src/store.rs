//! File-backed memory store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{MemoryError, Result};

const MEMORY_EXTENSION: &str = "md";

/// Which memory directory a note lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    /// `~/.deepskills/memory/`
    User,
    /// `./.deepskills/memory/`
    Project,
}

impl MemoryScope {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
        }
    }
}

impl std::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A note together with its file timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Note key
    pub key: String,
    /// Note text
    pub content: String,
    /// Directory the note was read from
    pub scope: MemoryScope,
    /// Last modification time of the file
    pub updated_at: DateTime<Utc>,
}

/// A note whose content matched a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryHit {
    /// Directory the note was found in
    pub scope: MemoryScope,
    /// Note key
    pub key: String,
    /// Note text
    pub content: String,
}

/// Keys present in each scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryListing {
    /// Keys in the user directory
    pub user: Vec<String>,
    /// Keys in the project directory
    pub project: Vec<String>,
}

/// Reads and writes `<key>.md` notes in a user and a project directory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    user_dir: PathBuf,
    project_dir: PathBuf,
}

impl MemoryStore {
    /// Store over explicit directories; nothing is created until a write
    pub fn new(user_dir: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            project_dir: project_dir.into(),
        }
    }

    /// User memory directory
    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    /// Project memory directory
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Directory for `scope`
    pub fn dir(&self, scope: MemoryScope) -> &Path {
        match scope {
            MemoryScope::User => &self.user_dir,
            MemoryScope::Project => &self.project_dir,
        }
    }

    fn path_for(&self, key: &str, scope: MemoryScope) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir(scope).join(format!("{key}.{MEMORY_EXTENSION}")))
    }

    /// Write a note, creating the directory; returns the file path
    pub fn save(&self, key: &str, content: &str, scope: MemoryScope) -> Result<PathBuf> {
        let path = self.path_for(key, scope)?;
        let dir = self.dir(scope);
        fs::create_dir_all(dir).map_err(|e| MemoryError::io(dir, e))?;
        fs::write(&path, content).map_err(|e| MemoryError::io(&path, e))?;
        debug!("Saved {} memory '{}' to {:?}", scope, key, path);
        Ok(path)
    }

    /// Write a user note
    pub fn save_user(&self, key: &str, content: &str) -> Result<PathBuf> {
        self.save(key, content, MemoryScope::User)
    }

    /// Write a project note
    pub fn save_project(&self, key: &str, content: &str) -> Result<PathBuf> {
        self.save(key, content, MemoryScope::Project)
    }

    /// Read a note from one scope
    pub fn load_from(&self, key: &str, scope: MemoryScope) -> Result<Option<String>> {
        let path = self.path_for(key, scope)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MemoryError::io(path, e)),
        }
    }

    /// Read a user note
    pub fn load_user(&self, key: &str) -> Result<Option<String>> {
        self.load_from(key, MemoryScope::User)
    }

    /// Read a project note
    pub fn load_project(&self, key: &str) -> Result<Option<String>> {
        self.load_from(key, MemoryScope::Project)
    }

    /// Read a note, preferring the project copy
    pub fn load(&self, key: &str) -> Result<Option<String>> {
        match self.load_project(key)? {
            Some(content) => Ok(Some(content)),
            None => self.load_user(key),
        }
    }

    /// Remove a note; returns whether it existed
    pub fn delete(&self, key: &str, scope: MemoryScope) -> Result<bool> {
        let path = self.path_for(key, scope)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted {} memory '{}'", scope, key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MemoryError::io(path, e)),
        }
    }

    /// Remove a user note
    pub fn delete_user(&self, key: &str) -> Result<bool> {
        self.delete(key, MemoryScope::User)
    }

    /// Remove a project note
    pub fn delete_project(&self, key: &str) -> Result<bool> {
        self.delete(key, MemoryScope::Project)
    }

    /// Sorted keys of the notes in one scope; a missing directory is empty
    pub fn list(&self, scope: MemoryScope) -> Result<Vec<String>> {
        let dir = self.dir(scope);
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemoryError::io(dir, e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| MemoryError::io(dir, e))?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(MEMORY_EXTENSION)
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if validate_key(stem).is_err() {
                debug!("Skipping memory file with unusable key: {}", path.display());
                continue;
            }
            keys.push(stem.to_string());
        }

        keys.sort();
        Ok(keys)
    }

    /// Sorted user keys
    pub fn list_user(&self) -> Result<Vec<String>> {
        self.list(MemoryScope::User)
    }

    /// Sorted project keys
    pub fn list_project(&self) -> Result<Vec<String>> {
        self.list(MemoryScope::Project)
    }

    /// Keys of both scopes
    pub fn list_all(&self) -> Result<MemoryListing> {
        Ok(MemoryListing {
            user: self.list_user()?,
            project: self.list_project()?,
        })
    }

    /// Append to a note, separated by a blank line; returns the new content
    pub fn append(&self, key: &str, content: &str, scope: MemoryScope) -> Result<String> {
        let updated = match self.load_from(key, scope)? {
            Some(existing) if !existing.is_empty() => format!("{existing}\n\n{content}"),
            _ => content.to_string(),
        };
        self.save(key, &updated, scope)?;
        Ok(updated)
    }

    /// Notes containing `query`, ignoring case; user notes first
    pub fn search(&self, query: &str) -> Result<Vec<MemoryHit>> {
        let needle = query.to_lowercase();
        let mut hits = Vec::new();

        for scope in [MemoryScope::User, MemoryScope::Project] {
            for key in self.list(scope)? {
                let Some(content) = self.load_from(&key, scope)? else {
                    continue;
                };
                if content.to_lowercase().contains(&needle) {
                    hits.push(MemoryHit {
                        scope,
                        key,
                        content,
                    });
                }
            }
        }

        Ok(hits)
    }

    /// Note with its modification time
    pub fn entry(&self, key: &str, scope: MemoryScope) -> Result<Option<MemoryEntry>> {
        let Some(content) = self.load_from(key, scope)? else {
            return Ok(None);
        };
        let path = self.path_for(key, scope)?;
        let modified = fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .map_err(|e| MemoryError::io(&path, e))?;

        Ok(Some(MemoryEntry {
            key: key.to_string(),
            content,
            scope,
            updated_at: DateTime::<Utc>::from(modified),
        }))
    }

    /// Create both memory directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.user_dir, &self.project_dir] {
            fs::create_dir_all(dir).map_err(|e| MemoryError::io(dir, e))?;
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let invalid = key.trim().is_empty()
        || key.contains(['/', '\\', '\0'])
        || key.contains("..");
    if invalid {
        return Err(MemoryError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, MemoryStore) {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(root.path().join("user"), root.path().join("project"));
        (root, store)
    }

    #[test]
    fn test_save_and_load_prefers_project() {
        let (_root, store) = store();
        assert_eq!(store.load("agent").unwrap(), None);

        let path = store.save_user("agent", "user notes").unwrap();
        assert!(path.ends_with("user/agent.md"));
        assert_eq!(store.load("agent").unwrap().as_deref(), Some("user notes"));

        store.save_project("agent", "project notes").unwrap();
        assert_eq!(store.load("agent").unwrap().as_deref(), Some("project notes"));
        assert_eq!(store.load_user("agent").unwrap().as_deref(), Some("user notes"));
    }

    #[test]
    fn test_delete_and_list() {
        let (_root, store) = store();
        assert!(store.list_user().unwrap().is_empty());

        store.save_user("zeta", "z").unwrap();
        store.save_user("alpha", "a").unwrap();
        fs::write(store.user_dir().join("notes.txt"), "ignored").unwrap();
        store.save_project("proj", "p").unwrap();

        let listing = store.list_all().unwrap();
        assert_eq!(listing.user, ["alpha", "zeta"]);
        assert_eq!(listing.project, ["proj"]);

        assert!(store.delete_user("alpha").unwrap());
        assert!(!store.delete_user("alpha").unwrap());
        assert!(!store.delete_project("never").unwrap());
        assert_eq!(store.list_user().unwrap(), ["zeta"]);
    }

    #[test]
    fn test_append_joins_with_blank_line() {
        let (_root, store) = store();
        assert_eq!(store.append("log", "first", MemoryScope::Project).unwrap(), "first");
        assert_eq!(
            store.append("log", "second", MemoryScope::Project).unwrap(),
            "first\n\nsecond"
        );
        assert_eq!(store.load_project("log").unwrap().as_deref(), Some("first\n\nsecond"));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let (_root, store) = store();
        store.save_user("prefs", "Prefers Rust over Go").unwrap();
        store.save_project("stack", "This project uses rust and tokio").unwrap();
        store.save_project("other", "Nothing relevant").unwrap();

        let hits = store.search("RUST").unwrap();
        let found: Vec<_> = hits.iter().map(|h| (h.scope, h.key.as_str())).collect();
        assert_eq!(
            found,
            [(MemoryScope::User, "prefs"), (MemoryScope::Project, "stack")]
        );
    }

    #[test]
    fn test_stray_files_do_not_break_listing() {
        let (_root, store) = store();
        store.save_user("notes", "kept for later").unwrap();
        fs::write(store.user_dir().join("notes..old.md"), "kept, but stale").unwrap();

        assert_eq!(store.list_user().unwrap(), ["notes"]);
        let hits = store.search("kept").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "notes");
    }

    #[test]
    fn test_entry_has_timestamp() {
        let (_root, store) = store();
        assert!(store.entry("agent", MemoryScope::User).unwrap().is_none());

        let before = Utc::now() - chrono::Duration::seconds(5);
        store.save_user("agent", "hello").unwrap();

        let entry = store.entry("agent", MemoryScope::User).unwrap().unwrap();
        assert_eq!(entry.content, "hello");
        assert_eq!(entry.scope, MemoryScope::User);
        assert!(entry.updated_at >= before);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let (_root, store) = store();
        for key in ["", "  ", "../escape", "a/b", "a\\b", ".."] {
            assert!(
                matches!(store.save_user(key, "x"), Err(MemoryError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
        assert!(store.load("a/b").is_err());
    }

    #[test]
    fn test_ensure_dirs() {
        let (_root, store) = store();
        store.ensure_dirs().unwrap();
        assert!(store.user_dir().is_dir());
        assert!(store.project_dir().is_dir());
    }
}
