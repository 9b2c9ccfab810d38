//! Skill definition and parsing
//!
//! Each skill is a folder containing SKILL.md with YAML frontmatter

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Result, SkillError};

/// File name every skill directory must contain
pub const SKILL_FILE_NAME: &str = "SKILL.md";

/// Maximum allowed name length
const MAX_NAME_LENGTH: usize = 64;
/// Maximum allowed description length
const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// Where a skill was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillSource {
    /// User-wide skills (`~/.deepskills/skills/`)
    #[default]
    User,
    /// Project skills (`.deepskills/skills/`), override user skills
    Project,
}

impl SkillSource {
    /// Stable lowercase identifier
    pub fn as_str(self) -> &'static str {
        match self {
            SkillSource::User => "user",
            SkillSource::Project => "project",
        }
    }
}

impl fmt::Display for SkillSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Skill metadata extracted from YAML frontmatter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMetadata {
    /// Skill name, the registry key
    pub name: String,
    /// What the skill does and when to use it
    pub description: String,
    /// Keywords that select this skill when found in a query
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Names of skills that must run before this one
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Higher wins on name clashes and in listings
    #[serde(default)]
    pub priority: i64,
}

impl SkillMetadata {
    /// True if any trigger occurs in `query`, ignoring case.
    ///
    /// Plain substring containment: a short trigger also matches inside
    /// longer words.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.triggers
            .iter()
            .any(|trigger| query.contains(&trigger.to_lowercase()))
    }
}

/// A loaded skill: metadata, instructions and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    /// Skill metadata
    pub metadata: SkillMetadata,
    /// Markdown body after the frontmatter, trimmed
    pub instructions: String,
    /// Full SKILL.md text including frontmatter
    pub content: String,
    /// Path of the SKILL.md file
    pub path: PathBuf,
    /// User or project skill
    pub source: SkillSource,
}

impl Skill {
    /// Create a skill in code with empty description and instructions
    pub fn new(name: impl Into<String>, source: SkillSource) -> Self {
        Self {
            metadata: SkillMetadata {
                name: name.into(),
                ..SkillMetadata::default()
            },
            instructions: String::new(),
            content: String::new(),
            path: PathBuf::new(),
            source,
        }
    }

    /// Stand-in for a skill that could not be found; only the name is set
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(name, SkillSource::default())
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    /// Set the trigger keywords
    #[must_use]
    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the dependency names
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Set the priority
    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.metadata.priority = priority;
        self
    }

    /// Set the instruction text
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set the SKILL.md path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Parse a skill from SKILL.md text
    pub fn parse(content: &str, path: &Path, source: SkillSource) -> Result<Self> {
        let (metadata, body) = parse_skill_content(content)?;
        validate_metadata(&metadata)?;

        Ok(Self {
            metadata,
            instructions: body.trim().to_string(),
            content: content.to_string(),
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the skill name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Get the skill description
    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    /// Trigger keywords
    pub fn triggers(&self) -> &[String] {
        &self.metadata.triggers
    }

    /// Dependency names
    pub fn dependencies(&self) -> &[String] {
        &self.metadata.dependencies
    }

    /// Priority
    pub fn priority(&self) -> i64 {
        self.metadata.priority
    }

    /// Directory holding SKILL.md and supporting files
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// True if any trigger occurs in `query`
    pub fn matches(&self, query: &str) -> bool {
        self.metadata.matches(query)
    }

    /// Files next to SKILL.md (scripts, references), sorted by path
    pub fn supporting_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.directory()) else {
            return Vec::new();
        };

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.file_name().is_some_and(|n| n != SKILL_FILE_NAME)
            })
            .collect();
        files.sort();
        files
    }

    /// Path of a supporting file, if it exists
    pub fn supporting_file(&self, filename: &str) -> Option<PathBuf> {
        let path = self.directory().join(filename);
        path.is_file().then_some(path)
    }

    /// Listing summary
    pub fn summary(&self) -> SkillSummary {
        SkillSummary {
            name: self.metadata.name.clone(),
            description: self.metadata.description.clone(),
            triggers: self.metadata.triggers.clone(),
            source: self.source,
            priority: self.metadata.priority,
        }
    }
}

/// Compact, serializable view of a skill for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSummary {
    /// Skill name
    pub name: String,
    /// Skill description
    pub description: String,
    /// Trigger keywords
    pub triggers: Vec<String>,
    /// User or project skill
    pub source: SkillSource,
    /// Priority
    pub priority: i64,
}

/// Parse skill content to extract frontmatter metadata and body
fn parse_skill_content(content: &str) -> Result<(SkillMetadata, String)> {
    let frontmatter_re = Regex::new(r"^---[ \t]*\r?\n([\s\S]*?)\r?\n---[ \t]*(?:\r?\n([\s\S]*))?$")
        .map_err(|e| SkillError::Frontmatter(format!("failed to compile regex: {e}")))?;

    let captures = frontmatter_re
        .captures(content)
        .ok_or_else(|| SkillError::Frontmatter("no valid YAML frontmatter found".into()))?;

    let yaml_str = captures
        .get(1)
        .ok_or_else(|| SkillError::Frontmatter("failed to extract frontmatter".into()))?
        .as_str();

    let body = captures.get(2).map(|m| m.as_str()).unwrap_or("");

    let metadata: SkillMetadata = serde_yaml::from_str(yaml_str)?;

    Ok((metadata, body.to_string()))
}

/// Validate skill metadata
fn validate_metadata(metadata: &SkillMetadata) -> Result<()> {
    if metadata.name.trim().is_empty() {
        return Err(SkillError::InvalidMetadata(
            "skill name cannot be empty".into(),
        ));
    }

    if metadata.name.len() > MAX_NAME_LENGTH {
        warn!(
            "Skill name '{}' exceeds {} characters (was {})",
            metadata.name,
            MAX_NAME_LENGTH,
            metadata.name.len()
        );
    }

    // Names double as directory names and CLI arguments
    let name_re = Regex::new(r"^[a-z0-9][a-z0-9_-]*$")
        .map_err(|e| SkillError::InvalidMetadata(format!("failed to compile regex: {e}")))?;

    if !name_re.is_match(&metadata.name) {
        return Err(SkillError::InvalidMetadata(format!(
            "skill name '{}' must contain only lowercase letters, numbers, hyphens and underscores",
            metadata.name
        )));
    }

    if metadata.description.trim().is_empty() {
        return Err(SkillError::InvalidMetadata(format!(
            "skill '{}' description cannot be empty",
            metadata.name
        )));
    }

    if metadata.description.len() > MAX_DESCRIPTION_LENGTH {
        warn!(
            "Skill '{}' description exceeds {} characters (was {})",
            metadata.name,
            MAX_DESCRIPTION_LENGTH,
            metadata.description.len()
        );
    }

    Ok(())
}
