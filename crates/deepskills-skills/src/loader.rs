//! Skill loader: reads SKILL.md files from disk
//!
//! A skills directory holds one subdirectory per skill, each with a
//! `SKILL.md`. Invalid skills are logged and skipped so one broken file
//! never hides the rest.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::error::{Result, SkillError};
use crate::skill::{Skill, SkillSource, SKILL_FILE_NAME};

/// SKILL.md files above this size are rejected (10 MiB)
pub const MAX_SKILL_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Load a skill from a SKILL.md file
pub fn load_skill(skill_file: &Path, source: SkillSource) -> Result<Skill> {
    let size = fs::metadata(skill_file)?.len();
    if size > MAX_SKILL_FILE_SIZE {
        return Err(SkillError::TooLarge {
            path: skill_file.to_path_buf(),
            size,
            limit: MAX_SKILL_FILE_SIZE,
        });
    }

    let content = fs::read_to_string(skill_file)?;
    Skill::parse(&content, skill_file, source)
}

/// Load a skill from its directory
pub fn load_skill_from_dir(dir: &Path, source: SkillSource) -> Result<Skill> {
    let skill_file = dir.join(SKILL_FILE_NAME);

    if !skill_file.is_file() {
        return Err(SkillError::MissingSkillFile(dir.to_path_buf()));
    }

    load_skill(&skill_file, source)
}

/// Load every skill found directly under `dir`, sorted by directory name.
///
/// A missing directory yields an empty list. Entries whose SKILL.md resolves
/// outside `dir` (e.g. through a symlink) are ignored.
pub fn list_skills_in_dir(dir: &Path, source: SkillSource) -> Result<Vec<Skill>> {
    if !dir.exists() {
        debug!("Skills directory does not exist: {:?}", dir);
        return Ok(Vec::new());
    }

    if !dir.is_dir() {
        warn!("Skills path is not a directory: {:?}", dir);
        return Ok(Vec::new());
    }

    let base = dir.canonicalize()?;

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    let mut skills = Vec::new();

    for path in entries {
        if !path.is_dir() {
            continue;
        }

        let skill_file = path.join(SKILL_FILE_NAME);
        if !skill_file.is_file() {
            trace!("No SKILL.md in {:?}, skipping", path);
            continue;
        }

        if !is_within(&skill_file, &base) {
            warn!("Skipping {:?}: resolves outside {:?}", skill_file, base);
            continue;
        }

        match load_skill(&skill_file, source) {
            Ok(skill) => {
                debug!("Loaded {} skill: {} at {:?}", source, skill.name(), path);
                skills.push(skill);
            }
            Err(e) => {
                warn!("Skipping {:?}: {}", skill_file, e);
            }
        }
    }

    Ok(skills)
}

fn is_within(path: &Path, base: &Path) -> bool {
    path.canonicalize()
        .map(|resolved| resolved.starts_with(base))
        .unwrap_or(false)
}
