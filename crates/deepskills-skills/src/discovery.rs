//! Skill discovery across the user and project skills directories

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::loader::list_skills_in_dir;
use crate::skill::{Skill, SkillSource};

/// Scans the user-wide and project skills directories.
///
/// Project skills replace user skills with the same name.
#[derive(Debug, Clone)]
pub struct SkillDiscovery {
    user_dir: PathBuf,
    project_dir: PathBuf,
}

impl SkillDiscovery {
    /// Create a discovery over explicit directories
    pub fn new(user_dir: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            project_dir: project_dir.into(),
        }
    }

    /// Discovery over `~/.deepskills/skills/` and `./.deepskills/skills/`
    pub fn with_default_dirs() -> Self {
        let user_dir = match dirs::home_dir() {
            Some(home) => home.join(".deepskills").join("skills"),
            None => {
                warn!("Could not find home directory for user skills");
                PathBuf::from(".deepskills-user/skills")
            }
        };
        Self::new(user_dir, PathBuf::from(".deepskills/skills"))
    }

    /// User-wide skills directory
    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    /// Project skills directory
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Skills in the user directory
    pub fn discover_user(&self) -> Result<Vec<Skill>> {
        list_skills_in_dir(&self.user_dir, SkillSource::User)
    }

    /// Skills in the project directory
    pub fn discover_project(&self) -> Result<Vec<Skill>> {
        list_skills_in_dir(&self.project_dir, SkillSource::Project)
    }

    /// Skills in an arbitrary directory
    pub fn discover_from_dir(&self, dir: &Path, source: SkillSource) -> Result<Vec<Skill>> {
        list_skills_in_dir(dir, source)
    }

    /// User skills merged with project skills.
    ///
    /// A project skill takes the slot of a same-named user skill; otherwise
    /// user skills come first, then project skills, in directory order.
    pub fn discover_all(&self) -> Result<Vec<Skill>> {
        let user = self.discover_user()?;
        let project = self.discover_project()?;

        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut merged: Vec<Skill> = Vec::with_capacity(user.len() + project.len());

        for skill in user.into_iter().chain(project) {
            match slots.get(skill.name()) {
                Some(&index) => merged[index] = skill,
                None => {
                    slots.insert(skill.name().to_string(), merged.len());
                    merged.push(skill);
                }
            }
        }

        info!(
            "Discovered {} skills in {:?} and {:?}",
            merged.len(),
            self.user_dir,
            self.project_dir
        );
        Ok(merged)
    }
}

impl Default for SkillDiscovery {
    fn default() -> Self {
        Self::with_default_dirs()
    }
}
