//! Skills registry: name index plus trigger keyword index
//!
//! The registry is the only long-lived owner of skills. The trigger index is
//! derived from the name index and updated on every register/unregister.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::discovery::SkillDiscovery;
use crate::error::Result;
use crate::skill::{Skill, SkillSource};

/// Skills registry managing all available skills
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    /// Skills by name
    skills: HashMap<String, Arc<Skill>>,
    /// Lowercased trigger → names of skills carrying it
    trigger_index: HashMap<String, BTreeSet<String>>,
}

impl SkillRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill, honouring the override rules.
    ///
    /// When the name is taken, a project skill replaces a user skill; within
    /// the same source a strictly higher priority replaces the existing one.
    /// Anything else is ignored, as is a skill with a blank name. Returns
    /// `true` if the skill was stored.
    pub fn register(&mut self, skill: impl Into<Arc<Skill>>) -> bool {
        let skill = skill.into();

        if skill.name().trim().is_empty() {
            warn!("Ignoring skill with an empty name ({})", skill.path.display());
            return false;
        }

        if let Some(existing) = self.skills.get(skill.name()) {
            if !should_replace(existing, &skill) {
                debug!(
                    "Keeping {} skill '{}' (priority {}) over {} candidate (priority {})",
                    existing.source,
                    existing.name(),
                    existing.priority(),
                    skill.source,
                    skill.priority()
                );
                return false;
            }

            let existing = Arc::clone(existing);
            self.remove_from_trigger_index(&existing);
            debug!("Replacing skill '{}'", existing.name());
        }

        self.add_to_trigger_index(&skill);
        self.skills.insert(skill.name().to_string(), skill);
        true
    }

    /// Remove a skill by name
    pub fn unregister(&mut self, name: &str) -> Option<Arc<Skill>> {
        let skill = self.skills.remove(name)?;
        self.remove_from_trigger_index(&skill);
        Some(skill)
    }

    fn add_to_trigger_index(&mut self, skill: &Skill) {
        for trigger in skill.triggers() {
            self.trigger_index
                .entry(trigger.to_lowercase())
                .or_default()
                .insert(skill.name().to_string());
        }
    }

    fn remove_from_trigger_index(&mut self, skill: &Skill) {
        for trigger in skill.triggers() {
            let key = trigger.to_lowercase();
            if let Some(names) = self.trigger_index.get_mut(&key) {
                names.remove(skill.name());
                if names.is_empty() {
                    self.trigger_index.remove(&key);
                }
            }
        }
    }

    /// Get a skill by name
    pub fn get(&self, name: &str) -> Option<Arc<Skill>> {
        self.skills.get(name).cloned()
    }

    /// Check whether a skill is registered
    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    /// All skills, highest priority first, ties by name
    pub fn get_all(&self) -> Vec<Arc<Skill>> {
        ranked(self.skills.values().cloned().collect())
    }

    /// Skills whose trigger occurs anywhere in `query`, ignoring case.
    ///
    /// Matching is substring containment, so `"sum"` also matches
    /// `"checksum"`. Results are ranked like [`SkillRegistry::get_all`].
    pub fn match_query(&self, query: &str) -> Vec<Arc<Skill>> {
        let query = query.to_lowercase();

        let names: BTreeSet<&String> = self
            .trigger_index
            .iter()
            .filter(|(trigger, _)| query.contains(trigger.as_str()))
            .flat_map(|(_, names)| names.iter())
            .collect();

        self.collect_ranked(names)
    }

    /// Skills carrying any of the given triggers exactly (ignoring case)
    pub fn match_by_triggers<S: AsRef<str>>(&self, triggers: &[S]) -> Vec<Arc<Skill>> {
        let names: BTreeSet<&String> = triggers
            .iter()
            .filter_map(|t| self.trigger_index.get(&t.as_ref().to_lowercase()))
            .flat_map(|names| names.iter())
            .collect();

        self.collect_ranked(names)
    }

    fn collect_ranked(&self, names: BTreeSet<&String>) -> Vec<Arc<Skill>> {
        ranked(
            names
                .into_iter()
                .filter_map(|name| self.skills.get(name).cloned())
                .collect(),
        )
    }

    /// Skills from one source, ranked like [`SkillRegistry::get_all`]
    pub fn filter_by_source(&self, source: SkillSource) -> Vec<Arc<Skill>> {
        ranked(
            self.skills
                .values()
                .filter(|skill| skill.source == source)
                .cloned()
                .collect(),
        )
    }

    /// Iterate over skills in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Skill>> {
        self.skills.values()
    }

    /// Get all skill names
    pub fn skill_names(&self) -> impl Iterator<Item = &String> {
        self.skills.keys()
    }

    /// Get number of skills
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Remove every skill
    pub fn clear(&mut self) {
        self.skills.clear();
        self.trigger_index.clear();
    }

    /// Register everything a discovery finds; returns the number discovered
    pub fn load_from_discovery(&mut self, discovery: &SkillDiscovery) -> Result<usize> {
        let skills = discovery.discover_all()?;
        let count = skills.len();

        for skill in skills {
            self.register(skill);
        }

        info!("Registered {} skills ({} total)", count, self.skills.len());
        Ok(count)
    }

    /// Clear and reload from a discovery
    pub fn refresh(&mut self, discovery: &SkillDiscovery) -> Result<usize> {
        self.clear();
        self.load_from_discovery(discovery)
    }
}

impl FromIterator<Skill> for SkillRegistry {
    fn from_iter<I: IntoIterator<Item = Skill>>(iter: I) -> Self {
        let mut registry = Self::new();
        for skill in iter {
            registry.register(skill);
        }
        registry
    }
}

fn should_replace(existing: &Skill, candidate: &Skill) -> bool {
    match (existing.source, candidate.source) {
        (SkillSource::User, SkillSource::Project) => true,
        (a, b) if a == b => candidate.priority() > existing.priority(),
        _ => false,
    }
}

fn by_rank(a: &Arc<Skill>, b: &Arc<Skill>) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then_with(|| a.name().cmp(b.name()))
}

fn ranked(mut skills: Vec<Arc<Skill>>) -> Vec<Arc<Skill>> {
    skills.sort_by(by_rank);
    skills
}
