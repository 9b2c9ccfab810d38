//! System prompt assembly: base prompt plus the available skills

use deepskills_skills::{Skill, SkillSource};
use std::path::PathBuf;
use std::sync::Arc;

/// Prompt used when the caller supplies none
pub const BASE_SYSTEM_PROMPT: &str = r#"You are a capable assistant with a skills library and long-term memory.

# Capabilities

1. Discover and use skills to complete tasks
2. Save and recall long-term memory
3. Run skill chains for multi-step work

# Working style

- Answer concisely unless asked for detail
- Stop when the task is done
- Follow the conventions of existing code
- Use absolute paths for file operations"#;

const NO_SKILLS: &str =
    "(No skills available yet. Create one in a skills directory to get started.)";

/// Builds the skills section of the system prompt
#[derive(Debug, Clone)]
pub struct SkillsPromptBuilder {
    user_dir: PathBuf,
    project_dir: PathBuf,
    skills: Vec<Arc<Skill>>,
}

impl SkillsPromptBuilder {
    pub fn new(user_dir: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            project_dir: project_dir.into(),
            skills: Vec::new(),
        }
    }

    /// Replace the listed skills
    pub fn set_skills(&mut self, skills: Vec<Arc<Skill>>) {
        self.skills = skills;
    }

    pub fn skills(&self) -> &[Arc<Skill>] {
        &self.skills
    }

    /// Skills section only
    pub fn build_skills_prompt(&self) -> String {
        format!(
            r#"## Skills

You have a library of skills that provide specialised workflows and domain knowledge.

**Skill directories:**
- User skills: `{user_dir}`
- Project skills: `{project_dir}`

**Available skills:**

{skills_list}

### Using skills

You see each skill's name and description above; read the full instructions only when a task needs them:

1. Check whether the task matches a skill description
2. Read the skill with `read_skill`
3. Follow the workflow in its SKILL.md
4. Use the supporting files in the skill directory when referenced

Tools: `list_skills`, `read_skill`, `match_skills`, `execute_skill_chain`.

Example: for "research the latest quantum computing results", read `web-research` and follow its search, organise, synthesise workflow."#,
            user_dir = self.user_dir.display(),
            project_dir = self.project_dir.display(),
            skills_list = format_skills_list(&self.skills),
        )
    }

    /// Base prompt (or the default one) followed by the skills section
    pub fn build(&self, base_prompt: Option<&str>) -> String {
        let base = base_prompt
            .filter(|prompt| !prompt.is_empty())
            .unwrap_or(BASE_SYSTEM_PROMPT);
        format!("{}\n\n{}", base, self.build_skills_prompt())
    }
}

fn format_skill_item(skill: &Skill) -> String {
    let label = match skill.source {
        SkillSource::Project => "project",
        SkillSource::User => "user",
    };
    let triggers = if skill.triggers().is_empty() {
        "none".to_string()
    } else {
        skill
            .triggers()
            .iter()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "- **{}** [{}]\n  Description: {}\n  Triggers: {}\n  Path: `{}`",
        skill.name(),
        label,
        skill.description(),
        triggers,
        skill.path.display()
    )
}

fn format_skills_list(skills: &[Arc<Skill>]) -> String {
    if skills.is_empty() {
        return NO_SKILLS.to_string();
    }

    let mut sections = Vec::new();
    for (source, heading) in [
        (SkillSource::User, "### User skills"),
        (SkillSource::Project, "### Project skills"),
    ] {
        let items: Vec<String> = skills
            .iter()
            .filter(|s| s.source == source)
            .map(|s| format_skill_item(s))
            .collect();
        if !items.is_empty() {
            sections.push(format!("{}\n\n{}", heading, items.join("\n")));
        }
    }
    sections.join("\n\n")
}
