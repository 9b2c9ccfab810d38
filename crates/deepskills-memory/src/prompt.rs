//! Memory section of an agent's system prompt

use serde::Serialize;

use crate::error::Result;
use crate::store::{MemoryScope, MemoryStore};

const NO_USER_MEMORY: &str = "(no user memory)";
const NO_PROJECT_MEMORY: &str = "(no project memory)";

/// Renders and updates the memory note of one agent.
///
/// The note key is the agent name, so `agent.md` in either directory.
#[derive(Debug, Clone)]
pub struct MemoryPrompt {
    store: MemoryStore,
    agent_name: String,
}

/// Snapshot of an agent's memory, as exposed to tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryContext {
    /// User note or placeholder
    pub user_memory: String,
    /// Project note or placeholder
    pub project_memory: String,
    /// User memory directory
    pub user_memory_dir: String,
    /// Project memory directory
    pub project_memory_dir: String,
    /// Every user note key
    pub all_user_memories: Vec<String>,
    /// Every project note key
    pub all_project_memories: Vec<String>,
}

impl MemoryPrompt {
    /// Prompt section for `agent_name`
    pub fn new(store: MemoryStore, agent_name: impl Into<String>) -> Self {
        Self {
            store,
            agent_name: agent_name.into(),
        }
    }

    /// Agent whose note is rendered
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Underlying store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// User note, or a placeholder when there is none
    pub fn user_memory(&self) -> Result<String> {
        Ok(self
            .store
            .load_user(&self.agent_name)?
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| NO_USER_MEMORY.to_string()))
    }

    /// Project note, or a placeholder when there is none
    pub fn project_memory(&self) -> Result<String> {
        Ok(self
            .store
            .load_project(&self.agent_name)?
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| NO_PROJECT_MEMORY.to_string()))
    }

    /// Full memory section
    pub fn build(&self) -> Result<String> {
        let user_dir = self.store.user_dir().display();
        let project_dir = self.store.project_dir().display();
        let user_memory = self.user_memory()?;
        let project_memory = self.project_memory()?;

        Ok(format!(
            r#"## Long-term Memory

You have a persistent memory that survives between sessions.

**User memory directory**: `{user_dir}`
**Project memory directory**: `{project_dir}`

### Memory contents

<user_memory>
{user_memory}
</user_memory>

<project_memory>
{project_memory}
</project_memory>

### Using memory

Check memory when a session starts, when asked what you know about a topic,
and when the user refers to earlier work. Update memory when asked to
remember something, when a preference or pattern emerges, and after
finishing significant work.

Project memory takes precedence over user memory, and saved knowledge over
general knowledge.

### Memory files

- User notes: `{user_dir}/<name>.md`
- Project notes: `{project_dir}/<name>.md`"#
        ))
    }

    /// `base_prompt` with the memory section in front
    pub fn inject(&self, base_prompt: &str) -> Result<String> {
        Ok(format!("{}\n\n{}", self.build()?, base_prompt))
    }

    /// Overwrite the agent note in `scope`
    pub fn save(&self, content: &str, scope: MemoryScope) -> Result<()> {
        self.store.save(&self.agent_name, content, scope)?;
        Ok(())
    }

    /// Append to the agent note in `scope`
    pub fn append(&self, content: &str, scope: MemoryScope) -> Result<String> {
        self.store.append(&self.agent_name, content, scope)
    }

    /// Everything a tool needs to reason about memory
    pub fn context(&self) -> Result<MemoryContext> {
        Ok(MemoryContext {
            user_memory: self.user_memory()?,
            project_memory: self.project_memory()?,
            user_memory_dir: self.store.user_dir().display().to_string(),
            project_memory_dir: self.store.project_dir().display().to_string(),
            all_user_memories: self.store.list_user()?,
            all_project_memories: self.store.list_project()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn prompt() -> (tempfile::TempDir, MemoryPrompt) {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(root.path().join("user"), root.path().join("project"));
        (root, MemoryPrompt::new(store, "agent"))
    }

    #[test]
    fn test_placeholders_without_notes() {
        let (_root, prompt) = prompt();
        let section = prompt.build().unwrap();
        assert!(section.contains(NO_USER_MEMORY));
        assert!(section.contains(NO_PROJECT_MEMORY));
        assert!(section.contains("## Long-term Memory"));
    }

    #[test]
    fn test_notes_are_rendered_and_injected() {
        let (_root, prompt) = prompt();
        prompt.save("likes short answers", MemoryScope::User).unwrap();
        prompt.append("uses tokio", MemoryScope::Project).unwrap();

        let full = prompt.inject("You are helpful.").unwrap();
        assert!(full.contains("<user_memory>\nlikes short answers\n</user_memory>"));
        assert!(full.contains("uses tokio"));
        assert!(full.ends_with("\n\nYou are helpful."));

        let context = prompt.context().unwrap();
        assert_eq!(context.all_user_memories, ["agent"]);
        assert_eq!(context.project_memory, "uses tokio");
    }
}
