use anyhow::Result;
use deepskills_memory::{MemoryContext, MemoryPrompt, MemoryScope, MemoryStore};
use deepskills_skills::{
    ExecutionContext, ExecutionResult, InstructionsHandler, Skill, SkillChain, SkillDiscovery,
    SkillExecutor, SkillHandler, SkillPipeline, SkillRegistry, SkillSummary,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::prompt::SkillsPromptBuilder;
use crate::tools::{ChainReport, SkillTools, StepReport};

/// A matched skill as reported by [`SkillAgent::process`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedSkill {
    pub name: String,
    pub description: String,
    pub priority: i64,
}

/// Outcome of [`SkillAgent::process`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessReport {
    pub query: String,
    pub matched_skills: Vec<MatchedSkill>,
    pub executed: bool,
    pub execution_results: Vec<StepReport>,
}

/// Skills, memory and prompt assembly behind one handle.
///
/// The registry is shared immutably with the executor, so discovery builds
/// a new registry and swaps it in.
pub struct SkillAgent {
    config: Config,
    name: String,
    discovery: SkillDiscovery,
    registry: Arc<SkillRegistry>,
    handler: Arc<dyn SkillHandler>,
    executor: SkillExecutor,
    tools: SkillTools,
    memory: MemoryPrompt,
    prompt_builder: SkillsPromptBuilder,
}

impl SkillAgent {
    /// Create an agent with an empty registry; call [`SkillAgent::discover_skills`] to load
    pub fn new(config: Config, name: impl Into<String>) -> Self {
        let name = name.into();
        let discovery = SkillDiscovery::new(&config.skills.user_dir, &config.skills.project_dir);
        let registry = Arc::new(SkillRegistry::new());
        let handler: Arc<dyn SkillHandler> = Arc::new(InstructionsHandler);
        let executor = SkillExecutor::with_shared_handler(Arc::clone(&registry), Arc::clone(&handler));
        let store = MemoryStore::new(&config.memory.user_dir, &config.memory.project_dir);
        let prompt_builder =
            SkillsPromptBuilder::new(&config.skills.user_dir, &config.skills.project_dir);

        Self {
            tools: SkillTools::new(executor.clone()),
            memory: MemoryPrompt::new(store, name.clone()),
            config,
            name,
            discovery,
            registry,
            handler,
            executor,
            prompt_builder,
        }
    }

    /// Create an agent named after the configuration and load its skills
    pub fn from_config(config: Config) -> Result<Self> {
        let name = config.agent.name.clone();
        let mut agent = Self::new(config, name);
        agent.discover_skills()?;
        Ok(agent)
    }

    fn install_registry(&mut self, registry: SkillRegistry) {
        self.registry = Arc::new(registry);
        self.rebuild_executor();
        self.prompt_builder.set_skills(self.registry.get_all());
    }

    fn rebuild_executor(&mut self) {
        self.executor =
            SkillExecutor::with_shared_handler(Arc::clone(&self.registry), Arc::clone(&self.handler));
        self.tools = SkillTools::new(self.executor.clone());
    }

    /// Add discovered skills to the current ones; returns how many were found
    pub fn discover_skills(&mut self) -> Result<usize> {
        let mut registry = SkillRegistry::clone(&self.registry);
        let count = registry.load_from_discovery(&self.discovery)?;
        self.install_registry(registry);
        info!("Agent '{}' has {} skills", self.name, self.registry.len());
        Ok(count)
    }

    /// Replace all skills with a fresh discovery
    pub fn refresh_skills(&mut self) -> Result<usize> {
        let mut registry = SkillRegistry::new();
        let count = registry.load_from_discovery(&self.discovery)?;
        self.install_registry(registry);
        info!("Agent '{}' refreshed to {} skills", self.name, count);
        Ok(count)
    }

    /// Register a skill built in code
    pub fn register_skill(&mut self, skill: Skill) -> bool {
        let mut registry = SkillRegistry::clone(&self.registry);
        let stored = registry.register(skill);
        self.install_registry(registry);
        stored
    }

    pub fn get_skill(&self, name: &str) -> Option<Arc<Skill>> {
        self.registry.get(name)
    }

    pub fn list_skills(&self) -> Vec<SkillSummary> {
        self.tools.list_skills()
    }

    pub fn match_skills(&self, query: &str) -> Vec<Arc<Skill>> {
        self.executor.match_query(query)
    }

    /// Run one skill; `None` when the name is unknown
    pub fn execute_skill(&self, name: &str, context: &mut ExecutionContext) -> Option<ExecutionResult> {
        let skill = self.registry.get(name)?;
        Some(self.executor.execute(&skill, context))
    }

    /// Run one skill after its dependencies; empty when the name is unknown
    pub fn execute_skill_with_dependencies(
        &self,
        name: &str,
        context: &mut ExecutionContext,
    ) -> Vec<ExecutionResult> {
        match self.registry.get(name) {
            Some(skill) => self.executor.execute_with_dependencies(&skill, context),
            None => Vec::new(),
        }
    }

    pub fn execute_chain<S: AsRef<str>>(&self, skill_names: &[S], query: &str) -> ChainReport {
        self.tools.execute_skill_chain(skill_names, query)
    }

    /// Empty chain bound to this agent's executor
    pub fn chain(&self) -> SkillChain {
        SkillChain::new(self.executor.clone())
    }

    /// Empty pipeline bound to this agent's executor
    pub fn pipeline(&self) -> SkillPipeline {
        SkillPipeline::new(self.executor.clone())
    }

    /// Match `query` and optionally run up to `max_skills` of the matches
    pub fn process(&self, query: &str, auto_execute: bool, max_skills: usize) -> ProcessReport {
        let matched = self.match_skills(query);

        let mut report = ProcessReport {
            query: query.to_string(),
            matched_skills: matched
                .iter()
                .map(|skill| MatchedSkill {
                    name: skill.name().to_string(),
                    description: skill.description().to_string(),
                    priority: skill.priority(),
                })
                .collect(),
            executed: false,
            execution_results: Vec::new(),
        };

        if auto_execute && !matched.is_empty() {
            let mut context = ExecutionContext::new(query);
            let results = self.executor.auto_execute(query, &mut context, max_skills);
            report.executed = true;
            report.execution_results = results.iter().map(StepReport::from).collect();
        }

        report
    }

    pub fn skill_instructions(&self, name: &str) -> Option<String> {
        self.executor.get_skill_instructions(name)
    }

    /// Read a memory note, project copy first
    pub fn load_memory(&self, key: &str) -> Result<Option<String>> {
        Ok(self.memory.store().load(key)?)
    }

    pub fn save_memory(&self, content: &str, key: &str, scope: MemoryScope) -> Result<PathBuf> {
        Ok(self.memory.store().save(key, content, scope)?)
    }

    pub fn memory_context(&self) -> Result<MemoryContext> {
        Ok(self.memory.context()?)
    }

    /// Base prompt, skills section and memory section combined
    pub fn build_system_prompt(&self, base_prompt: Option<&str>) -> Result<String> {
        let skills_prompt = self.prompt_builder.build(base_prompt);
        Ok(self.memory.inject(&skills_prompt)?)
    }

    /// Replace how skills are executed
    pub fn set_handler(&mut self, handler: impl SkillHandler + 'static) {
        self.handler = Arc::new(handler);
        self.rebuild_executor();
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        self.config.ensure_dirs()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &SkillExecutor {
        &self.executor
    }

    pub fn tools(&self) -> &SkillTools {
        &self.tools
    }

    pub fn memory(&self) -> &MemoryPrompt {
        &self.memory
    }
}

impl std::fmt::Debug for SkillAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillAgent")
            .field("name", &self.name)
            .field("skills", &self.registry.len())
            .finish_non_exhaustive()
    }
}
