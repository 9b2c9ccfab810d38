//! Skill operations exposed to an agent as named tools
//!
//! Every tool returns a serialisable value so it can be handed to a model
//! as JSON.

use anyhow::{bail, Context};
use deepskills_skills::{
    ChainResult, ExecutionContext, ExecutionResult, Skill, SkillChain, SkillExecutor,
    SkillRegistry, SkillSource, SkillSummary,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Names accepted by [`SkillTools::invoke`]
pub const TOOL_NAMES: [&str; 5] = [
    "list_skills",
    "read_skill",
    "match_skills",
    "get_skill_instructions",
    "execute_skill_chain",
];

/// Tool result that is either a value or an error message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput<T> {
    Ok(T),
    Error { error: String },
}

impl<T> ToolOutput<T> {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Everything known about one skill
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillDetail {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub triggers: Vec<String>,
    pub dependencies: Vec<String>,
    pub priority: i64,
    pub source: SkillSource,
    pub path: String,
    pub directory: String,
    pub supporting_files: Vec<String>,
}

impl From<&Skill> for SkillDetail {
    fn from(skill: &Skill) -> Self {
        Self {
            name: skill.name().to_string(),
            description: skill.description().to_string(),
            instructions: skill.instructions.clone(),
            triggers: skill.triggers().to_vec(),
            dependencies: skill.dependencies().to_vec(),
            priority: skill.priority(),
            source: skill.source,
            path: skill.path.display().to_string(),
            directory: skill.directory().display().to_string(),
            supporting_files: skill
                .supporting_files()
                .iter()
                .map(|file| file.display().to_string())
                .collect(),
        }
    }
}

/// One executed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub skill: String,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl From<&ExecutionResult> for StepReport {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            skill: result.skill_name().to_string(),
            success: result.success,
            output: result.output.clone(),
            error: result.error.clone(),
        }
    }
}

/// Outcome of a chain run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainReport {
    pub success: bool,
    pub steps: Vec<StepReport>,
    pub skipped: Vec<String>,
    pub final_output: Option<Value>,
}

impl From<&ChainResult> for ChainReport {
    fn from(result: &ChainResult) -> Self {
        Self {
            success: result.success,
            steps: result.results.iter().map(StepReport::from).collect(),
            skipped: result.skipped.clone(),
            final_output: result.final_output.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NameArgs {
    skill_name: String,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ChainArgs {
    skill_names: Vec<String>,
    #[serde(default)]
    query: String,
}

/// Skill tools bound to one executor and its registry
#[derive(Debug, Clone)]
pub struct SkillTools {
    executor: SkillExecutor,
}

impl SkillTools {
    pub fn new(executor: SkillExecutor) -> Self {
        Self { executor }
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        self.executor.registry()
    }

    pub fn executor(&self) -> &SkillExecutor {
        &self.executor
    }

    /// Summaries of all skills
    pub fn list_skills(&self) -> Vec<SkillSummary> {
        self.executor.list_available_skills()
    }

    /// Full detail of one skill
    pub fn read_skill(&self, skill_name: &str) -> ToolOutput<SkillDetail> {
        match self.registry().get(skill_name) {
            Some(skill) => ToolOutput::Ok(SkillDetail::from(skill.as_ref())),
            None => ToolOutput::error(format!("skill '{skill_name}' does not exist")),
        }
    }

    /// Summaries of skills matching `query`
    pub fn match_skills(&self, query: &str) -> Vec<SkillSummary> {
        self.executor
            .match_query(query)
            .iter()
            .map(|skill| skill.summary())
            .collect()
    }

    /// Instruction text of one skill
    pub fn get_skill_instructions(&self, skill_name: &str) -> ToolOutput<String> {
        match self.executor.get_skill_instructions(skill_name) {
            Some(instructions) => ToolOutput::Ok(instructions),
            None => ToolOutput::error(format!("skill '{skill_name}' does not exist")),
        }
    }

    /// Run `skill_names` as a chain against a fresh context
    pub fn execute_skill_chain<S: AsRef<str>>(&self, skill_names: &[S], query: &str) -> ChainReport {
        let chain = SkillChain::from_names(
            self.executor.clone(),
            skill_names.iter().map(|name| name.as_ref().to_string()),
        );
        let mut context = ExecutionContext::new(query);
        ChainReport::from(&chain.execute(&mut context))
    }

    /// Call a tool by name with JSON arguments
    pub fn invoke(&self, tool: &str, args: Value) -> anyhow::Result<Value> {
        debug!("Invoking tool '{}' with {}", tool, args);

        let output = match tool {
            "list_skills" => serde_json::to_value(self.list_skills())?,
            "read_skill" => {
                let args: NameArgs = parse_args(tool, args)?;
                serde_json::to_value(self.read_skill(&args.skill_name))?
            }
            "match_skills" => {
                let args: QueryArgs = parse_args(tool, args)?;
                serde_json::to_value(self.match_skills(&args.query))?
            }
            "get_skill_instructions" => {
                let args: NameArgs = parse_args(tool, args)?;
                serde_json::to_value(self.get_skill_instructions(&args.skill_name))?
            }
            "execute_skill_chain" => {
                let args: ChainArgs = parse_args(tool, args)?;
                serde_json::to_value(self.execute_skill_chain(args.skill_names.as_slice(), &args.query))?
            }
            other => bail!("Unknown tool '{other}', expected one of {TOOL_NAMES:?}"),
        };

        Ok(output)
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, args: Value) -> anyhow::Result<T> {
    serde_json::from_value(args).with_context(|| format!("Invalid arguments for tool '{tool}'"))
}
