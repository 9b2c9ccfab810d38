//! deepskills agent
//!
//! Ties the skills registry, the memory store and prompt assembly together
//! behind [`SkillAgent`], configured through layered [`Config`] files.

pub mod agent;
pub mod config;
pub mod prompt;
pub mod tools;

pub use agent::{MatchedSkill, ProcessReport, SkillAgent};
pub use config::Config;
pub use prompt::{SkillsPromptBuilder, BASE_SYSTEM_PROMPT};
pub use tools::{ChainReport, SkillDetail, SkillTools, StepReport, ToolOutput, TOOL_NAMES};
