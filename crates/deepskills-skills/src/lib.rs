//! deepskills skills system
//!
//! Skills are directories holding a `SKILL.md` file: YAML frontmatter with
//! the skill metadata followed by Markdown instructions for the agent.
//!
//! ## Features
//!
//! - Discovery across a user-wide and a project-level skills directory
//! - Override-aware registry (project beats user, then priority)
//! - Trigger keyword index for substring matching of free-text queries
//! - Depth-first dependency resolution with cycle suppression
//! - Pluggable execution handler, fail-fast chains and staged pipelines
//!   with optional concurrent fan-out
//!
//! ## Flow
//!
//! query → [`SkillRegistry::match_query`] → [`SkillExecutor`] (resolves
//! dependencies) → [`ExecutionResult`]s, or an explicit [`SkillChain`] /
//! [`SkillPipeline`] → [`ChainResult`].

#![warn(missing_docs)]

pub mod chain;
pub mod context;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod handler;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod skill;
pub mod strategy;

pub use chain::{ChainResult, ChainStep, SkillChain};
pub use context::{ContextDelta, ExecutionContext, ExecutionResult};
pub use discovery::SkillDiscovery;
pub use error::{HandlerError, Result, SkillError};
pub use executor::SkillExecutor;
pub use handler::{handler_fn, InstructionsHandler, SkillHandler};
pub use loader::{list_skills_in_dir, load_skill, load_skill_from_dir};
pub use pipeline::{SkillPipeline, Stage};
pub use registry::SkillRegistry;
pub use skill::{Skill, SkillMetadata, SkillSource, SkillSummary};
pub use strategy::{Always, Condition, HasResult, Not, Template, Transform, VariableEquals};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ChainResult, ExecutionContext, ExecutionResult, Skill, SkillChain, SkillExecutor,
        SkillPipeline, SkillRegistry, SkillSource,
    };
}
