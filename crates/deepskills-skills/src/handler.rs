//! Execution handlers: what "running a skill" means

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::HandlerError;
use crate::skill::Skill;

/// Runs one skill against the current context.
///
/// Returning `Err` marks the step as failed; the executor never lets the
/// error escape a chain or pipeline.
pub trait SkillHandler: Send + Sync {
    /// Execute `skill`, returning its output
    fn handle(&self, skill: &Skill, context: &mut ExecutionContext)
        -> Result<Value, HandlerError>;
}

/// Default handler: the output is the skill's instruction text
#[derive(Debug, Clone, Copy, Default)]
pub struct InstructionsHandler;

impl SkillHandler for InstructionsHandler {
    fn handle(&self, skill: &Skill, _context: &mut ExecutionContext) -> Result<Value, HandlerError> {
        Ok(Value::String(skill.instructions.clone()))
    }
}

impl<F> SkillHandler for F
where
    F: Fn(&Skill, &mut ExecutionContext) -> Result<Value, HandlerError> + Send + Sync,
{
    fn handle(&self, skill: &Skill, context: &mut ExecutionContext) -> Result<Value, HandlerError> {
        self(skill, context)
    }
}

/// Pin a closure to the handler signature so its argument types are inferred
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&Skill, &mut ExecutionContext) -> Result<Value, HandlerError> + Send + Sync,
{
    f
}
