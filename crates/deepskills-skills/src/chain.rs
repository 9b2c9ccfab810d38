//! Explicit fail-fast skill chains

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::{ExecutionContext, ExecutionResult};
use crate::executor::SkillExecutor;
use crate::skill::Skill;
use crate::strategy::{Condition, Transform};

/// One step of a [`SkillChain`]
#[derive(Clone)]
pub struct ChainStep {
    /// Skill to run
    pub skill_name: String,
    /// Step runs only when this holds; `None` means always
    pub condition: Option<Arc<dyn Condition>>,
    /// Applied to the output of a successful step
    pub transform: Option<Arc<dyn Transform>>,
}

impl ChainStep {
    /// Unconditional step without transform
    pub fn new(skill_name: impl Into<String>) -> Self {
        Self {
            skill_name: skill_name.into(),
            condition: None,
            transform: None,
        }
    }

    /// Attach a condition
    pub fn when(mut self, condition: impl Condition + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Attach a transform
    pub fn transform_with(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    fn should_run(&self, context: &ExecutionContext) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.evaluate(context))
    }
}

impl std::fmt::Debug for ChainStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainStep")
            .field("skill_name", &self.skill_name)
            .field("conditional", &self.condition.is_some())
            .field("transformed", &self.transform.is_some())
            .finish()
    }
}

/// Aggregate outcome of a chain or pipeline run
#[derive(Debug, Clone)]
pub struct ChainResult {
    /// Executed steps in order
    pub results: Vec<ExecutionResult>,
    /// False iff any step failed
    pub success: bool,
    /// Names whose step was skipped
    pub skipped: Vec<String>,
    /// Output of the last appended step
    pub final_output: Option<Value>,
}

impl Default for ChainResult {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            success: true,
            skipped: Vec::new(),
            final_output: None,
        }
    }
}

impl ChainResult {
    /// Append a step outcome; a failure marks the aggregate failed
    pub fn add_result(&mut self, result: ExecutionResult) {
        if !result.success {
            self.success = false;
        }
        self.results.push(result);
    }

    /// Record a skipped name
    pub fn add_skipped(&mut self, name: impl Into<String>) {
        self.skipped.push(name.into());
    }

    /// Set `final_output` from the last step and return the aggregate
    pub fn finish(mut self) -> Self {
        self.final_output = self.results.last().and_then(|last| last.output.clone());
        self
    }

    /// Outputs of successful steps, in order
    pub fn outputs(&self) -> impl Iterator<Item = &Value> {
        self.results.iter().filter_map(|r| r.output.as_ref())
    }
}

/// Ordered list of steps run against one context, stopping at the first failure
#[derive(Debug, Clone)]
pub struct SkillChain {
    executor: SkillExecutor,
    steps: Vec<ChainStep>,
}

impl SkillChain {
    /// Empty chain
    pub fn new(executor: SkillExecutor) -> Self {
        Self {
            executor,
            steps: Vec::new(),
        }
    }

    /// Chain of unconditional steps
    pub fn from_names<I, S>(executor: SkillExecutor, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut chain = Self::new(executor);
        for name in names {
            chain.add(name);
        }
        chain
    }

    /// Append an unconditional step
    pub fn add(&mut self, skill_name: impl Into<String>) -> &mut Self {
        self.add_step(ChainStep::new(skill_name))
    }

    /// Append a conditional step
    pub fn add_when(
        &mut self,
        skill_name: impl Into<String>,
        condition: impl Condition + 'static,
    ) -> &mut Self {
        self.add_step(ChainStep::new(skill_name).when(condition))
    }

    /// Append a step whose output is transformed on success
    pub fn add_with_transform(
        &mut self,
        skill_name: impl Into<String>,
        transform: impl Transform + 'static,
    ) -> &mut Self {
        self.add_step(ChainStep::new(skill_name).transform_with(transform))
    }

    /// Append a prepared step
    pub fn add_step(&mut self, step: ChainStep) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Remove all steps
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the chain has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in order
    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    /// Run the chain.
    ///
    /// An unknown skill name yields a failed step and stops the chain.
    pub fn execute(&self, context: &mut ExecutionContext) -> ChainResult {
        info!("[{}] Running chain of {} steps", context.run_id, self.steps.len());
        let mut chain_result = ChainResult::default();

        for step in &self.steps {
            if !step.should_run(context) {
                debug!("[{}] Condition false, skipping '{}'", context.run_id, step.skill_name);
                chain_result.add_skipped(step.skill_name.as_str());
                continue;
            }

            let Some(skill) = self.executor.registry().get(&step.skill_name) else {
                warn!("[{}] Chain references unknown skill '{}'", context.run_id, step.skill_name);
                chain_result.add_result(ExecutionResult::failed(
                    Arc::new(Skill::placeholder(step.skill_name.as_str())),
                    format!("skill '{}' does not exist", step.skill_name),
                ));
                break;
            };

            let mut result = self.executor.execute(&skill, context);

            if let Some(transform) = step.transform.as_ref().filter(|_| result.success) {
                if let Some(output) = result.output.take() {
                    let transformed = transform.transform(output, context);
                    context.set_result(skill.name(), transformed.clone());
                    result.output = Some(transformed);
                }
            }

            let failed = !result.success;
            chain_result.add_result(result);
            if failed {
                break;
            }
        }

        chain_result.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::handler_fn;
    use crate::registry::SkillRegistry;
    use crate::skill::SkillSource;
    use crate::strategy::{HasResult, Template, VariableEquals};
    use serde_json::json;

    fn registry(names: &[&str]) -> Arc<SkillRegistry> {
        Arc::new(
            names
                .iter()
                .map(|name| {
                    Skill::new(*name, SkillSource::Project)
                        .with_description(format!("{name} skill"))
                        .with_instructions(format!("{name} instructions"))
                })
                .collect(),
        )
    }

    fn failing_on(registry: Arc<SkillRegistry>, bad: &'static str) -> SkillExecutor {
        SkillExecutor::with_handler(
            registry,
            handler_fn(move |skill, _ctx| {
                if skill.name() == bad {
                    Err(HandlerError::new(format!("{bad} failed")))
                } else {
                    Ok(json!(skill.name()))
                }
            }),
        )
    }

    #[test]
    fn test_chain_stops_on_first_failure() {
        let exec = failing_on(registry(&["x", "y", "z"]), "y");
        let chain = SkillChain::from_names(exec, ["x", "y", "z"]);
        let mut ctx = ExecutionContext::default();

        let result = chain.execute(&mut ctx);
        assert!(!result.success);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[1].error.as_deref(), Some("y failed"));
        assert_eq!(result.final_output, None);
        assert!(!ctx.results.contains_key("z"));
    }

    #[test]
    fn test_missing_skill_is_synthetic_failure() {
        let chain = SkillChain::from_names(SkillExecutor::new(registry(&["a"])), ["a", "ghost", "a"]);
        let mut ctx = ExecutionContext::default();

        let result = chain.execute(&mut ctx);
        assert!(!result.success);
        assert_eq!(result.results.len(), 2);

        let ghost = &result.results[1];
        assert_eq!(ghost.skill_name(), "ghost");
        assert_eq!(ghost.error.as_deref(), Some("skill 'ghost' does not exist"));
        assert!(ghost.skill.instructions.is_empty());
    }

    #[test]
    fn test_conditions_skip_steps() {
        let mut chain = SkillChain::new(SkillExecutor::new(registry(&["a", "b", "c"])));
        chain
            .add("a")
            .add_when("b", VariableEquals::new("mode", "full"))
            .add_when("c", HasResult("a".into()));
        let mut ctx = ExecutionContext::new("q");

        let result = chain.execute(&mut ctx);
        assert!(result.success);
        assert_eq!(result.skipped, ["b"]);
        let ran: Vec<_> = result.results.iter().map(ExecutionResult::skill_name).collect();
        assert_eq!(ran, ["a", "c"]);
        assert_eq!(result.final_output, Some(json!("c instructions")));
    }

    #[test]
    fn test_transform_rewrites_step_and_context() {
        let mut chain = SkillChain::new(SkillExecutor::new(registry(&["a", "b"])));
        chain
            .add_with_transform("a", Template::new("<{output}>"))
            .add_with_transform("b", |output: Value, ctx: &ExecutionContext| {
                json!({ "query": ctx.query, "body": output })
            });
        let mut ctx = ExecutionContext::new("topic");

        let result = chain.execute(&mut ctx);
        assert_eq!(result.results[0].output, Some(json!("<a instructions>")));
        assert_eq!(ctx.result("a"), Some(&json!("<a instructions>")));
        assert_eq!(
            result.final_output,
            Some(json!({ "query": "topic", "body": "b instructions" }))
        );
        assert_eq!(chain.len(), 2);

        chain.clear();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_empty_chain_succeeds() {
        let chain = SkillChain::new(SkillExecutor::new(registry(&[])));
        let result = chain.execute(&mut ExecutionContext::default());
        assert!(result.success);
        assert!(result.results.is_empty());
        assert!(result.final_output.is_none());
    }
}
