//! Staged skill pipelines with sequential, parallel and branch stages

use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::chain::ChainResult;
use crate::context::{ContextDelta, ExecutionContext, ExecutionResult};
use crate::executor::SkillExecutor;
use crate::skill::Skill;
use crate::strategy::Condition;

/// One stage of a [`SkillPipeline`]
#[derive(Clone)]
pub enum Stage {
    /// Run in order; the first failure stops the pipeline
    Sequential(Vec<String>),
    /// Run every member; failures do not stop siblings or later stages
    Parallel(Vec<String>),
    /// Pick a list by condition, then run it like [`Stage::Sequential`]
    Branch {
        /// Selects `if_true` when it holds
        condition: Arc<dyn Condition>,
        /// Names run when the condition holds
        if_true: Vec<String>,
        /// Names run otherwise
        if_false: Vec<String>,
    },
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential(names) => f.debug_tuple("Sequential").field(names).finish(),
            Self::Parallel(names) => f.debug_tuple("Parallel").field(names).finish(),
            Self::Branch {
                if_true, if_false, ..
            } => f
                .debug_struct("Branch")
                .field("if_true", if_true)
                .field("if_false", if_false)
                .finish_non_exhaustive(),
        }
    }
}

fn names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

/// Ordered list of stages run against one context.
///
/// Unknown skill names are recorded as skipped in every stage kind.
#[derive(Debug, Clone)]
pub struct SkillPipeline {
    executor: SkillExecutor,
    stages: Vec<Stage>,
}

impl SkillPipeline {
    /// Empty pipeline
    pub fn new(executor: SkillExecutor) -> Self {
        Self {
            executor,
            stages: Vec::new(),
        }
    }

    /// Append a sequential stage
    pub fn add_sequential<I, S>(&mut self, skill_names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_stage(Stage::Sequential(names(skill_names)))
    }

    /// Append a parallel stage
    pub fn add_parallel<I, S>(&mut self, skill_names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_stage(Stage::Parallel(names(skill_names)))
    }

    /// Append a branch stage
    pub fn add_branch<C, T, F, S>(&mut self, condition: C, if_true: T, if_false: F) -> &mut Self
    where
        C: Condition + 'static,
        T: IntoIterator<Item = S>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_stage(Stage::Branch {
            condition: Arc::new(condition),
            if_true: names(if_true),
            if_false: names(if_false),
        })
    }

    /// Append a prepared stage
    pub fn add_stage(&mut self, stage: Stage) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Remove all stages
    pub fn clear(&mut self) {
        self.stages.clear();
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when the pipeline has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages in order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage on the calling thread.
    ///
    /// Parallel stages run their members one after another in declaration
    /// order against the shared context.
    pub fn execute(&self, context: &mut ExecutionContext) -> ChainResult {
        info!("[{}] Running pipeline of {} stages", context.run_id, self.stages.len());
        let mut result = ChainResult::default();

        for stage in &self.stages {
            let flow = match stage {
                Stage::Sequential(names) => self.run_sequential(names, context, &mut result),
                Stage::Branch {
                    condition,
                    if_true,
                    if_false,
                } => {
                    let selected = select_branch(condition.as_ref(), if_true, if_false, context);
                    self.run_sequential(selected, context, &mut result)
                }
                Stage::Parallel(names) => {
                    for name in names {
                        if let Some(skill) = self.lookup(name, context, &mut result) {
                            result.add_result(self.executor.execute(&skill, context));
                        }
                    }
                    ControlFlow::Continue(())
                }
            };

            if flow.is_break() {
                break;
            }
        }

        result.finish()
    }

    /// Run every stage, fanning parallel stages out to blocking tasks.
    ///
    /// Each parallel member works on its own snapshot of the context. Once
    /// all members have finished, the writes of successful members are
    /// merged back in declaration order, so the later-declared member wins
    /// on conflicting keys. Must be called inside a tokio runtime.
    pub async fn execute_async(&self, context: &mut ExecutionContext) -> ChainResult {
        info!(
            "[{}] Running pipeline of {} stages (concurrent)",
            context.run_id,
            self.stages.len()
        );
        let mut result = ChainResult::default();

        for stage in &self.stages {
            let flow = match stage {
                Stage::Sequential(names) => self.run_sequential(names, context, &mut result),
                Stage::Branch {
                    condition,
                    if_true,
                    if_false,
                } => {
                    let selected = select_branch(condition.as_ref(), if_true, if_false, context);
                    self.run_sequential(selected, context, &mut result)
                }
                Stage::Parallel(names) => {
                    self.run_parallel(names, context, &mut result).await;
                    ControlFlow::Continue(())
                }
            };

            if flow.is_break() {
                break;
            }
        }

        result.finish()
    }

    fn lookup(
        &self,
        name: &str,
        context: &ExecutionContext,
        result: &mut ChainResult,
    ) -> Option<Arc<Skill>> {
        let skill = self.executor.registry().get(name);
        if skill.is_none() {
            warn!("[{}] Pipeline skipping unknown skill '{}'", context.run_id, name);
            result.add_skipped(name);
        }
        skill
    }

    fn run_sequential(
        &self,
        names: &[String],
        context: &mut ExecutionContext,
        result: &mut ChainResult,
    ) -> ControlFlow<()> {
        for name in names {
            let Some(skill) = self.lookup(name, context, result) else {
                continue;
            };

            let step = self.executor.execute(&skill, context);
            let failed = !step.success;
            result.add_result(step);
            if failed {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn run_parallel(
        &self,
        names: &[String],
        context: &mut ExecutionContext,
        result: &mut ChainResult,
    ) {
        let members: Vec<Arc<Skill>> = names
            .iter()
            .filter_map(|name| self.lookup(name, context, result))
            .collect();

        let base = Arc::new(context.clone());
        let mut tasks = JoinSet::new();

        for (slot, skill) in members.iter().enumerate() {
            let executor = self.executor.clone();
            let skill = Arc::clone(skill);
            let base = Arc::clone(&base);
            tasks.spawn_blocking(move || {
                let mut snapshot = ExecutionContext::clone(&base);
                let step = executor.execute(&skill, &mut snapshot);
                let delta = snapshot.changes_since(&base);
                (slot, step, delta)
            });
        }
        debug!("[{}] Fanned out {} parallel members", context.run_id, members.len());

        let mut slots: Vec<Option<(ExecutionResult, ContextDelta)>> = vec![None; members.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, step, delta)) => slots[slot] = Some((step, delta)),
                Err(err) => warn!("[{}] Parallel member task failed: {}", context.run_id, err),
            }
        }

        for (skill, slot) in members.into_iter().zip(slots) {
            match slot {
                Some((step, delta)) => {
                    if step.success {
                        context.apply(delta);
                    }
                    result.add_result(step);
                }
                None => {
                    let message = format!("task running skill '{}' did not complete", skill.name());
                    result.add_result(ExecutionResult::failed(skill, message));
                }
            }
        }
    }
}

fn select_branch<'a>(
    condition: &dyn Condition,
    if_true: &'a [String],
    if_false: &'a [String],
    context: &ExecutionContext,
) -> &'a [String] {
    if condition.evaluate(context) {
        if_true
    } else {
        if_false
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
    use crate::strategy::VariableEquals;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn registry(names: &[&str]) -> Arc<SkillRegistry> {
        Arc::new(
            names
                .iter()
                .map(|name| {
                    Skill::new(*name, SkillSource::User)
                        .with_description(format!("{name} skill"))
                        .with_instructions(format!("{name} instructions"))
                })
                .collect(),
        )
    }

    /// Fails skills whose name starts with "bad", echoes the name otherwise
    fn executor(names: &[&str]) -> SkillExecutor {
        SkillExecutor::with_handler(
            registry(names),
            handler_fn(|skill, _ctx| {
                if skill.name().starts_with("bad") {
                    Err(HandlerError::new(format!("{} failed", skill.name())))
                } else {
                    Ok(Value::from(skill.name()))
                }
            }),
        )
    }

    fn ran(result: &ChainResult) -> Vec<(&str, bool)> {
        result
            .results
            .iter()
            .map(|r| (r.skill_name(), r.success))
            .collect()
    }

    #[test]
    fn test_sequential_failure_stops_pipeline() {
        let mut pipeline = SkillPipeline::new(executor(&["a", "bad", "c", "d"]));
        pipeline.add_sequential(["a", "bad", "c"]).add_sequential(["d"]);

        let result = pipeline.execute(&mut ExecutionContext::default());
        assert!(!result.success);
        assert_eq!(ran(&result), [("a", true), ("bad", false)]);
        assert_eq!(result.final_output, None);
    }

    #[test]
    fn test_parallel_failure_does_not_cancel_siblings() {
        let mut pipeline = SkillPipeline::new(executor(&["bad-x", "y", "z"]));
        pipeline.add_parallel(["bad-x", "y"]).add_sequential(["z"]);

        let result = pipeline.execute(&mut ExecutionContext::default());
        assert!(!result.success);
        assert_eq!(ran(&result), [("bad-x", false), ("y", true), ("z", true)]);
        assert_eq!(result.final_output, Some(json!("z")));
    }

    #[test]
    fn test_unknown_names_are_skipped() {
        let mut pipeline = SkillPipeline::new(executor(&["a", "b"]));
        pipeline
            .add_sequential(["ghost", "a"])
            .add_parallel(["phantom", "b"]);

        let result = pipeline.execute(&mut ExecutionContext::default());
        assert!(result.success);
        assert_eq!(result.skipped, ["ghost", "phantom"]);
        assert_eq!(ran(&result), [("a", true), ("b", true)]);
    }

    #[test]
    fn test_branch_selects_by_condition() {
        let mut pipeline = SkillPipeline::new(executor(&["deep", "quick", "bad"]));
        pipeline.add_branch(VariableEquals::new("depth", "full"), ["deep"], ["quick", "bad"]);
        assert_eq!(pipeline.len(), 1);

        let mut full = ExecutionContext::default();
        full.set_variable("depth", "full");
        let result = pipeline.execute(&mut full);
        assert_eq!(ran(&result), [("deep", true)]);

        let result = pipeline.execute(&mut ExecutionContext::default());
        assert_eq!(ran(&result), [("quick", true), ("bad", false)]);
        assert!(!result.success);
    }

    #[test]
    fn test_branch_failure_stops_pipeline() {
        let mut pipeline = SkillPipeline::new(executor(&["deep", "bad", "c", "d"]));
        pipeline
            .add_branch(VariableEquals::new("depth", "full"), ["deep"], ["bad", "c"])
            .add_sequential(["d"]);

        let mut ctx = ExecutionContext::default();
        let result = pipeline.execute(&mut ctx);
        assert!(!result.success);
        assert_eq!(ran(&result), [("bad", false)]);
        assert!(ctx.result("c").is_none());
        assert!(ctx.result("d").is_none());
    }

    #[tokio::test]
    async fn test_async_branch_failure_stops_pipeline() {
        let mut pipeline = SkillPipeline::new(executor(&["deep", "bad", "c", "d"]));
        pipeline
            .add_branch(VariableEquals::new("depth", "full"), ["deep"], ["bad", "c"])
            .add_parallel(["d"]);

        let result = pipeline.execute_async(&mut ExecutionContext::default()).await;
        assert!(!result.success);
        assert_eq!(ran(&result), [("bad", false)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_parallel_keeps_declaration_order() {
        let handler = handler_fn(|skill, ctx| {
            // The first-declared member finishes last.
            if skill.name() == "slow" {
                std::thread::sleep(Duration::from_millis(50));
            }
            ctx.set_variable("winner", skill.name());
            ctx.set_variable(format!("seen_{}", skill.name()), true);
            if skill.name() == "bad" {
                return Err("bad failed".into());
            }
            Ok(Value::from(skill.name()))
        });
        let exec = SkillExecutor::with_handler(registry(&["slow", "fast", "bad", "after"]), handler);

        let mut pipeline = SkillPipeline::new(exec);
        pipeline
            .add_parallel(["slow", "ghost", "fast", "bad"])
            .add_sequential(["after"]);

        let mut ctx = ExecutionContext::new("q");
        let result = pipeline.execute_async(&mut ctx).await;

        assert!(!result.success);
        assert_eq!(
            ran(&result),
            [("slow", true), ("fast", true), ("bad", false), ("after", true)]
        );
        assert_eq!(result.skipped, ["ghost"]);

        assert_eq!(ctx.result("slow"), Some(&json!("slow")));
        assert_eq!(ctx.result("fast"), Some(&json!("fast")));
        assert!(ctx.result("bad").is_none());
        assert!(ctx.variable("seen_bad").is_none());
        assert_eq!(ctx.variable("seen_slow"), Some(&json!(true)));
        assert_eq!(ctx.variable("winner"), Some(&json!("after")));
    }

    #[tokio::test]
    async fn test_async_merge_prefers_later_member() {
        let handler = handler_fn(|skill, ctx| {
            ctx.set_variable("owner", skill.name());
            Ok(Value::Null)
        });
        let exec = SkillExecutor::with_handler(registry(&["first", "second"]), handler);

        let mut pipeline = SkillPipeline::new(exec);
        pipeline.add_parallel(["first", "second"]);

        let mut ctx = ExecutionContext::default();
        let result = pipeline.execute_async(&mut ctx).await;

        assert!(result.success);
        assert_eq!(ctx.variable("owner"), Some(&json!("second")));
    }

    #[tokio::test]
    async fn test_async_sequential_stops_on_failure() {
        let mut pipeline = SkillPipeline::new(executor(&["a", "bad", "c"]));
        pipeline.add_sequential(["a", "bad"]).add_parallel(["c"]);

        let result = pipeline.execute_async(&mut ExecutionContext::default()).await;
        assert_eq!(ran(&result), [("a", true), ("bad", false)]);
    }
}
