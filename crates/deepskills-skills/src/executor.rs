//! Skill executor: dependency resolution and handler invocation

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::{ExecutionContext, ExecutionResult};
use crate::handler::{InstructionsHandler, SkillHandler};
use crate::registry::SkillRegistry;
use crate::skill::{Skill, SkillSummary};

/// Runs skills from a shared registry through a pluggable handler.
///
/// Cloning is cheap: both the registry and the handler are shared.
#[derive(Clone)]
pub struct SkillExecutor {
    registry: Arc<SkillRegistry>,
    handler: Arc<dyn SkillHandler>,
}

impl SkillExecutor {
    /// Executor using [`InstructionsHandler`]
    pub fn new(registry: Arc<SkillRegistry>) -> Self {
        Self::with_shared_handler(registry, Arc::new(InstructionsHandler))
    }

    /// Executor using a custom handler
    pub fn with_handler(registry: Arc<SkillRegistry>, handler: impl SkillHandler + 'static) -> Self {
        Self::with_shared_handler(registry, Arc::new(handler))
    }

    /// Executor using an already shared handler
    pub fn with_shared_handler(registry: Arc<SkillRegistry>, handler: Arc<dyn SkillHandler>) -> Self {
        Self { registry, handler }
    }

    /// Replace the handler
    pub fn set_handler(&mut self, handler: impl SkillHandler + 'static) {
        self.handler = Arc::new(handler);
    }

    /// Current handler
    pub fn handler(&self) -> &Arc<dyn SkillHandler> {
        &self.handler
    }

    /// Registry this executor resolves names against
    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    /// Skills matching `query`, ranked
    pub fn match_query(&self, query: &str) -> Vec<Arc<Skill>> {
        self.registry.match_query(query)
    }

    /// Dependency closure of `skill`, dependencies first, `skill` last.
    ///
    /// Unknown dependency names are skipped and every name appears once,
    /// so cycles terminate.
    pub fn resolve_dependencies(&self, skill: &Arc<Skill>) -> Vec<Arc<Skill>> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.visit(skill, &mut visited, &mut order);
        order
    }

    fn visit(&self, skill: &Arc<Skill>, visited: &mut HashSet<String>, order: &mut Vec<Arc<Skill>>) {
        if !visited.insert(skill.name().to_string()) {
            return;
        }

        for dependency in skill.dependencies() {
            if visited.contains(dependency) {
                continue;
            }
            match self.registry.get(dependency) {
                Some(dep) => self.visit(&dep, visited, order),
                None => debug!(
                    "Skill '{}' depends on unknown skill '{}', skipping",
                    skill.name(),
                    dependency
                ),
            }
        }

        order.push(Arc::clone(skill));
    }

    /// Run one skill through the handler.
    ///
    /// Handler errors and panics become a failed result; on success the
    /// output is stored in `context.results`.
    pub fn execute(&self, skill: &Arc<Skill>, context: &mut ExecutionContext) -> ExecutionResult {
        debug!("[{}] Executing skill '{}'", context.run_id, skill.name());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(skill, context)));

        match outcome {
            Ok(Ok(output)) => {
                context.set_result(skill.name(), output.clone());
                ExecutionResult::succeeded(Arc::clone(skill), output)
            }
            Ok(Err(err)) => {
                warn!("[{}] Skill '{}' failed: {}", context.run_id, skill.name(), err);
                ExecutionResult::failed(Arc::clone(skill), err.message())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("[{}] Skill '{}' panicked: {}", context.run_id, skill.name(), message);
                ExecutionResult::failed(Arc::clone(skill), message)
            }
        }
    }

    /// Run `skill` after its dependency closure, stopping at the first failure
    pub fn execute_with_dependencies(
        &self,
        skill: &Arc<Skill>,
        context: &mut ExecutionContext,
    ) -> Vec<ExecutionResult> {
        let mut results = Vec::new();

        for step in self.resolve_dependencies(skill) {
            let result = self.execute(&step, context);
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }

        results
    }

    /// Match `query` and run the top `max_skills` skills with their dependencies.
    ///
    /// Sets `context.query`. Each matched skill runs fail-fast on its own
    /// closure; a failure does not prevent the next matched skill.
    pub fn auto_execute(
        &self,
        query: &str,
        context: &mut ExecutionContext,
        max_skills: usize,
    ) -> Vec<ExecutionResult> {
        context.query = query.to_string();

        let matched = self.match_query(query);
        info!(
            "[{}] Auto-executing {} of {} matched skills",
            context.run_id,
            matched.len().min(max_skills),
            matched.len()
        );

        matched
            .iter()
            .take(max_skills)
            .flat_map(|skill| self.execute_with_dependencies(skill, context))
            .collect()
    }

    /// Instruction text of a registered skill
    pub fn get_skill_instructions(&self, name: &str) -> Option<String> {
        self.registry.get(name).map(|skill| skill.instructions.clone())
    }

    /// Summaries of every registered skill, ranked
    pub fn list_available_skills(&self) -> Vec<SkillSummary> {
        self.registry.get_all().iter().map(|skill| skill.summary()).collect()
    }
}

impl std::fmt::Debug for SkillExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillExecutor")
            .field("skills", &self.registry.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::handler_fn;
    use crate::skill::SkillSource;
    use serde_json::{json, Value};

    fn skill(name: &str, deps: &[&str]) -> Skill {
        Skill::new(name, SkillSource::Project)
            .with_description(format!("{name} skill"))
            .with_dependencies(deps.iter().copied())
            .with_instructions(format!("do {name}"))
    }

    fn executor(skills: Vec<Skill>) -> SkillExecutor {
        SkillExecutor::new(Arc::new(skills.into_iter().collect()))
    }

    fn order(executor: &SkillExecutor, name: &str) -> Vec<String> {
        let target = executor.registry().get(name).unwrap();
        executor
            .resolve_dependencies(&target)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    #[test]
    fn test_resolve_linear_chain() {
        let exec = executor(vec![skill("a", &["b"]), skill("b", &["c"]), skill("c", &[])]);
        assert_eq!(order(&exec, "a"), ["c", "b", "a"]);
    }

    #[test]
    fn test_resolve_cycle_terminates() {
        let exec = executor(vec![skill("a", &["b"]), skill("b", &["a"])]);
        assert_eq!(order(&exec, "a"), ["b", "a"]);
        assert_eq!(order(&exec, "b"), ["a", "b"]);
    }

    #[test]
    fn test_resolve_diamond_and_unknown() {
        let exec = executor(vec![
            skill("top", &["left", "right", "ghost"]),
            skill("left", &["base"]),
            skill("right", &["base"]),
            skill("base", &[]),
        ]);
        assert_eq!(order(&exec, "top"), ["base", "left", "right", "top"]);
    }

    #[test]
    fn test_default_handler_returns_instructions() {
        let exec = executor(vec![skill("greet", &[])]);
        let target = exec.registry().get("greet").unwrap();
        let mut ctx = ExecutionContext::new("hi");

        let result = exec.execute(&target, &mut ctx);
        assert!(result.success);
        assert_eq!(result.output, Some(json!("do greet")));
        assert_eq!(ctx.result("greet"), Some(&json!("do greet")));
    }

    #[test]
    fn test_handler_error_and_panic_become_failures() {
        let registry: Arc<SkillRegistry> =
            Arc::new([skill("bad", &[]), skill("boom", &[])].into_iter().collect());
        let exec = SkillExecutor::with_handler(
            registry,
            handler_fn(|skill, _ctx| match skill.name() {
                "bad" => Err(HandlerError::new("no network")),
                _ => panic!("kaboom"),
            }),
        );
        let mut ctx = ExecutionContext::default();

        let bad = exec.execute(&exec.registry().get("bad").unwrap(), &mut ctx);
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("no network"));
        assert!(bad.output.is_none());

        let boom = exec.execute(&exec.registry().get("boom").unwrap(), &mut ctx);
        assert!(!boom.success);
        assert!(boom.error.unwrap().contains("kaboom"));
        assert!(ctx.results.is_empty());
    }

    #[test]
    fn test_dependencies_stop_at_first_failure() {
        let registry: Arc<SkillRegistry> = Arc::new(
            [skill("a", &["b"]), skill("b", &["c"]), skill("c", &[])]
                .into_iter()
                .collect(),
        );
        let exec = SkillExecutor::with_handler(
            registry,
            handler_fn(|skill, _ctx| {
                if skill.name() == "b" {
                    Err("b broke".into())
                } else {
                    Ok(Value::from(skill.name()))
                }
            }),
        );
        let mut ctx = ExecutionContext::default();

        let results = exec.execute_with_dependencies(&exec.registry().get("a").unwrap(), &mut ctx);
        let names: Vec<_> = results.iter().map(|r| (r.skill_name(), r.success)).collect();
        assert_eq!(names, [("c", true), ("b", false)]);
        assert!(!ctx.results.contains_key("a"));
    }

    #[test]
    fn test_auto_execute_respects_limit() {
        let exec = executor(vec![
            skill("first", &["helper"]).with_triggers(["data"]).with_priority(9),
            skill("second", &[]).with_triggers(["data"]).with_priority(5),
            skill("third", &[]).with_triggers(["data"]).with_priority(1),
            skill("helper", &[]),
        ]);
        let mut ctx = ExecutionContext::default();

        let results = exec.auto_execute("crunch the DATA", &mut ctx, 2);
        let names: Vec<_> = results.iter().map(ExecutionResult::skill_name).collect();
        assert_eq!(names, ["helper", "first", "second"]);
        assert_eq!(ctx.query, "crunch the DATA");
    }

    #[test]
    fn test_set_handler_and_listing() {
        let mut exec = executor(vec![skill("echo", &[]).with_priority(3), skill("other", &[])]);
        exec.set_handler(handler_fn(|_skill, ctx| Ok(Value::from(ctx.query.clone()))));

        let mut ctx = ExecutionContext::new("ping");
        let result = exec.execute(&exec.registry().get("echo").unwrap(), &mut ctx);
        assert_eq!(result.output, Some(json!("ping")));

        let summaries = exec.list_available_skills();
        assert_eq!(summaries[0].name, "echo");
        assert_eq!(summaries.len(), 2);
        assert_eq!(exec.get_skill_instructions("other").as_deref(), Some("do other"));
        assert!(exec.get_skill_instructions("ghost").is_none());
    }
}
