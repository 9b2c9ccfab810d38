//! Per-run execution state and per-step results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::skill::Skill;

/// Mutable state threaded through one execution run.
///
/// Created per top-level invocation and passed by `&mut` to every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Identifier used to correlate log lines of one run
    pub run_id: Uuid,
    /// Original user query
    pub query: String,
    /// Values steps pass to each other
    pub variables: HashMap<String, Value>,
    /// Last output of each executed skill, by skill name
    pub results: HashMap<String, Value>,
    /// Free-form caller metadata
    pub metadata: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Fresh context for `query`
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query: query.into(),
            variables: HashMap::new(),
            results: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Record the output of a skill
    pub fn set_result(&mut self, skill_name: impl Into<String>, output: Value) {
        self.results.insert(skill_name.into(), output);
    }

    /// Output of a skill, if it ran
    pub fn result(&self, skill_name: &str) -> Option<&Value> {
        self.results.get(skill_name)
    }

    /// Set a variable
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Get a variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Set a metadata entry
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Entries added or changed relative to `base`.
    ///
    /// Removals are not tracked.
    pub fn changes_since(&self, base: &ExecutionContext) -> ContextDelta {
        ContextDelta {
            variables: diff(&self.variables, &base.variables),
            results: diff(&self.results, &base.results),
            metadata: diff(&self.metadata, &base.metadata),
        }
    }

    /// Write every entry of `delta` into this context, overwriting clashes
    pub fn apply(&mut self, delta: ContextDelta) {
        self.variables.extend(delta.variables);
        self.results.extend(delta.results);
        self.metadata.extend(delta.metadata);
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Writes made by one step against a snapshot of the context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextDelta {
    /// Added or changed variables
    pub variables: HashMap<String, Value>,
    /// Added or changed results
    pub results: HashMap<String, Value>,
    /// Added or changed metadata
    pub metadata: HashMap<String, Value>,
}

impl ContextDelta {
    /// True when nothing changed
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.results.is_empty() && self.metadata.is_empty()
    }
}

fn diff(current: &HashMap<String, Value>, base: &HashMap<String, Value>) -> HashMap<String, Value> {
    current
        .iter()
        .filter(|(key, value)| base.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Outcome of executing one skill
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Skill that ran (a placeholder when the name was unknown)
    pub skill: Arc<Skill>,
    /// Whether the handler succeeded
    pub success: bool,
    /// Handler output, present on success
    pub output: Option<Value>,
    /// Failure message, present iff `success` is false
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Successful step
    pub fn succeeded(skill: Arc<Skill>, output: Value) -> Self {
        Self {
            skill,
            success: true,
            output: Some(output),
            error: None,
        }
    }

    /// Failed step
    pub fn failed(skill: Arc<Skill>, error: impl Into<String>) -> Self {
        Self {
            skill,
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Name of the skill that ran
    pub fn skill_name(&self) -> &str {
        self.skill.name()
    }
}
