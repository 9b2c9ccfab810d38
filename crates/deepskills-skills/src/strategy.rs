//! Step conditions and output transforms
//!
//! Named strategies cover the common cases and can be serialized; any
//! closure with the right signature works too.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ExecutionContext;

/// Decides whether a step or branch runs
pub trait Condition: Send + Sync {
    /// Evaluate against the current context
    fn evaluate(&self, context: &ExecutionContext) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&ExecutionContext) -> bool + Send + Sync,
{
    fn evaluate(&self, context: &ExecutionContext) -> bool {
        self(context)
    }
}

/// Rewrites a successful step's output
pub trait Transform: Send + Sync {
    /// Produce the new output
    fn transform(&self, output: Value, context: &ExecutionContext) -> Value;
}

impl<F> Transform for F
where
    F: Fn(Value, &ExecutionContext) -> Value + Send + Sync,
{
    fn transform(&self, output: Value, context: &ExecutionContext) -> Value {
        self(output, context)
    }
}

/// Always true
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Always;

impl Condition for Always {
    fn evaluate(&self, _context: &ExecutionContext) -> bool {
        true
    }
}

/// True once the named skill has produced a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasResult(pub String);

impl Condition for HasResult {
    fn evaluate(&self, context: &ExecutionContext) -> bool {
        context.results.contains_key(&self.0)
    }
}

/// True when a variable holds exactly `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableEquals {
    /// Variable name
    pub name: String,
    /// Expected value
    pub value: Value,
}

impl VariableEquals {
    /// Compare variable `name` with `value`
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Condition for VariableEquals {
    fn evaluate(&self, context: &ExecutionContext) -> bool {
        context.variable(&self.name) == Some(&self.value)
    }
}

/// Negates another condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Not<C>(pub C);

impl<C: Condition> Condition for Not<C> {
    fn evaluate(&self, context: &ExecutionContext) -> bool {
        !self.0.evaluate(context)
    }
}

/// Renders a string template.
///
/// `{output}` becomes the step output (strings verbatim, other values as
/// JSON) and `{query}` the run's query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template(pub String);

impl Template {
    /// Template from text
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }
}

impl Transform for Template {
    fn transform(&self, output: Value, context: &ExecutionContext) -> Value {
        let rendered_output = match output {
            Value::String(text) => text,
            other => other.to_string(),
        };
        // One pass, so substituted text is never rescanned
        let Ok(placeholder) = Regex::new(r"\{(output|query)\}") else {
            return Value::String(self.0.clone());
        };
        let rendered = placeholder.replace_all(&self.0, |caps: &Captures| match &caps[1] {
            "output" => rendered_output.clone(),
            _ => context.query.clone(),
        });
        Value::String(rendered.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_conditions() {
        let mut ctx = ExecutionContext::new("q");
        ctx.set_variable("kind", "research");
        ctx.set_result("fetch", json!("data"));

        assert!(Always.evaluate(&ctx));
        assert!(HasResult("fetch".into()).evaluate(&ctx));
        assert!(!HasResult("other".into()).evaluate(&ctx));
        assert!(VariableEquals::new("kind", "research").evaluate(&ctx));
        assert!(!VariableEquals::new("kind", "local").evaluate(&ctx));
        assert!(Not(VariableEquals::new("kind", "local")).evaluate(&ctx));
    }

    #[test]
    fn test_closure_condition() {
        let ctx = ExecutionContext::new("long query text");
        let long_query = |ctx: &ExecutionContext| ctx.query.len() > 5;
        assert!(long_query.evaluate(&ctx));
    }

    #[test]
    fn test_template_transform() {
        let ctx = ExecutionContext::new("quantum");
        let template = Template::new("[{query}] {output}");
        assert_eq!(template.transform(json!("notes"), &ctx), json!("[quantum] notes"));
        assert_eq!(template.transform(json!({"n": 1}), &ctx), json!("[quantum] {\"n\":1}"));
    }

    #[test]
    fn test_template_leaves_placeholders_inside_output() {
        let ctx = ExecutionContext::new("SECRET");
        let template = Template::new("<{output}>");
        assert_eq!(
            template.transform(json!("literal {query} in body"), &ctx),
            json!("<literal {query} in body>")
        );

        let echo = Template::new("{query}|{output}|{other}");
        assert_eq!(echo.transform(json!("{output}"), &ctx), json!("SECRET|{output}|{other}"));
    }
}
