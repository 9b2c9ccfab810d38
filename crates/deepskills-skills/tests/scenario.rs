//! End-to-end tests: skills on disk through discovery, registry and chains

#![allow(clippy::unwrap_used, clippy::expect_used)]

use deepskills_skills::prelude::*;
use deepskills_skills::{SkillDiscovery, SkillPipeline};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn write_skill(root: &Path, name: &str, frontmatter: &str, body: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("Failed to create skill dir");
    fs::write(
        dir.join("SKILL.md"),
        format!("---\nname: {name}\n{frontmatter}\n---\n{body}\n"),
    )
    .expect("Failed to write SKILL.md");
}

fn research_workspace() -> (tempfile::TempDir, tempfile::TempDir) {
    let user = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();

    write_skill(
        project.path(),
        "web-research",
        "description: Research a topic on the web\ntriggers: [research]\npriority: 10",
        "Search the web and collect sources.",
    );
    write_skill(
        project.path(),
        "summarize",
        "description: Summarize collected material\ntriggers: [summarize]\npriority: 5",
        "Write a short summary.",
    );
    // Shadowed by the project copy
    write_skill(
        user.path(),
        "summarize",
        "description: Old summarizer\ntriggers: [summarize, tldr]\npriority: 99",
        "Old summary instructions.",
    );

    (user, project)
}

fn load(user: &Path, project: &Path) -> Arc<SkillRegistry> {
    let mut registry = SkillRegistry::new();
    registry
        .load_from_discovery(&SkillDiscovery::new(user, project))
        .expect("Failed to load skills");
    Arc::new(registry)
}

#[test]
fn test_research_then_summarize() {
    let (user, project) = research_workspace();
    let registry = load(user.path(), project.path());

    assert_eq!(registry.len(), 2);
    let summarize = registry.get("summarize").unwrap();
    assert_eq!(summarize.source, SkillSource::Project);
    assert!(registry.match_query("give me a tldr").is_empty());

    let matched: Vec<_> = registry
        .match_query("please research this")
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(matched, ["web-research"]);

    let executor = SkillExecutor::new(Arc::clone(&registry));
    let chain = SkillChain::from_names(executor, ["web-research", "summarize"]);
    let mut ctx = ExecutionContext::new("please research this");

    let result = chain.execute(&mut ctx);
    assert!(result.success);
    assert_eq!(result.results.len(), 2);
    assert_eq!(
        result.results[0].output,
        Some(json!("Search the web and collect sources."))
    );
    assert_eq!(result.final_output, Some(json!("Write a short summary.")));
    assert_eq!(ctx.results.len(), 2);
}

#[test]
fn test_dependencies_declared_on_disk() {
    let root = tempfile::tempdir().unwrap();
    let project = root.path().join("project");
    write_skill(
        &project,
        "report",
        "description: Build a report\ntriggers: [report]\ndependencies: [fetch, ghost]",
        "Assemble the report.",
    );
    write_skill(
        &project,
        "fetch",
        "description: Fetch data\ndependencies: [report]",
        "Fetch the data.",
    );

    let registry = load(&root.path().join("user"), &project);
    let executor = SkillExecutor::new(registry);
    let mut ctx = ExecutionContext::default();

    let results = executor.auto_execute("weekly report please", &mut ctx, 3);
    let names: Vec<_> = results.iter().map(|r| r.skill_name()).collect();
    assert_eq!(names, ["fetch", "report"]);
    assert!(results.iter().all(|r| r.success));
}

#[tokio::test]
async fn test_pipeline_over_loaded_skills() {
    let (user, project) = research_workspace();
    let executor = SkillExecutor::new(load(user.path(), project.path()));

    let mut pipeline = SkillPipeline::new(executor);
    pipeline
        .add_parallel(["web-research", "missing"])
        .add_sequential(["summarize"]);

    let mut ctx = ExecutionContext::new("research rust");
    let result = pipeline.execute_async(&mut ctx).await;

    assert!(result.success);
    assert_eq!(result.skipped, ["missing"]);
    assert_eq!(result.final_output, Some(json!("Write a short summary.")));
    assert!(ctx.result("web-research").is_some());
}

/// Deterministic pseudo-random register/unregister churn
#[test]
fn test_trigger_index_matches_registry_after_churn() {
    let names = ["alpha", "beta", "gamma", "delta"];
    let triggers = ["red", "green", "blue", "bluegreen"];
    let mut registry = SkillRegistry::new();
    let mut seed: u64 = 0x5eed;

    for round in 0..200 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let name = names[(seed >> 33) as usize % names.len()];
        let trigger = triggers[(seed >> 40) as usize % triggers.len()];

        if (seed >> 50) % 4 == 0 {
            registry.unregister(name);
        } else {
            let source = if (seed >> 20) % 2 == 0 {
                SkillSource::User
            } else {
                SkillSource::Project
            };
            registry.register(
                Skill::new(name, source)
                    .with_description("churn")
                    .with_triggers([trigger])
                    .with_priority(round % 7),
            );
        }

        for trigger in triggers {
            let expected: Vec<_> = registry
                .iter()
                .filter(|s| s.triggers().iter().any(|t| trigger.contains(t.as_str())))
                .map(|s| s.name().to_string())
                .collect();
            let mut found: Vec<_> = registry
                .match_query(trigger)
                .iter()
                .map(|s| s.name().to_string())
                .collect();
            found.sort();
            let mut expected = expected;
            expected.sort();
            assert_eq!(found, expected, "round {round}, query {trigger}");
        }
    }
}
