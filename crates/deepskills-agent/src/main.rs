mod cli;

use anyhow::{bail, Result};
use clap::Parser;
use cli::{Cli, Commands, MemoryAction};
use deepskills_agent::{ChainReport, Config, SkillAgent, ToolOutput};
use deepskills_logging::LogFormat;
use deepskills_memory::MemoryScope;
use deepskills_skills::ExecutionContext;
use serde_json::{json, Value};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    deepskills_logging::init_logging(
        &config.logging.level,
        LogFormat::from_name(&config.logging.format),
    )?;

    let agent = SkillAgent::from_config(config)?;
    info!("Loaded {} skills", agent.registry().len());

    let output = dispatch(&agent, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn dispatch(agent: &SkillAgent, command: Commands) -> Result<Value> {
    let output = match command {
        Commands::List => serde_json::to_value(agent.list_skills())?,
        Commands::Show { name } => match agent.tools().read_skill(&name) {
            ToolOutput::Ok(detail) => serde_json::to_value(detail)?,
            ToolOutput::Error { error } => bail!(error),
        },
        Commands::Match { query } => serde_json::to_value(agent.tools().match_skills(&query))?,
        Commands::Run {
            names,
            query,
            parallel,
        } => {
            let report = if parallel {
                let mut pipeline = agent.pipeline();
                pipeline.add_parallel(names);
                let mut context = ExecutionContext::new(query);
                ChainReport::from(&pipeline.execute_async(&mut context).await)
            } else {
                agent.execute_chain(names.as_slice(), &query)
            };
            serde_json::to_value(report)?
        }
        Commands::Process {
            query,
            execute,
            max_skills,
        } => {
            let max_skills = max_skills.unwrap_or(agent.config().agent.max_skills);
            serde_json::to_value(agent.process(&query, execute, max_skills))?
        }
        Commands::Prompt { base } => Value::String(agent.build_system_prompt(base.as_deref())?),
        Commands::Init => {
            agent.ensure_dirs()?;
            let config = agent.config();
            json!({
                "skills": [
                    config.skills.user_dir.display().to_string(),
                    config.skills.project_dir.display().to_string(),
                ],
                "memory": [
                    config.memory.user_dir.display().to_string(),
                    config.memory.project_dir.display().to_string(),
                ],
            })
        }
        Commands::Memory { action } => memory(agent, action)?,
    };

    Ok(output)
}

fn memory(agent: &SkillAgent, action: MemoryAction) -> Result<Value> {
    let store = agent.memory().store();
    let scope = |project: bool| {
        if project {
            MemoryScope::Project
        } else {
            MemoryScope::User
        }
    };

    let output = match action {
        MemoryAction::Show { key } => {
            let key = key.unwrap_or_else(|| agent.name().to_string());
            let entry = match store.entry(&key, MemoryScope::Project)? {
                Some(entry) => entry,
                None => match store.entry(&key, MemoryScope::User)? {
                    Some(entry) => entry,
                    None => bail!("No memory note '{key}'"),
                },
            };
            serde_json::to_value(entry)?
        }
        MemoryAction::Save {
            key,
            content,
            project,
        } => {
            let path = agent.save_memory(&content, &key, scope(project))?;
            json!({ "saved": path.display().to_string() })
        }
        MemoryAction::Append {
            key,
            content,
            project,
        } => Value::String(store.append(&key, &content, scope(project))?),
        MemoryAction::List => serde_json::to_value(store.list_all()?)?,
        MemoryAction::Search { query } => serde_json::to_value(store.search(&query)?)?,
    };

    Ok(output)
}
