//! Command line definitions for the `deepskills` binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// deepskills -- discover, match and run agent skills
#[derive(Parser)]
#[command(
    name = "deepskills",
    version,
    about = "Discover, match and run SKILL.md skills",
    long_about = "Loads skills from the user and project skills directories, matches them \
                  against queries and runs them as chains or pipelines. Output is JSON."
)]
pub struct Cli {
    /// Load this config file instead of the layered defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all discovered skills.
    List,

    /// Show the full detail of one skill.
    Show {
        /// Skill name.
        name: String,
    },

    /// Show the skills whose triggers occur in a query.
    Match {
        /// Free-text query.
        query: String,
    },

    /// Run skills in order as a chain.
    Run {
        /// Skill names, in execution order.
        #[arg(required = true)]
        names: Vec<String>,

        /// Query stored in the execution context.
        #[arg(long, default_value = "")]
        query: String,

        /// Run all skills as one concurrent pipeline stage instead.
        #[arg(long)]
        parallel: bool,
    },

    /// Match a query and optionally run the best matches.
    Process {
        /// Free-text query.
        query: String,

        /// Run the matched skills.
        #[arg(long)]
        execute: bool,

        /// How many matched skills to run (defaults to agent.max_skills).
        #[arg(long)]
        max_skills: Option<usize>,
    },

    /// Print the full system prompt.
    Prompt {
        /// Base prompt replacing the built-in one.
        #[arg(long)]
        base: Option<String>,
    },

    /// Create the skills and memory directories.
    Init,

    /// Manage memory notes.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Show a note, preferring the project copy.
    Show {
        /// Note key (defaults to the agent name).
        key: Option<String>,
    },

    /// Overwrite a note.
    Save {
        key: String,
        content: String,
        /// Write to project memory instead of user memory.
        #[arg(long)]
        project: bool,
    },

    /// Append to a note.
    Append {
        key: String,
        content: String,
        /// Write to project memory instead of user memory.
        #[arg(long)]
        project: bool,
    },

    /// List note keys in both scopes.
    List,

    /// Find notes containing some text.
    Search {
        query: String,
    },
}
