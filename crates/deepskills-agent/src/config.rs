use anyhow::Context;
use config::builder::{ConfigBuilder, DefaultState};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config template created when no config exists
const DEFAULT_CONFIG: &str = r#"
[skills]
user_dir = "~/.deepskills/skills"
project_dir = ".deepskills/skills"

[memory]
user_dir = "~/.deepskills/memory"
project_dir = ".deepskills/memory"

[api]
openai_api_key = ""     # Set via OPENAI_API_KEY env var
anthropic_api_key = ""  # Set via ANTHROPIC_API_KEY env var
google_api_key = ""     # Set via GOOGLE_API_KEY env var
tavily_api_key = ""     # Set via TAVILY_API_KEY env var
base_url = ""           # Set via BASE_URL env var
model_name = ""         # Set via MODEL_NAME env var
api_key = ""            # Set via API_KEY env var
model_enable_think = ""  # Set via MODEL_ENABLE_THINK env var

[agent]
name = "agent"
default_model = "gpt-4o-mini"
max_iterations = 10
max_skills = 1

[logging]
level = "info"     # trace, debug, info, warn, error
format = "pretty"  # pretty or json
"#;

/// Plain env vars mapped onto config keys, applied last
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "api.openai_api_key"),
    ("ANTHROPIC_API_KEY", "api.anthropic_api_key"),
    ("GOOGLE_API_KEY", "api.google_api_key"),
    ("TAVILY_API_KEY", "api.tavily_api_key"),
    ("BASE_URL", "api.base_url"),
    ("MODEL_NAME", "api.model_name"),
    ("API_KEY", "api.api_key"),
    ("MODEL_ENABLE_THINK", "api.model_enable_think"),
];

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SkillsConfig {
    pub user_dir: PathBuf,
    pub project_dir: PathBuf,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            user_dir: PathBuf::from("~/.deepskills/skills"),
            project_dir: PathBuf::from(".deepskills/skills"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    pub user_dir: PathBuf,
    pub project_dir: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            user_dir: PathBuf::from("~/.deepskills/memory"),
            project_dir: PathBuf::from(".deepskills/memory"),
        }
    }
}

/// Credentials for model and search providers
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub google_api_key: String,
    pub tavily_api_key: String,
    /// OpenAI-compatible endpoint
    pub base_url: String,
    pub model_name: String,
    pub api_key: String,
    pub model_enable_think: String,
}

impl ApiConfig {
    pub fn has_openai(&self) -> bool {
        !self.openai_api_key.is_empty()
    }

    pub fn has_anthropic(&self) -> bool {
        !self.anthropic_api_key.is_empty()
    }

    pub fn has_google(&self) -> bool {
        !self.google_api_key.is_empty()
    }

    pub fn has_tavily(&self) -> bool {
        !self.tavily_api_key.is_empty()
    }

    /// An OpenAI-compatible endpoint needs all three of key, URL and model
    pub fn has_compatible_endpoint(&self) -> bool {
        !self.api_key.is_empty() && !self.base_url.is_empty() && !self.model_name.is_empty()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name, also the key of its memory note
    pub name: String,
    pub default_model: String,
    pub max_iterations: u32,
    /// How many matched skills `process` runs
    pub max_skills: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            default_model: "gpt-4o-mini".to_string(),
            max_iterations: 10,
            max_skills: 1,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub skills: SkillsConfig,
    pub memory: MemoryConfig,
    pub api: ApiConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the global config path: ~/.deepskills/deepskills.toml
    pub fn global_config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".deepskills").join("deepskills.toml"))
    }

    /// Ensure global config directory and file exist, creating defaults if needed
    fn ensure_global_config() -> anyhow::Result<PathBuf> {
        let config_path = Self::global_config_path()?;

        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)?;
                eprintln!("Created config directory: {}", config_dir.display());
            }
        }

        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG.trim())?;
            eprintln!("Created default config: {}", config_path.display());
            eprintln!("Please edit this file or set environment variables.");
        }

        Ok(config_path)
    }

    /// Load configuration with layered approach:
    /// 1. Global config: ~/.deepskills/deepskills.toml (auto-created if missing)
    /// 2. Local override: ./deepskills.toml (workspace, optional)
    /// 3. Environment variables (DEEPSKILLS__SECTION__KEY)
    /// 4. Convenience variables such as OPENAI_API_KEY (highest priority)
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        let global_config_path = Self::ensure_global_config()?;

        let config_builder = config::Config::builder()
            .add_source(config::File::from(global_config_path))
            .add_source(config::File::with_name("deepskills").required(false));

        Self::finish(config_builder)
    }

    /// Load one explicit file, still honouring environment overrides
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config_builder =
            config::Config::builder().add_source(config::File::from(path.to_path_buf()));

        Self::finish(config_builder)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    fn finish(config_builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let mut config_builder = config_builder.add_source(
            config::Environment::with_prefix("DEEPSKILLS")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = env::var(var) {
                config_builder = config_builder.set_override(*key, value)?;
            }
        }

        let mut config: Self = config_builder.build()?.try_deserialize()?;
        config.expand_paths();
        Ok(config)
    }

    fn expand_paths(&mut self) {
        for path in [
            &mut self.skills.user_dir,
            &mut self.skills.project_dir,
            &mut self.memory.user_dir,
            &mut self.memory.project_dir,
        ] {
            *path = expand_tilde(path);
        }
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Create the skills and memory directories
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        for dir in [
            &self.skills.user_dir,
            &self.skills.project_dir,
            &self.memory.user_dir,
            &self.memory.project_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Replace a leading `~` with the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
