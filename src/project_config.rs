//! The `.tasksmith/config.toml` file.
//!
//! Settings are layered, later layers winning key by key:
//! 1. user config (`~/.config/tasksmith/config.toml`)
//! 2. project config (`.tasksmith/config.toml`)
//! 3. environment (`TASKSMITH_AGENT`, `TASKSMITH_AGENT_CMD`, `TASKSMITH_SKIP_PERMISSIONS`)
//! 4. CLI flags (applied by [`crate::config::Config`])
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "my-app"
//!
//! [agent]
//! default = "claude"          # claude | codex | opencode
//! command = "/opt/bin/claude" # optional program override
//! skip_permissions = true
//!
//! [models]
//! implement = "claude-sonnet-4-5"
//! review = "claude-opus-4-1"
//!
//! [feedback]
//! commands = ["cargo test", "cargo clippy -- -D warnings"]
//!
//! [review]
//! enabled = true
//!
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 1000
//! max_delay_ms = 30000
//!
//! [run]
//! iterations = 10
//! auto_archive = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::AgentKind;
use crate::phase::Phase;
use crate::retry::RetryOptions;

pub const CONFIG_FILE: &str = "config.toml";

/// Project-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project name (optional, defaults to directory name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Which agent runs and how it is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_agent")]
    pub default: String,
    /// Program to run instead of the agent's default executable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "default_skip_permissions")]
    pub skip_permissions: bool,
}

fn default_agent() -> String {
    AgentKind::default().to_string()
}

fn default_skip_permissions() -> bool {
    true
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            default: default_agent(),
            command: None,
            skip_permissions: default_skip_permissions(),
        }
    }
}

/// Per-phase model ids. Unset means the agent's own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalize: Option<String>,
}

/// Commands the agent is told to run before finishing a phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSection {
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSection {
    #[serde(default = "default_review_enabled")]
    pub enabled: bool,
}

fn default_review_enabled() -> bool {
    true
}

impl Default for ReviewSection {
    fn default() -> Self {
        Self {
            enabled: default_review_enabled(),
        }
    }
}

/// Backoff for transient agent failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    /// Iteration budget when `--iterations` is not given
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Archive the WorkSet as soon as its last task completes
    #[serde(default)]
    pub auto_archive: bool,
}

fn default_iterations() -> u32 {
    10
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            auto_archive: false,
        }
    }
}

/// The complete config.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub models: ModelsSection,
    #[serde(default)]
    pub feedback: FeedbackSection,
    #[serde(default)]
    pub review: ReviewSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub run: RunSection,
}

/// Environment variable overrides, captured once so they can be tested without
/// touching the process environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub agent: Option<String>,
    pub agent_cmd: Option<String>,
    pub skip_permissions: Option<bool>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            agent: var("TASKSMITH_AGENT"),
            agent_cmd: var("TASKSMITH_AGENT_CMD"),
            skip_permissions: var("TASKSMITH_SKIP_PERMISSIONS").map(|v| {
                !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no")
            }),
        }
    }
}

impl ProjectToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    /// Load `.tasksmith/config.toml`, or defaults if it does not exist.
    pub fn load_or_default(tasksmith_dir: &Path) -> Result<Self> {
        let config_path = tasksmith_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge the user config (if any) under the project config (if any).
    pub fn load_layered(user_config: Option<&Path>, project_config: &Path) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in user_config.into_iter().chain(std::iter::once(project_config)) {
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let layer: toml::Table = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            merge_tables(&mut merged, layer);
        }
        toml::Value::Table(merged)
            .try_into::<Self>()
            .context("Invalid tasksmith configuration")
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn apply_env(&mut self, env: &EnvOverrides) {
        if let Some(ref agent) = env.agent {
            self.agent.default = agent.clone();
        }
        if let Some(ref cmd) = env.agent_cmd {
            self.agent.command = Some(cmd.clone());
        }
        if let Some(skip) = env.skip_permissions {
            self.agent.skip_permissions = skip;
        }
    }

    pub fn agent_kind(&self) -> Result<AgentKind> {
        self.agent.default.parse()
    }

    pub fn model_for(&self, phase: Phase) -> Option<&str> {
        match phase {
            Phase::Implement => self.models.implement.as_deref(),
            Phase::Review => self.models.review.as_deref(),
            Phase::Finalize => self.models.finalize.as_deref(),
        }
    }

    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.agent_kind() {
            warnings.push(e.to_string());
        }
        if self.retry.initial_delay_ms == 0 {
            warnings.push("retry.initial_delay_ms is 0: retries will not back off".to_string());
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            warnings.push(format!(
                "retry.max_delay_ms ({}) is smaller than retry.initial_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.initial_delay_ms
            ));
        }
        if self.run.iterations == 0 {
            warnings.push("run.iterations is 0: `tasksmith run` will do nothing".to_string());
        }
        for command in &self.feedback.commands {
            if command.trim().is_empty() {
                warnings.push("feedback.commands contains an empty command".to_string());
            }
        }

        warnings
    }
}

/// Recursively overlay `layer` onto `base`; tables merge, everything else replaces.
fn merge_tables(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(layer_table)) => {
                merge_tables(base_table, layer_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// `~/.config/tasksmith/config.toml` (platform equivalent), if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tasksmith").join(CONFIG_FILE))
}
