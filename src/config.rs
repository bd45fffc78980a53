use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::agent::{AgentKind, CommandSpec};
use crate::phase::Phase;
use crate::plan::PlanStore;
use crate::project_config::{CONFIG_FILE, EnvOverrides, ProjectToml, user_config_path};
use crate::prompts::PromptRenderer;
use crate::retry::RetryOptions;

/// The per-project state directory.
pub const STATE_DIR: &str = ".tasksmith";

/// Flags from the command line; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub agent: Option<AgentKind>,
    pub iterations: Option<u32>,
    pub no_review: bool,
}

/// Runtime configuration for tasksmith.
///
/// Resolves every `.tasksmith/` path from the explicit project directory and
/// folds the layered `config.toml` settings, environment and CLI flags into
/// plain values the orchestrator reads.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub state_dir: PathBuf,
    pub tasks_dir: PathBuf,
    pub prds_dir: PathBuf,
    pub progress_dir: PathBuf,
    pub log_dir: PathBuf,
    pub audit_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub lock_file: PathBuf,
    pub agent: AgentKind,
    pub agent_cmd: Option<String>,
    pub skip_permissions: bool,
    pub review_enabled: bool,
    pub iterations: u32,
    pub auto_archive: bool,
    pub retry: RetryOptions,
    pub verbose: bool,
    /// The merged file configuration
    toml: ProjectToml,
}

impl Config {
    /// Load config for `project_dir`: user file, project file, environment, then `cli`.
    pub fn load(project_dir: &Path, verbose: bool, cli: &CliOverrides) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory {}", project_dir.display()))?;
        let state_dir = project_dir.join(STATE_DIR);

        let user = user_config_path();
        let mut toml = ProjectToml::load_layered(user.as_deref(), &state_dir.join(CONFIG_FILE))?;
        toml.apply_env(&EnvOverrides::from_env());

        Self::from_toml(project_dir, toml, verbose, cli)
    }

    /// Build from an already-merged configuration. `project_dir` must be absolute.
    pub fn from_toml(
        project_dir: PathBuf,
        toml: ProjectToml,
        verbose: bool,
        cli: &CliOverrides,
    ) -> Result<Self> {
        let state_dir = project_dir.join(STATE_DIR);
        let agent = match cli.agent {
            Some(agent) => agent,
            None => toml.agent_kind().context("Invalid [agent] default in config.toml")?,
        };

        Ok(Self {
            tasks_dir: state_dir.join("tasks"),
            prds_dir: state_dir.join("prds"),
            progress_dir: state_dir.join("progress"),
            log_dir: state_dir.join("logs"),
            audit_dir: state_dir.join("audit"),
            archive_dir: state_dir.join("archive"),
            prompts_dir: state_dir.join("prompts"),
            lock_file: state_dir.join("run.lock"),
            agent,
            agent_cmd: toml.agent.command.clone(),
            skip_permissions: toml.agent.skip_permissions,
            review_enabled: toml.review.enabled && !cli.no_review,
            iterations: cli.iterations.unwrap_or(toml.run.iterations),
            auto_archive: toml.run.auto_archive,
            retry: toml.retry_options(),
            verbose,
            project_dir,
            state_dir,
            toml,
        })
    }

    /// The merged file configuration.
    pub fn project_toml(&self) -> &ProjectToml {
        &self.toml
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.tasks_dir,
            &self.prds_dir,
            &self.progress_dir,
            &self.log_dir,
            &self.audit_dir.join("runs"),
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// The command that runs `phase`.
    pub fn command_for(&self, phase: Phase) -> CommandSpec {
        self.agent.command(
            self.agent_cmd.as_deref(),
            self.toml.model_for(phase),
            self.skip_permissions,
        )
    }

    pub fn feedback_commands(&self) -> &[String] {
        &self.toml.feedback.commands
    }

    pub fn plan_store(&self) -> PlanStore {
        PlanStore::new(&self.project_dir, &self.tasks_dir)
    }

    pub fn prompt_renderer(&self) -> PromptRenderer {
        PromptRenderer::new(&self.prompts_dir)
    }

    pub fn progress_log(&self, feature: &str) -> PathBuf {
        self.progress_dir.join(format!("{}.log", feature))
    }

    pub fn prompt_file(&self, feature: &str, item: &str, phase: Phase, iteration: u32) -> PathBuf {
        self.log_dir.join(format!(
            "{}-{}-{}-iter-{}-prompt.md",
            feature, item, phase, iteration
        ))
    }

    pub fn output_file(&self, feature: &str, item: &str, phase: Phase, iteration: u32) -> PathBuf {
        self.log_dir.join(format!(
            "{}-{}-{}-iter-{}-output.log",
            feature, item, phase, iteration
        ))
    }
}
