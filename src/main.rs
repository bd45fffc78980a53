use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "tasksmith")]
#[command(version, about = "Drive a feature's task list through coding agents")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .tasksmith directory
    Init {
        /// Also write an example WorkSet
        #[arg(long)]
        sample: bool,
    },
    /// Work through a feature's tasks
    Run {
        /// Feature name (the WorkSet file .tasksmith/tasks/<feature>.yaml)
        #[arg(short, long)]
        feature: String,

        /// Agent to invoke: claude, codex or opencode
        #[arg(short, long)]
        agent: Option<String>,

        /// Maximum number of tasks to attempt
        #[arg(short, long)]
        iterations: Option<u32>,

        /// Skip the review phase
        #[arg(long)]
        no_review: bool,
    },
    /// Show task status for one feature, or all features
    Status {
        #[arg(short, long)]
        feature: Option<String>,
    },
    /// List WorkSets and their lifecycle state
    List,
    /// Move completed WorkSets into .tasksmith/archive
    Archive {
        /// Archive only this feature (default: every completed WorkSet)
        #[arg(short, long)]
        feature: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default config.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_dir = tasksmith::init::is_initialized(&project_dir)
        .then(|| project_dir.join(tasksmith::config::STATE_DIR).join("logs"));
    let _log_guard = tasksmith::logging::init(log_dir.as_deref(), cli.verbose);

    match &cli.command {
        Commands::Init { sample } => cmd::cmd_init(&project_dir, *sample)?,
        Commands::Run {
            feature,
            agent,
            iterations,
            no_review,
        } => {
            cmd::cmd_run(
                &cli,
                &project_dir,
                feature,
                agent.as_deref(),
                *iterations,
                *no_review,
            )
            .await?
        }
        Commands::Status { feature } => cmd::cmd_status(&project_dir, feature.as_deref())?,
        Commands::List => cmd::cmd_list(&project_dir)?,
        Commands::Archive { feature, yes } => {
            cmd::cmd_archive(&project_dir, feature.as_deref(), *yes)?
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
