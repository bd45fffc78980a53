//! Configuration view and validation commands: `tasksmith config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use tasksmith::config::{CliOverrides, Config, STATE_DIR};
    use tasksmith::project_config::{CONFIG_FILE, ProjectToml};

    let state_dir = project_dir.join(STATE_DIR);
    let config_path = state_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("tasksmith Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No config.toml found at {}", config_path.display());
                println!("Run 'tasksmith config init' to create one.");
            }
            println!();

            // Everything merged: user file, project file, environment
            let config = Config::load(project_dir, false, &CliOverrides::default())?;
            let toml = config.project_toml();

            if let Some(name) = &toml.project.name {
                println!("[project]");
                println!("  name = \"{}\"", name);
                println!();
            }

            println!("[agent]");
            println!("  default = \"{}\"", config.agent);
            if let Some(cmd) = &config.agent_cmd {
                println!("  command = \"{}\"", cmd);
            }
            println!("  skip_permissions = {}", config.skip_permissions);
            println!();

            let models = [
                ("implement", &toml.models.implement),
                ("review", &toml.models.review),
                ("finalize", &toml.models.finalize),
            ];
            if models.iter().any(|(_, m)| m.is_some()) {
                println!("[models]");
                for (phase, model) in models {
                    if let Some(model) = model {
                        println!("  {} = \"{}\"", phase, model);
                    }
                }
                println!();
            }

            if !toml.feedback.commands.is_empty() {
                println!("[feedback]");
                for command in &toml.feedback.commands {
                    println!("  - {}", command);
                }
                println!();
            }

            println!("[review]");
            println!("  enabled = {}", config.review_enabled);
            println!();

            println!("[retry]");
            println!("  max_retries = {}", toml.retry.max_retries);
            println!("  initial_delay_ms = {}", toml.retry.initial_delay_ms);
            println!("  max_delay_ms = {}", toml.retry.max_delay_ms);
            println!();

            println!("[run]");
            println!("  iterations = {}", config.iterations);
            println!("  auto_archive = {}", config.auto_archive);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No config.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = ProjectToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("config.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&state_dir)?;
            ProjectToml::default().save(&config_path)?;

            println!("Created config.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [agent] default, command, skip_permissions");
            println!("  - [models] per-phase model ids");
            println!("  - [feedback] commands the agent should run");
            println!("  - [retry] and [run] limits");
            println!();
        }
    }

    Ok(())
}
