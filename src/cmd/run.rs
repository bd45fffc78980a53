//! Iteration runs: `tasksmith run --feature <f>`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use super::super::Cli;

pub fn check_run_prerequisites(project_dir: &Path) -> Result<()> {
    use tasksmith::init::is_initialized;

    if !is_initialized(project_dir) {
        anyhow::bail!("Project not initialized. Run 'tasksmith init' first.");
    }
    Ok(())
}

pub async fn cmd_run(
    cli: &Cli,
    project_dir: &Path,
    feature: &str,
    agent: Option<&str>,
    iterations: Option<u32>,
    no_review: bool,
) -> Result<()> {
    use tasksmith::agent::{AgentKind, ProcessInvoker};
    use tasksmith::config::{CliOverrides, Config};
    use tasksmith::orchestrator::IterationController;
    use tasksmith::ui::OrchestratorUI;

    check_run_prerequisites(project_dir)?;

    let agent = agent
        .map(str::parse::<AgentKind>)
        .transpose()
        .context("Invalid --agent")?;
    let overrides = CliOverrides {
        agent,
        iterations,
        no_review,
    };
    let config = Config::load(project_dir, cli.verbose, &overrides)?;

    let workset = config.plan_store().load(feature)?;
    let ui = Arc::new(OrchestratorUI::new(
        workset.total() as u64,
        workset.completed_count() as u64,
        cli.verbose,
    ));
    ui.print_run_header(
        feature,
        config.agent.as_str(),
        config.iterations,
        config.review_enabled,
    );

    let invoker = ProcessInvoker::new(Some(ui.clone()));
    let controller = IterationController::new(&config, &invoker, Some(ui));
    let report = controller.run(feature, config.iterations).await?;

    println!();
    println!("Run Summary");
    println!("===========");
    println!("Outcome:    {}", report.outcome.describe());
    println!("Iterations: {}", report.iterations_used);
    if report.completed.is_empty() {
        println!("Completed:  none");
    } else {
        println!("Completed:  {}", report.completed.join(", "));
    }
    if let Some(archived) = &report.archived {
        println!("Archived:   {}", archived.destination.display());
    }
    if let Some(audit_file) = &report.audit_file {
        println!("Audit:      {}", audit_file.display());
    }
    println!();

    Ok(())
}
