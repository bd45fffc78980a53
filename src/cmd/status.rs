//! WorkSet inspection: `tasksmith list` and `tasksmith status`.

use anyhow::Result;
use std::path::Path;

use tasksmith::plan::PlanStore;

fn plan_store(project_dir: &Path) -> PlanStore {
    let tasks_dir = project_dir.join(tasksmith::config::STATE_DIR).join("tasks");
    PlanStore::new(project_dir, tasks_dir)
}

fn not_initialized() {
    println!();
    println!("Project: Not initialized");
    println!();
    println!("Run 'tasksmith init' to initialize the project.");
    println!();
}

pub fn cmd_list(project_dir: &Path) -> Result<()> {
    use tasksmith::init::is_initialized;
    use tasksmith::plan::LifecycleStatus;

    if !is_initialized(project_dir) {
        not_initialized();
        return Ok(());
    }

    let store = plan_store(project_dir);
    let features = store.list()?;
    if features.is_empty() {
        println!();
        println!(
            "No WorkSets found in {}",
            store.tasks_dir().display()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{:<24} {:<12} {:>9}", "Feature", "State", "Tasks");
    println!(
        "{:<24} {:<12} {:>9}",
        "------------------------", "------------", "---------"
    );
    for feature in features {
        match store.load(&feature) {
            Ok(workset) => {
                let status = LifecycleStatus::of(&workset);
                println!(
                    "{:<24} {:<12} {:>9}",
                    feature,
                    status.state.to_string(),
                    format!("{}/{}", status.completed, status.total)
                );
            }
            Err(e) => {
                println!(
                    "{:<24} {}",
                    feature,
                    console::style(format!("unreadable: {}", e)).red()
                );
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_status(project_dir: &Path, feature: Option<&str>) -> Result<()> {
    use tasksmith::audit::AuditLogger;
    use tasksmith::init::is_initialized;
    use tasksmith::orchestrator::ProgressLog;
    use tasksmith::plan::{LifecycleStatus, TaskStatus, blocked_items, next_eligible};

    let Some(feature) = feature else {
        return cmd_list(project_dir);
    };
    if !is_initialized(project_dir) {
        not_initialized();
        return Ok(());
    }

    let store = plan_store(project_dir);
    let workset = store.load(feature)?;
    let status = LifecycleStatus::of(&workset);

    println!();
    println!("Feature: {}", workset.feature);
    println!("=========={}", "=".repeat(workset.feature.len()));
    println!();
    if let Some(prd) = &workset.prd {
        println!("PRD:     {}", prd);
    }
    println!(
        "State:   {} ({}/{} tasks)",
        status.state, status.completed, status.total
    );
    println!("Updated: {}", workset.updated_at.format("%Y-%m-%d %H:%M"));
    println!();

    println!("{:<8} {:<12} {:<16} Title", "Task", "Status", "Depends on");
    println!(
        "{:<8} {:<12} {:<16} -----",
        "--------", "------------", "----------------"
    );
    for item in &workset.items {
        let status_text = format!("{:<12}", item.status.as_str());
        let styled = match item.status {
            TaskStatus::Completed => console::style(status_text).green(),
            TaskStatus::Failed => console::style(status_text).red(),
            TaskStatus::InProgress => console::style(status_text).yellow(),
            TaskStatus::Pending => console::style(status_text).dim(),
        };
        let deps = if item.dependencies.is_empty() {
            "-".to_string()
        } else {
            item.dependencies.join(", ")
        };
        println!("{:<8} {} {:<16} {}", item.id, styled, deps, item.title);
    }
    println!();

    let issues = workset.validate();
    if !issues.is_empty() {
        println!("Validation problems:");
        for issue in &issues {
            println!("  - {}", issue);
        }
        println!();
    }

    match next_eligible(&workset.items) {
        Some(item) => println!("Next:    {} {}", item.id, item.title),
        None if status.completed == status.total => println!("Next:    nothing, all tasks completed"),
        None => println!("Next:    nothing eligible"),
    }
    for (id, waiting_on) in blocked_items(&workset.items) {
        println!("Blocked: {} waits on {}", id, waiting_on.join(", "));
    }
    println!();

    let audit = AuditLogger::new(&project_dir.join(tasksmith::config::STATE_DIR).join("audit"));
    if let Some(run) = audit.latest_for(feature)? {
        println!(
            "Last run: {} with {}, {} iteration(s), {}",
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.config.agent,
            run.iterations.len(),
            run.outcome.label()
        );
        println!();
    }

    let log_path = project_dir
        .join(tasksmith::config::STATE_DIR)
        .join("progress")
        .join(format!("{}.log", feature));
    let recent = ProgressLog::new(log_path).recent(5)?;
    if !recent.is_empty() {
        println!("Recent progress:");
        for entry in recent {
            println!("  {}", entry.summary());
        }
        println!();
    }

    Ok(())
}
