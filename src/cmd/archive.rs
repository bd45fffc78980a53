//! Archival of completed WorkSets: `tasksmith archive`.

use anyhow::Result;
use std::path::Path;

pub fn cmd_archive(project_dir: &Path, feature: Option<&str>, yes: bool) -> Result<()> {
    use chrono::Local;
    use dialoguer::Confirm;
    use tasksmith::config::{CliOverrides, Config};
    use tasksmith::init::is_initialized;
    use tasksmith::orchestrator::RunLock;
    use tasksmith::plan::{Archiver, LifecycleStatus};
    use tasksmith::ui::icons::ARCHIVE;

    if !is_initialized(project_dir) {
        anyhow::bail!("Project not initialized. Run 'tasksmith init' first.");
    }

    let config = Config::load(project_dir, false, &CliOverrides::default())?;
    let store = config.plan_store();

    let candidates: Vec<String> = match feature {
        Some(feature) => vec![feature.to_string()],
        None => store
            .list()?
            .into_iter()
            .filter(|f| {
                store
                    .load(f)
                    .map(|ws| LifecycleStatus::of(&ws).is_archivable())
                    .unwrap_or(false)
            })
            .collect(),
    };

    if candidates.is_empty() {
        println!("No completed WorkSets to archive.");
        return Ok(());
    }

    if !yes {
        let confirm = Confirm::new()
            .with_prompt(format!("Archive {}?", candidates.join(", ")))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Archive cancelled");
            return Ok(());
        }
    }

    // Never move files out from under a running orchestrator.
    let _lock = RunLock::acquire(&config)?;

    let archiver = Archiver::new(&config.archive_dir);
    let today = Local::now().date_naive();
    for feature in &candidates {
        let report = archiver.archive(&store, feature, &config.progress_log(feature), today)?;
        println!(
            "{}Archived {} ({} file(s)) to {}",
            ARCHIVE,
            report.feature,
            report.files.len(),
            report.destination.display()
        );
    }

    Ok(())
}
