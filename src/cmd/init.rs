//! Project setup: `tasksmith init`.

use anyhow::Result;

pub fn cmd_init(project_dir: &std::path::Path, sample: bool) -> Result<()> {
    use tasksmith::init::{SAMPLE_FEATURE, init_project};

    let result = init_project(project_dir, sample)?;

    if result.created {
        println!(
            "Initialized tasksmith project at {}",
            result.state_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .tasksmith/");
        println!("  ├── config.toml   # Agent, models, retry and run settings");
        println!("  ├── tasks/        # WorkSet YAML, one file per feature");
        println!("  ├── prds/         # Source documents referenced by WorkSets");
        println!("  ├── progress/     # Append-only progress logs");
        println!("  ├── logs/         # Prompts and agent output per phase");
        println!("  ├── audit/runs/   # Audit trail");
        println!("  ├── archive/      # Completed WorkSets");
        println!("  └── prompts/      # Custom prompt overrides");
        println!();
    } else {
        println!(
            "tasksmith project already initialized at {}",
            result.state_dir.display()
        );
        println!("Directory structure verified.");
    }

    for path in &result.written {
        println!("Wrote {}", path.display());
    }

    if sample {
        println!();
        println!("Next steps:");
        println!("  1. Edit .tasksmith/tasks/{}.yaml", SAMPLE_FEATURE);
        println!("  2. Run `tasksmith run --feature {}`", SAMPLE_FEATURE);
    }

    Ok(())
}
