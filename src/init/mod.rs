//! `tasksmith init`: create the `.tasksmith/` directory in a project.
//!
//! ```text
//! .tasksmith/
//! ├── config.toml      # Project configuration
//! ├── tasks/           # WorkSet YAML files, one per feature
//! ├── prds/            # Source PRDs referenced by WorkSets
//! ├── progress/        # Append-only progress logs
//! ├── logs/            # Per-phase prompts and agent output
//! ├── audit/runs/      # Run audit JSON
//! ├── archive/         # Archived, completed WorkSets
//! └── prompts/         # Optional prompt overrides
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::STATE_DIR;
use crate::plan::{WorkItem, WorkSet};
use crate::project_config::{CONFIG_FILE, ProjectToml};

const SUBDIRS: [&str; 8] = [
    "tasks",
    "prds",
    "progress",
    "logs",
    "audit",
    "audit/runs",
    "archive",
    "prompts",
];

/// Feature name of the WorkSet written by `init --sample`.
pub const SAMPLE_FEATURE: &str = "example";

/// Result of initializing a tasksmith project.
#[derive(Debug)]
pub struct InitResult {
    pub state_dir: PathBuf,
    /// False if `.tasksmith/` already existed.
    pub created: bool,
    /// Files written by this call. Existing files are never overwritten.
    pub written: Vec<PathBuf>,
}

/// Initialize `.tasksmith/` in `project_dir`, optionally with a sample WorkSet.
pub fn init_project(project_dir: &Path, with_sample: bool) -> Result<InitResult> {
    let state_dir = project_dir.join(STATE_DIR);
    let created = !state_dir.exists();

    for sub in SUBDIRS {
        let dir = state_dir.join(sub);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let mut written = Vec::new();

    let config_file = state_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        let mut toml = ProjectToml::default();
        toml.project.name = project_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        toml.save(&config_file)?;
        written.push(config_file);
    }

    if with_sample {
        let store = crate::plan::PlanStore::new(project_dir, state_dir.join("tasks"));
        let sample_path = store.path_for(SAMPLE_FEATURE);
        if !sample_path.exists() {
            store
                .save(&sample_workset())
                .with_context(|| format!("Failed to write {}", sample_path.display()))?;
            written.push(sample_path);
        }
    }

    Ok(InitResult {
        state_dir,
        created,
        written,
    })
}

/// Whether `.tasksmith/` exists in `project_dir`.
pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(STATE_DIR).is_dir()
}

fn sample_workset() -> WorkSet {
    let mut readme = WorkItem::new("T1", "Add a README section describing the project");
    readme.description = "Write a short overview of what the project does and how to build it.".into();
    readme.acceptance_criteria = vec!["README.md has an Overview section".into()];

    let mut usage = WorkItem::new("T2", "Document basic usage").with_dependencies(&["T1"]);
    usage.description = "Add a Usage section with one worked example.".into();
    usage.acceptance_criteria = vec!["README.md has a Usage section with an example".into()];

    WorkSet::new(SAMPLE_FEATURE, vec![readme, usage])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanStore;
    use tempfile::tempdir;

    // =========================================
    // init_project tests
    // =========================================

    #[test]
    fn test_init_project_creates_structure() {
        let dir = tempdir().unwrap();
        let result = init_project(dir.path(), false).unwrap();

        assert!(result.created);
        assert_eq!(result.state_dir, dir.path().join(".tasksmith"));
        for sub in SUBDIRS {
            assert!(result.state_dir.join(sub).is_dir(), "{} missing", sub);
        }
        assert!(result.state_dir.join("config.toml").is_file());
        assert!(!result.state_dir.join("tasks/example.yaml").exists());
    }

    #[test]
    fn test_config_is_valid_and_named_after_directory() {
        let dir = tempdir().unwrap();
        init_project(dir.path(), false).unwrap();
        let toml = ProjectToml::load(&dir.path().join(".tasksmith/config.toml")).unwrap();
        assert!(toml.validate().is_empty());
        assert_eq!(
            toml.project.name.as_deref(),
            dir.path().file_name().and_then(|n| n.to_str())
        );
    }

    #[test]
    fn test_sample_workset_is_valid() {
        let dir = tempdir().unwrap();
        let result = init_project(dir.path(), true).unwrap();
        assert_eq!(result.written.len(), 2);

        let store = PlanStore::new(dir.path(), dir.path().join(".tasksmith/tasks"));
        let ws = store.load(SAMPLE_FEATURE).unwrap();
        assert!(ws.validate().is_empty());
        assert_eq!(ws.total(), 2);
    }

    #[test]
    fn test_reinit_keeps_existing_files() {
        let dir = tempdir().unwrap();
        init_project(dir.path(), false).unwrap();
        let config = dir.path().join(".tasksmith/config.toml");
        std::fs::write(&config, "[run]\niterations = 2\n").unwrap();

        let again = init_project(dir.path(), true).unwrap();
        assert!(!again.created);
        assert_eq!(again.written.len(), 1);
        assert_eq!(
            std::fs::read_to_string(&config).unwrap(),
            "[run]\niterations = 2\n"
        );
    }

    #[test]
    fn test_is_initialized() {
        let dir = tempdir().unwrap();
        assert!(!is_initialized(dir.path()));
        init_project(dir.path(), false).unwrap();
        assert!(is_initialized(dir.path()));
    }
}
