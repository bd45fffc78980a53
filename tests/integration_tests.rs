//! Integration tests for tasksmith
//!
//! These drive the real binary against temporary projects. Runs use a fake
//! agent shell script selected through `TASKSMITH_AGENT_CMD`.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a tasksmith Command isolated from the user's config
fn tasksmith(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("tasksmith");
    let home = dir.path().join("home");
    cmd.current_dir(dir.path())
        .env("HOME", &home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("TASKSMITH_AGENT")
        .env_remove("TASKSMITH_AGENT_CMD")
        .env_remove("TASKSMITH_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn init_project(dir: &TempDir, sample: bool) {
    let mut cmd = tasksmith(dir);
    cmd.arg("init");
    if sample {
        cmd.arg("--sample");
    }
    cmd.assert().success();
}

fn workset_path(dir: &TempDir, feature: &str) -> PathBuf {
    dir.path()
        .join(".tasksmith/tasks")
        .join(format!("{}.yaml", feature))
}

/// Write an executable `sh` script that swallows the prompt and runs `body`.
#[cfg(unix)]
fn fake_agent(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_tasksmith_help() {
        let dir = create_temp_project();
        tasksmith(&dir).arg("--help").assert().success();
    }

    #[test]
    fn test_tasksmith_version() {
        let dir = create_temp_project();
        tasksmith(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        tasksmith(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized tasksmith project"));

        for sub in ["tasks", "prds", "progress", "logs", "audit/runs", "archive", "prompts"] {
            assert!(dir.path().join(".tasksmith").join(sub).is_dir(), "{} missing", sub);
        }
        assert!(dir.path().join(".tasksmith/config.toml").is_file());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();
        init_project(&dir, false);

        tasksmith(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_init_sample_writes_workset() {
        let dir = create_temp_project();
        init_project(&dir, true);
        assert!(workset_path(&dir, "example").is_file());
    }
}

// =============================================================================
// Status and List Tests
// =============================================================================

mod status {
    use super::*;

    #[test]
    fn test_list_uninitialized() {
        let dir = create_temp_project();
        tasksmith(&dir)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not initialized"));
    }

    #[test]
    fn test_list_shows_sample_feature() {
        let dir = create_temp_project();
        init_project(&dir, true);

        tasksmith(&dir)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("example"))
            .stdout(predicate::str::contains("not_started"))
            .stdout(predicate::str::contains("0/2"));
    }

    #[test]
    fn test_status_shows_next_and_blocked() {
        let dir = create_temp_project();
        init_project(&dir, true);

        tasksmith(&dir)
            .args(["status", "--feature", "example"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Next:    T1"))
            .stdout(predicate::str::contains("Blocked: T2 waits on T1"));
    }

    #[test]
    fn test_status_unknown_feature_fails() {
        let dir = create_temp_project();
        init_project(&dir, false);

        tasksmith(&dir)
            .args(["status", "--feature", "nope"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_validate_default() {
        let dir = create_temp_project();
        init_project(&dir, false);

        tasksmith(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        init_project(&dir, false);
        fs::write(
            dir.path().join(".tasksmith/config.toml"),
            "[agent]\ndefault = \"gpt\"\n\n[retry]\ninitial_delay_ms = 500\nmax_delay_ms = 100\n",
        )
        .unwrap();

        tasksmith(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings:"))
            .stdout(predicate::str::contains("max_delay_ms"));
    }

    #[test]
    fn test_config_init_refuses_to_overwrite() {
        let dir = create_temp_project();
        init_project(&dir, false);

        tasksmith(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_show_respects_env_agent() {
        let dir = create_temp_project();
        init_project(&dir, false);

        tasksmith(&dir)
            .args(["config", "show"])
            .env("TASKSMITH_AGENT", "codex")
            .assert()
            .success()
            .stdout(predicate::str::contains("default = \"codex\""));
    }
}

// =============================================================================
// Run Tests
// =============================================================================

#[cfg(unix)]
mod run {
    use super::*;

    #[test]
    fn test_run_requires_init() {
        let dir = create_temp_project();
        tasksmith(&dir)
            .args(["run", "--feature", "example"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("tasksmith init"));
    }

    #[test]
    fn test_run_completes_sample_in_order() {
        let dir = create_temp_project();
        init_project(&dir, true);
        let agent = fake_agent(dir.path(), "agent.sh", "echo done");

        tasksmith(&dir)
            .args(["run", "--feature", "example", "--agent", "codex"])
            .env("TASKSMITH_AGENT_CMD", &agent)
            .assert()
            .success()
            .stdout(predicate::str::contains("all tasks completed"))
            .stdout(predicate::str::contains("T1, T2"));

        let yaml = fs::read_to_string(workset_path(&dir, "example")).unwrap();
        assert_eq!(yaml.matches("status: completed").count(), 2);

        let progress =
            fs::read_to_string(dir.path().join(".tasksmith/progress/example.log")).unwrap();
        assert_eq!(progress.lines().filter(|l| l.contains("|completed|")).count(), 2);

        let runs: Vec<_> = fs::read_dir(dir.path().join(".tasksmith/audit/runs"))
            .unwrap()
            .collect();
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn test_run_respects_iteration_budget() {
        let dir = create_temp_project();
        init_project(&dir, true);
        let agent = fake_agent(dir.path(), "agent.sh", "echo done");

        tasksmith(&dir)
            .args(["run", "--feature", "example", "--agent", "codex"])
            .args(["--iterations", "1", "--no-review"])
            .env("TASKSMITH_AGENT_CMD", &agent)
            .assert()
            .success()
            .stdout(predicate::str::contains("budget exhausted"));

        let yaml = fs::read_to_string(workset_path(&dir, "example")).unwrap();
        assert_eq!(yaml.matches("status: completed").count(), 1);

        tasksmith(&dir)
            .args(["status", "--feature", "example"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Next:    T2"))
            .stdout(predicate::str::contains("budget exhausted"))
            .stdout(predicate::str::contains("T1 completed (finalize)"));
    }

    #[test]
    fn test_run_stops_on_sentinel() {
        let dir = create_temp_project();
        init_project(&dir, true);
        let agent = fake_agent(dir.path(), "agent.sh", "echo '<promise>COMPLETE</promise>'");

        tasksmith(&dir)
            .args(["run", "--feature", "example", "--agent", "codex"])
            .env("TASKSMITH_AGENT_CMD", &agent)
            .assert()
            .success()
            .stdout(predicate::str::contains("agent reported all work complete"));

        let yaml = fs::read_to_string(workset_path(&dir, "example")).unwrap();
        assert!(!yaml.contains("status: completed"));
    }

    #[test]
    fn test_run_aborts_on_model_unavailable() {
        let dir = create_temp_project();
        init_project(&dir, true);
        let agent = fake_agent(
            dir.path(),
            "agent.sh",
            "echo 'Error: model not found: gpt-9' >&2\nexit 1",
        );

        tasksmith(&dir)
            .args(["run", "--feature", "example", "--agent", "codex"])
            .env("TASKSMITH_AGENT_CMD", &agent)
            .assert()
            .failure()
            .stderr(predicate::str::contains("ModelUnavailable"))
            .stderr(predicate::str::contains("model not found: gpt-9"));

        let yaml = fs::read_to_string(workset_path(&dir, "example")).unwrap();
        assert!(!yaml.contains("status: completed"));
    }

    #[test]
    fn test_run_rejects_invalid_workset() {
        let dir = create_temp_project();
        init_project(&dir, false);
        fs::write(
            workset_path(&dir, "broken"),
            "feature: broken\ncreated_at: 2026-01-05T10:00:00Z\nupdated_at: 2026-01-05T10:00:00Z\ntasks:\n  - id: A\n    title: a\n    dependencies: [ZZ]\n",
        )
        .unwrap();
        let agent = fake_agent(dir.path(), "agent.sh", "touch called\necho done");

        tasksmith(&dir)
            .args(["run", "--feature", "broken", "--agent", "codex"])
            .env("TASKSMITH_AGENT_CMD", &agent)
            .assert()
            .failure()
            .stderr(predicate::str::contains("is invalid"));

        assert!(!dir.path().join("called").exists());
    }

    #[test]
    fn test_archive_after_run() {
        let dir = create_temp_project();
        init_project(&dir, true);
        let agent = fake_agent(dir.path(), "agent.sh", "echo done");

        tasksmith(&dir)
            .args(["run", "--feature", "example", "--agent", "codex"])
            .env("TASKSMITH_AGENT_CMD", &agent)
            .assert()
            .success();

        tasksmith(&dir)
            .args(["archive", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Archived example"));

        assert!(!workset_path(&dir, "example").exists());
        let archived: Vec<_> = fs::read_dir(dir.path().join(".tasksmith/archive"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].ends_with("-example"));
    }

    #[test]
    fn test_run_accepts_yml_extension() {
        let dir = create_temp_project();
        init_project(&dir, false);
        fs::write(
            dir.path().join(".tasksmith/tasks/solo.yml"),
            "feature: solo\ncreated_at: 2026-01-05T10:00:00Z\nupdated_at: 2026-01-05T10:00:00Z\ntasks:\n  - id: S1\n    title: only task\n",
        )
        .unwrap();
        let agent = fake_agent(dir.path(), "agent.sh", "echo done");

        tasksmith(&dir)
            .args(["run", "--feature", "solo", "--agent", "codex", "--no-review"])
            .env("TASKSMITH_AGENT_CMD", &agent)
            .assert()
            .success()
            .stdout(predicate::str::contains("all tasks completed"));

        let yaml = fs::read_to_string(dir.path().join(".tasksmith/tasks/solo.yml")).unwrap();
        assert!(yaml.contains("status: completed"));
    }

    #[test]
    fn test_archive_waits_for_running_orchestrator() {
        use tasksmith::config::{CliOverrides, Config};
        use tasksmith::orchestrator::RunLock;
        use tasksmith::project_config::ProjectToml;

        let dir = create_temp_project();
        init_project(&dir, true);
        let agent = fake_agent(dir.path(), "agent.sh", "echo done");

        tasksmith(&dir)
            .args(["run", "--feature", "example", "--agent", "codex"])
            .env("TASKSMITH_AGENT_CMD", &agent)
            .assert()
            .success();

        let config = Config::from_toml(
            dir.path().canonicalize().unwrap(),
            ProjectToml::default(),
            false,
            &CliOverrides::default(),
        )
        .unwrap();
        let held = RunLock::acquire(&config).unwrap();

        tasksmith(&dir)
            .args(["archive", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Another tasksmith run holds"));
        assert!(workset_path(&dir, "example").exists());

        drop(held);
        tasksmith(&dir)
            .args(["archive", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Archived example"));
    }
}

// =============================================================================
// Archive Tests
// =============================================================================

mod archive {
    use super::*;

    #[test]
    fn test_archive_incomplete_feature_fails() {
        let dir = create_temp_project();
        init_project(&dir, true);

        tasksmith(&dir)
            .args(["archive", "--feature", "example", "--yes"])
            .assert()
            .failure();

        assert!(workset_path(&dir, "example").exists());
    }

    #[test]
    fn test_archive_nothing_completed() {
        let dir = create_temp_project();
        init_project(&dir, true);

        tasksmith(&dir)
            .args(["archive", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No completed WorkSets"));
    }
}
