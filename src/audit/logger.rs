use super::{AuditRun, IterationAudit, RunAuditOutcome, RunConfig};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const ACTIVE_RUN_FILE: &str = "active-run.json";

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize audit record")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Records runs under `audit/`.
///
/// While a run is active it is rewritten to `active-run.json` after every
/// iteration, so a crashed run still leaves a record. Finished runs land in
/// `runs/<started>_<feature>_<id>.json`.
pub struct AuditLogger {
    audit_dir: PathBuf,
    runs_dir: PathBuf,
    active: Option<AuditRun>,
}

impl AuditLogger {
    pub fn new(audit_dir: &Path) -> Self {
        Self {
            audit_dir: audit_dir.to_path_buf(),
            runs_dir: audit_dir.join("runs"),
            active: None,
        }
    }

    fn active_file(&self) -> PathBuf {
        self.audit_dir.join(ACTIVE_RUN_FILE)
    }

    fn flush_active(&self) -> Result<()> {
        let Some(run) = &self.active else {
            return Ok(());
        };
        fs::create_dir_all(&self.audit_dir)
            .with_context(|| format!("Failed to create {}", self.audit_dir.display()))?;
        write_json(&self.active_file(), run)
    }

    pub fn start_run(&mut self, config: RunConfig) -> Result<()> {
        self.active = Some(AuditRun::new(config));
        self.flush_active()
    }

    /// Append a finished iteration. Errors when no run was started.
    pub fn add_iteration(&mut self, iteration: IterationAudit) -> Result<()> {
        let run = self
            .active
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("add_iteration called with no active run"))?;
        run.iterations.push(iteration);
        self.flush_active()
    }

    /// Close the active run with `outcome` and return the file it was saved to.
    pub fn finish_run(&mut self, outcome: RunAuditOutcome) -> Result<PathBuf> {
        let mut run = self
            .active
            .take()
            .ok_or_else(|| anyhow::anyhow!("finish_run called with no active run"))?;
        run.finish(outcome);

        fs::create_dir_all(&self.runs_dir)
            .with_context(|| format!("Failed to create {}", self.runs_dir.display()))?;
        let path = self.runs_dir.join(format!(
            "{}_{}_{}.json",
            run.started_at.format("%Y-%m-%dT%H-%M-%S"),
            run.config.feature,
            &run.run_id.simple().to_string()[..8]
        ));
        write_json(&path, &run)?;

        let active_file = self.active_file();
        if active_file.exists() {
            fs::remove_file(&active_file)
                .with_context(|| format!("Failed to remove {}", active_file.display()))?;
        }
        Ok(path)
    }

    pub fn active_run(&self) -> Option<&AuditRun> {
        self.active.as_ref()
    }

    /// Saved run files, newest first.
    pub fn runs(&self) -> Result<Vec<PathBuf>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs: Vec<PathBuf> = fs::read_dir(&self.runs_dir)
            .with_context(|| format!("Failed to read {}", self.runs_dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        runs.sort_unstable_by(|a, b| b.cmp(a));
        Ok(runs)
    }

    pub fn load(&self, path: &Path) -> Result<AuditRun> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// The most recent finished run of `feature`. Unreadable files are skipped.
    pub fn latest_for(&self, feature: &str) -> Result<Option<AuditRun>> {
        Ok(self
            .runs()?
            .iter()
            .filter_map(|path| self.load(path).ok())
            .find(|run| run.config.feature == feature))
    }
}
