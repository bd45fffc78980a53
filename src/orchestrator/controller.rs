//! The outer loop of a run: pick the next eligible item, drive it, repeat.
//!
//! Items are driven strictly one at a time. The WorkSet is reloaded from disk
//! and validated at the top of every iteration so edits made by the agents
//! (or by hand) between iterations are honoured.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use fs2::FileExt;
use tracing::{error, info, warn};

use crate::agent::AgentInvoker;
use crate::audit::{AuditLogger, IterationAudit, IterationOutcome, RunAuditOutcome, RunConfig};
use crate::config::Config;
use crate::errors::{OrchestratorError, PhaseError};
use crate::orchestrator::driver::{DriveOutcome, PhaseDriver};
use crate::plan::{
    ArchiveReport, Archiver, LifecycleStatus, PlanStore, WorkSet, blocked_items, next_eligible,
};
use crate::ui::OrchestratorUI;

/// Why a run stopped without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The implement phase printed `<promise>COMPLETE</promise>`.
    SentinelObserved,
    /// Every item is completed.
    AllDone,
    /// Items remain but none has all dependencies completed.
    Blocked { pending: Vec<(String, Vec<String>)> },
    /// The iteration budget ran out with work left.
    BudgetExhausted { remaining: usize },
}

impl RunOutcome {
    pub fn describe(&self) -> String {
        match self {
            RunOutcome::SentinelObserved => "agent reported all work complete".to_string(),
            RunOutcome::AllDone => "all tasks completed".to_string(),
            RunOutcome::Blocked { pending } if pending.is_empty() => {
                "no pending task left; the rest are in_progress or failed".to_string()
            }
            RunOutcome::Blocked { pending } => format!(
                "blocked: {}",
                pending
                    .iter()
                    .map(|(id, deps)| format!("{} waits on {}", id, deps.join(", ")))
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            RunOutcome::BudgetExhausted { remaining } => {
                format!("iteration budget exhausted with {} task(s) left", remaining)
            }
        }
    }

    fn audit(&self) -> RunAuditOutcome {
        match self {
            RunOutcome::SentinelObserved => RunAuditOutcome::SentinelObserved,
            RunOutcome::AllDone => RunAuditOutcome::AllDone,
            RunOutcome::Blocked { pending } => RunAuditOutcome::Blocked {
                pending: pending.iter().map(|(id, _)| id.clone()).collect(),
            },
            RunOutcome::BudgetExhausted { .. } => RunAuditOutcome::BudgetExhausted,
        }
    }
}

/// Summary of a run that ended cleanly.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub feature: String,
    pub outcome: RunOutcome,
    pub iterations_used: u32,
    /// Items completed by this run, in order.
    pub completed: Vec<String>,
    pub archived: Option<ArchiveReport>,
    pub audit_file: Option<PathBuf>,
}

/// Exclusive lock on the working tree, released on drop.
///
/// Held for a whole run, and by anything else that moves WorkSet files.
pub struct RunLock {
    file: File,
}

impl RunLock {
    pub fn acquire(config: &Config) -> Result<Self, OrchestratorError> {
        let path = &config.lock_file;
        let io_err = |source| OrchestratorError::FatalIo {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_err)?;
        file.try_lock_exclusive()
            .map_err(|_| OrchestratorError::WorkingTreeBusy {
                lock_file: path.clone(),
            })?;
        Ok(Self { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub struct IterationController<'a> {
    config: &'a Config,
    invoker: &'a dyn AgentInvoker,
    ui: Option<Arc<OrchestratorUI>>,
    store: PlanStore,
}

impl<'a> IterationController<'a> {
    pub fn new(
        config: &'a Config,
        invoker: &'a dyn AgentInvoker,
        ui: Option<Arc<OrchestratorUI>>,
    ) -> Self {
        Self {
            config,
            invoker,
            ui,
            store: config.plan_store(),
        }
    }

    /// Run at most `max_iterations` items of `feature`.
    ///
    /// Returns `Err` only for failures: an invalid WorkSet, unreadable state,
    /// a busy working tree or an aborted phase. Work completed before an abort
    /// stays completed.
    pub async fn run(&self, feature: &str, max_iterations: u32) -> Result<RunReport, OrchestratorError> {
        self.config.ensure_directories()?;
        let _lock = RunLock::acquire(self.config)?;

        let mut audit = AuditLogger::new(&self.config.audit_dir);
        if let Err(e) = audit.start_run(RunConfig {
            feature: feature.to_string(),
            agent: self.config.agent.to_string(),
            max_iterations,
            review_enabled: self.config.review_enabled,
            skip_permissions: self.config.skip_permissions,
            project_dir: self.config.project_dir.clone(),
        }) {
            warn!(error = %e, "could not start run audit");
        }

        let result = self.run_loop(feature, max_iterations, &mut audit).await;

        let audit_outcome = match &result {
            Ok(report) => report.outcome.audit(),
            Err(OrchestratorError::Aborted { item, source, .. }) => RunAuditOutcome::Aborted {
                item: item.clone(),
                message: source.to_string(),
            },
            Err(e) => RunAuditOutcome::Failed {
                message: e.to_string(),
            },
        };
        let audit_file = match audit.finish_run(audit_outcome) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "could not save run audit");
                None
            }
        };

        result.map(|mut report| {
            report.audit_file = audit_file;
            report
        })
    }

    fn load_valid(&self, feature: &str) -> Result<WorkSet, OrchestratorError> {
        let workset = self.store.load(feature)?;
        let issues = workset.validate();
        if !issues.is_empty() {
            return Err(OrchestratorError::Validation {
                feature: feature.to_string(),
                issues,
            });
        }
        Ok(workset)
    }

    async fn run_loop(
        &self,
        feature: &str,
        max_iterations: u32,
        audit: &mut AuditLogger,
    ) -> Result<RunReport, OrchestratorError> {
        let driver = PhaseDriver::new(self.config, self.invoker, self.ui.clone());
        let mut report = RunReport {
            feature: feature.to_string(),
            outcome: RunOutcome::BudgetExhausted { remaining: 0 },
            iterations_used: 0,
            completed: Vec::new(),
            archived: None,
            audit_file: None,
        };

        // Validate before any phase runs, even with a zero budget.
        let mut workset = self.load_valid(feature)?;
        info!(
            feature,
            total = workset.total(),
            completed = workset.completed_count(),
            max_iterations,
            "run starting"
        );

        for iteration in 1..=max_iterations {
            if iteration > 1 {
                workset = self.load_valid(feature)?;
            }

            let Some(item) = next_eligible(&workset.items).cloned() else {
                report.outcome = if workset.completed_count() == workset.total() {
                    info!(feature, "all tasks completed");
                    RunOutcome::AllDone
                } else {
                    let pending = blocked_items(&workset.items);
                    warn!(feature, blocked = pending.len(), "no eligible task");
                    RunOutcome::Blocked { pending }
                };
                break;
            };

            report.iterations_used = iteration;
            if let Some(ref ui) = self.ui {
                ui.start_iteration(iteration, max_iterations);
                ui.start_task(&item.id, &item.title);
            }
            info!(feature, item = %item.id, iteration, "driving task");

            let mut record = IterationAudit::new(iteration, &item.id);
            let result = driver.drive(&workset, &item, iteration, &mut record).await;

            match result {
                Ok(DriveOutcome::Completed { item_id, commit, .. }) => {
                    record.finish(IterationOutcome::Completed {
                        commit: commit.map(|c| c.sha),
                    });
                    self.record(audit, record);
                    if let Some(ref ui) = self.ui {
                        ui.task_complete(&item_id);
                    }
                    report.completed.push(item_id);
                }
                Ok(DriveOutcome::AllWorkComplete) => {
                    record.finish(IterationOutcome::AllWorkComplete);
                    self.record(audit, record);
                    if let Some(ref ui) = self.ui {
                        ui.all_complete();
                    }
                    report.outcome = RunOutcome::SentinelObserved;
                    break;
                }
                Err(source) => {
                    error!(feature, item = %item.id, iteration, error = %source, "task aborted");
                    let phase = match &source {
                        PhaseError::Agent(failure) => Some(failure.phase),
                        _ => None,
                    };
                    record.finish(IterationOutcome::Aborted {
                        phase,
                        message: source.to_string(),
                    });
                    self.record(audit, record);
                    if let Some(ref ui) = self.ui {
                        ui.task_aborted(&item.id, &source.to_string());
                    }
                    return Err(OrchestratorError::Aborted {
                        item: item.id,
                        iteration,
                        source,
                    });
                }
            }

            if iteration == max_iterations {
                let workset = self.load_valid(feature)?;
                let remaining = workset.total() - workset.completed_count();
                report.outcome = if remaining == 0 {
                    RunOutcome::AllDone
                } else {
                    RunOutcome::BudgetExhausted { remaining }
                };
            }
        }

        if max_iterations == 0 {
            report.outcome = RunOutcome::BudgetExhausted {
                remaining: workset.total() - workset.completed_count(),
            };
        }

        if let RunOutcome::Blocked { ref pending } = report.outcome
            && let Some(ref ui) = self.ui
        {
            let ids: Vec<String> = pending.iter().map(|(id, _)| id.clone()).collect();
            ui.blocked(&ids);
        }

        if self.config.auto_archive && report.outcome == RunOutcome::AllDone {
            // An empty WorkSet is done but never completed, so it stays put.
            let finished = self.store.load(feature)?;
            if LifecycleStatus::of(&finished).is_archivable() {
                let archived = Archiver::new(&self.config.archive_dir).archive(
                    &self.store,
                    feature,
                    &self.config.progress_log(feature),
                    Local::now().date_naive(),
                )?;
                info!(feature, destination = %archived.destination.display(), "archived completed WorkSet");
                report.archived = Some(archived);
            } else {
                info!(feature, "WorkSet has no tasks; skipping auto-archive");
            }
        }

        if let Some(ref ui) = self.ui {
            ui.finish(&report.outcome.describe());
        }
        Ok(report)
    }

    fn record(&self, audit: &mut AuditLogger, iteration: IterationAudit) {
        if let Err(e) = audit.add_iteration(iteration) {
            warn!(error = %e, "could not record iteration in run audit");
        }
    }
}
