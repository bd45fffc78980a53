//! Drives one work item through implement, review and finalize.
//!
//! ```text
//! Implement ──▶ Review ──▶ Finalize ──▶ Done
//!     │  (optional) │           │
//!     └─────────────┴───────────┴──▶ Aborted
//! ```
//!
//! Only a successful finalize changes the WorkSet. Every other outcome leaves
//! the item's status exactly as it was.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::agent::{AgentInvoker, AgentOutput, InvocationRequest};
use crate::audit::{IterationAudit, PhaseRecord};
use crate::config::Config;
use crate::errors::{AgentFailure, PhaseError};
use crate::markers::{MarkerSet, parse_markers};
use crate::orchestrator::progress::{ProgressLog, STATUS_ABORTED, STATUS_COMPLETED};
use crate::phase::Phase;
use crate::plan::{PlanStore, WorkItem, WorkSet};
use crate::prompts::{PromptContext, PromptRenderer};
use crate::retry::{RetryContext, Retryable, retry_notify};
use crate::tracker::git::{CommitInfo, GitTracker};
use crate::ui::OrchestratorUI;

/// How many progress entries are shown to the agent.
const PROGRESS_CONTEXT_ENTRIES: usize = 10;

/// Result of driving an item that did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Finalize succeeded and the item is persisted as completed.
    Completed {
        item_id: String,
        /// The agent printed `FINALIZED: <id>`.
        explicit_marker: bool,
        commit: Option<CommitInfo>,
    },
    /// The implement phase printed the global completion sentinel.
    AllWorkComplete,
}

enum PhaseState {
    Implement,
    Review { implement_output: String },
    Finalize { review_feedback: Option<String> },
    Done(DriveOutcome),
}

impl PhaseState {
    fn phase(&self) -> Option<Phase> {
        match self {
            PhaseState::Implement => Some(Phase::Implement),
            PhaseState::Review { .. } => Some(Phase::Review),
            PhaseState::Finalize { .. } => Some(Phase::Finalize),
            PhaseState::Done(_) => None,
        }
    }
}

/// A phase invocation that exited 0.
struct PhaseRun {
    output: AgentOutput,
    markers: MarkerSet,
}

pub struct PhaseDriver<'a> {
    config: &'a Config,
    invoker: &'a dyn AgentInvoker,
    ui: Option<Arc<OrchestratorUI>>,
    store: PlanStore,
    renderer: PromptRenderer,
}

impl<'a> PhaseDriver<'a> {
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
            renderer: config.prompt_renderer(),
        }
    }

    /// Run every phase for `item`.
    ///
    /// On failure an `aborted` progress entry is appended and the error is
    /// returned unchanged; the WorkSet is not touched.
    pub async fn drive(
        &self,
        workset: &WorkSet,
        item: &WorkItem,
        iteration: u32,
        audit: &mut IterationAudit,
    ) -> Result<DriveOutcome, PhaseError> {
        let progress = ProgressLog::new(self.config.progress_log(&workset.feature));
        let mut ctx = self.prompt_context(workset, item, &progress);
        let git = GitTracker::open(&self.config.project_dir);
        audit.git_head_before = git.as_ref().and_then(|g| g.head_sha());

        let mut state = PhaseState::Implement;
        loop {
            let phase = state.phase();
            let step = match state {
                PhaseState::Done(outcome) => return Ok(outcome),
                PhaseState::Implement => self.implement(workset, item, iteration, &ctx, audit).await,
                PhaseState::Review { implement_output } => {
                    ctx.implement_output = Some(implement_output);
                    self.review(workset, item, iteration, &ctx, audit).await
                }
                PhaseState::Finalize { review_feedback } => {
                    ctx.review_feedback = review_feedback;
                    self.finalize(workset, item, iteration, &ctx, &progress, git.as_ref(), audit)
                        .await
                }
            };

            state = match step {
                Ok(next) => next,
                Err(err) => {
                    let detail = err
                        .classification_name()
                        .map(str::to_string)
                        .unwrap_or_else(|| err.to_string());
                    if let Some(phase) = phase
                        && let Err(e) = progress.append(&item.id, phase, STATUS_ABORTED, &detail)
                    {
                        warn!(item = %item.id, error = %e, "failed to record aborted task in progress log");
                    }
                    return Err(err);
                }
            };
        }
    }

    fn prompt_context(&self, workset: &WorkSet, item: &WorkItem, progress: &ProgressLog) -> PromptContext {
        let mut ctx = PromptContext::for_item(workset, item);
        ctx.project_dir = self.config.project_dir.display().to_string();
        ctx.prd = self.store.load_prd(workset);
        ctx.feedback_commands = self.config.feedback_commands().to_vec();
        ctx.progress = match progress.recent(PROGRESS_CONTEXT_ENTRIES) {
            Ok(entries) => entries.iter().map(|e| e.summary()).collect(),
            Err(e) => {
                warn!(error = %e, "progress log unreadable; prompting without it");
                Vec::new()
            }
        };
        ctx
    }

    async fn implement(
        &self,
        workset: &WorkSet,
        item: &WorkItem,
        iteration: u32,
        ctx: &PromptContext,
        audit: &mut IterationAudit,
    ) -> Result<PhaseState, PhaseError> {
        let run = self
            .run_phase(Phase::Implement, &workset.feature, &item.id, iteration, ctx, audit)
            .await?;

        if run.markers.all_complete {
            info!(item = %item.id, "agent reported all work complete");
            return Ok(PhaseState::Done(DriveOutcome::AllWorkComplete));
        }
        if !run.markers.completed(&item.id) {
            self.ambiguous(Phase::Implement, &item.id, "TASK_COMPLETED");
        }

        if self.config.review_enabled {
            Ok(PhaseState::Review {
                implement_output: run.output.text,
            })
        } else {
            Ok(PhaseState::Finalize {
                review_feedback: None,
            })
        }
    }

    async fn review(
        &self,
        workset: &WorkSet,
        item: &WorkItem,
        iteration: u32,
        ctx: &PromptContext,
        audit: &mut IterationAudit,
    ) -> Result<PhaseState, PhaseError> {
        let run = self
            .run_phase(Phase::Review, &workset.feature, &item.id, iteration, ctx, audit)
            .await?;
        Ok(PhaseState::Finalize {
            review_feedback: Some(run.output.text),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn finalize(
        &self,
        workset: &WorkSet,
        item: &WorkItem,
        iteration: u32,
        ctx: &PromptContext,
        progress: &ProgressLog,
        git: Option<&GitTracker>,
        audit: &mut IterationAudit,
    ) -> Result<PhaseState, PhaseError> {
        let head_before = git.and_then(|g| g.head_sha());
        let run = self
            .run_phase(Phase::Finalize, &workset.feature, &item.id, iteration, ctx, audit)
            .await?;

        let explicit_marker = run.markers.is_finalized(&item.id);
        if !explicit_marker {
            self.ambiguous(Phase::Finalize, &item.id, "FINALIZED");
        }

        self.store
            .complete_item(&workset.feature, &item.id, Utc::now())
            .map_err(|source| PhaseError::Persist {
                item: item.id.clone(),
                source,
            })?;

        let commit = git.and_then(|g| g.new_commit_since(head_before.as_deref()));
        if let Some(g) = git {
            audit.git_head_after = g.head_sha();
            if let Some(ref c) = commit {
                match g.changes_between(head_before.as_deref(), &c.sha) {
                    Ok(changes) => audit.file_changes = changes,
                    Err(e) => warn!(error = %e, "could not diff finalize commit"),
                }
            }
        }

        let detail = match commit {
            Some(ref c) => {
                if let Some(ref ui) = self.ui {
                    ui.show_commit(&format!("{} {}", c.short_sha(), c.summary));
                }
                format!("{} {}", c.short_sha(), c.summary)
            }
            None => {
                if git.is_some() {
                    warn!(item = %item.id, "finalize succeeded without a new commit");
                    if let Some(ref ui) = self.ui {
                        ui.show_warning(&format!("No new commit after finalizing {}", item.id));
                    }
                }
                item.title.clone()
            }
        };

        // The store already says completed; a lost log line must not turn
        // that into an abort.
        if let Err(e) = progress.append(&item.id, Phase::Finalize, STATUS_COMPLETED, &detail) {
            warn!(
                item = %item.id,
                path = %progress.path().display(),
                error = %e,
                "task completed but its progress entry could not be written"
            );
            if let Some(ref ui) = self.ui {
                ui.show_warning(&format!("Could not record {} in the progress log", item.id));
            }
        }

        info!(item = %item.id, iteration, "task completed");
        Ok(PhaseState::Done(DriveOutcome::Completed {
            item_id: item.id.clone(),
            explicit_marker,
            commit,
        }))
    }

    fn ambiguous(&self, phase: Phase, item: &str, marker: &str) {
        warn!(item, %phase, "ambiguous completion: no {}: {} marker in agent output", marker, item);
        if let Some(ref ui) = self.ui {
            ui.show_warning(&format!(
                "Ambiguous completion: {} did not print {}: {}",
                phase, marker, item
            ));
        }
    }

    /// Render, invoke with retries, and record one phase.
    async fn run_phase(
        &self,
        phase: Phase,
        feature: &str,
        item: &str,
        iteration: u32,
        ctx: &PromptContext,
        audit: &mut IterationAudit,
    ) -> Result<PhaseRun, PhaseError> {
        if let Some(ref ui) = self.ui {
            ui.start_phase(phase);
        }

        let prompt = self
            .renderer
            .render(phase, ctx)
            .map_err(|e| PhaseError::Prompt {
                phase,
                message: format!("{:#}", e),
            })?;
        let prompt_file = self.config.prompt_file(feature, item, phase, iteration);
        write_log(&prompt_file, &prompt)?;

        let request = InvocationRequest {
            command: self.config.command_for(phase),
            input: prompt,
            cwd: self.config.project_dir.clone(),
            stream_json: self.config.agent.streams_json(),
        };
        info!(item, %phase, iteration, command = %request.command.display(), "starting phase");

        let started_at = Utc::now();
        let start = Instant::now();
        let mut attempts = 0;
        let invoker = self.invoker;
        let result = retry_notify(
            |attempt| {
                attempts = attempt;
                let request = &request;
                async move {
                    let output = invoker.invoke(request).await;
                    if output.success() {
                        Ok(output)
                    } else {
                        let mut failure = AgentFailure::new(phase, output.exit_code, &output.stderr);
                        failure.attempts = attempt;
                        Err(failure)
                    }
                }
            },
            &self.config.retry,
            |failure: &AgentFailure| failure.is_retryable(),
            |failure: &AgentFailure, retry: &RetryContext| {
                warn!(item, %phase, attempt = retry.attempt, exit_code = failure.exit_code, "transient agent failure");
                if let Some(ref ui) = self.ui {
                    ui.show_retry(phase, retry.attempt, retry.max_attempts, retry.delay);
                }
            },
        )
        .await;
        let elapsed = start.elapsed();

        let output_file = self.config.output_file(feature, item, phase, iteration);
        let mut record = PhaseRecord {
            phase,
            started_at,
            duration_secs: elapsed.as_secs_f64(),
            exit_code: 0,
            attempts,
            classification: None,
            marker: None,
            prompt_file: prompt_file.clone(),
            prompt_chars: request.input.len(),
            output_file: output_file.clone(),
            output_chars: 0,
        };

        match result {
            Ok(output) => {
                let transcript = transcript(&output.stdout, &output.stderr);
                record.output_chars = transcript.len();
                let markers = parse_markers(&output.text);
                record.marker = markers.summary();
                audit.phases.push(record);
                write_log(&output_file, &transcript)?;

                if let Some(ref ui) = self.ui {
                    ui.phase_done(phase, elapsed);
                }
                Ok(PhaseRun { output, markers })
            }
            Err(failure) => {
                record.exit_code = failure.exit_code;
                record.classification = Some(failure.classification.name().to_string());
                record.output_chars = failure.stderr.len();
                audit.phases.push(record);
                write_log(&output_file, &transcript("", &failure.stderr))?;

                warn!(
                    item,
                    %phase,
                    exit_code = failure.exit_code,
                    attempts = failure.attempts,
                    classification = failure.classification.name(),
                    "phase failed"
                );
                Err(failure.into())
            }
        }
    }
}

fn transcript(stdout: &str, stderr: &str) -> String {
    if stderr.trim().is_empty() {
        stdout.to_string()
    } else {
        format!("{}\n--- stderr ---\n{}", stdout, stderr)
    }
}

fn write_log(path: &Path, content: &str) -> Result<(), PhaseError> {
    let log_err = |source| PhaseError::LogWrite {
        path: PathBuf::from(path),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(log_err)?;
    }
    std::fs::write(path, content).map_err(log_err)
}
