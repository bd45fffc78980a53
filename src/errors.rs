//! Typed error hierarchy for the tasksmith orchestrator.
//!
//! Three types cover the three layers:
//! - `AgentFailure`: one agent invocation that exited non-zero, already classified
//! - `PhaseError`: why the phase driver aborted a task
//! - `OrchestratorError`: everything that ends a run early

use std::path::PathBuf;

use thiserror::Error;

use crate::agent::ErrorClassification;
use crate::phase::Phase;
use crate::plan::{ArchiveError, StoreError};
use crate::retry::Retryable;

/// A failed agent invocation after classification.
///
/// Carries the raw stderr so the operator can diagnose without re-running.
#[derive(Debug, Clone, Error)]
#[error(
    "{phase} phase failed: {classification} (exit code {exit_code}, {attempts} attempt(s)){}",
    stderr_suffix(.stderr)
)]
pub struct AgentFailure {
    pub phase: Phase,
    pub exit_code: i32,
    pub classification: ErrorClassification,
    pub stderr: String,
    pub attempts: u32,
}

impl AgentFailure {
    pub fn new(phase: Phase, exit_code: i32, stderr: &str) -> Self {
        Self {
            phase,
            exit_code,
            classification: crate::agent::classify(exit_code, stderr),
            stderr: stderr.to_string(),
            attempts: 1,
        }
    }
}

impl Retryable for AgentFailure {
    fn is_retryable(&self) -> bool {
        self.classification.retryable()
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\nagent stderr:\n{}", trimmed)
    }
}

/// Why the phase driver moved a task to `Aborted`.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Agent(#[from] AgentFailure),

    #[error("Failed to persist completion of task {item}: {source}")]
    Persist {
        item: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to write phase log at {}: {source}", .path.display())]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render the {phase} prompt: {message}")]
    Prompt { phase: Phase, message: String },
}

impl PhaseError {
    /// The classification name shown to operators, if the failure came from the agent.
    pub fn classification_name(&self) -> Option<&'static str> {
        match self {
            PhaseError::Agent(failure) => Some(failure.classification.name()),
            _ => None,
        }
    }
}

/// Errors that end an orchestration run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("WorkSet '{feature}' is invalid:\n  - {}", .issues.join("\n  - "))]
    Validation { feature: String, issues: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Another tasksmith run holds {}; run separate working trees for parallel work", .lock_file.display())]
    WorkingTreeBusy { lock_file: PathBuf },

    #[error("Failed to access {}: {source}", .path.display())]
    FatalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task {item} aborted in iteration {iteration}: {source}")]
    Aborted {
        item: String,
        iteration: u32,
        #[source]
        source: PhaseError,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
