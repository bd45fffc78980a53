use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::phase::Phase;

/// The JSON record of one `tasksmith run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub config: RunConfig,
    pub iterations: Vec<IterationAudit>,
    pub outcome: RunAuditOutcome,
}

impl AuditRun {
    pub fn new(config: RunConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            config,
            iterations: Vec::new(),
            outcome: RunAuditOutcome::InProgress,
        }
    }

    pub fn finish(&mut self, outcome: RunAuditOutcome) {
        self.ended_at = Some(Utc::now());
        self.outcome = outcome;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub feature: String,
    pub agent: String,
    pub max_iterations: u32,
    pub review_enabled: bool,
    pub skip_permissions: bool,
    pub project_dir: PathBuf,
}

/// One iteration: the item it drove and every phase invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationAudit {
    pub iteration: u32,
    pub item: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phases: Vec<PhaseRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_head_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_head_after: Option<String>,
    #[serde(default, skip_serializing_if = "FileChangeSummary::is_empty")]
    pub file_changes: FileChangeSummary,
    pub outcome: IterationOutcome,
}

impl IterationAudit {
    pub fn new(iteration: u32, item: &str) -> Self {
        Self {
            iteration,
            item: item.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            phases: Vec::new(),
            git_head_before: None,
            git_head_after: None,
            file_changes: FileChangeSummary::default(),
            outcome: IterationOutcome::InProgress,
        }
    }

    pub fn finish(&mut self, outcome: IterationOutcome) {
        self.ended_at = Some(Utc::now());
        self.outcome = outcome;
    }
}

/// One phase invocation, after retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub exit_code: i32,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    pub prompt_file: PathBuf,
    pub prompt_chars: usize,
    pub output_file: PathBuf,
    pub output_chars: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChangeSummary {
    pub files_added: Vec<PathBuf>,
    pub files_modified: Vec<PathBuf>,
    pub files_deleted: Vec<PathBuf>,
    pub total_lines_added: usize,
    pub total_lines_removed: usize,
}

impl FileChangeSummary {
    pub fn total_files(&self) -> usize {
        self.files_added.len() + self.files_modified.len() + self.files_deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_files() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IterationOutcome {
    InProgress,
    Completed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        commit: Option<String>,
    },
    AllWorkComplete,
    Aborted {
        phase: Option<Phase>,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunAuditOutcome {
    InProgress,
    SentinelObserved,
    AllDone,
    Blocked { pending: Vec<String> },
    BudgetExhausted,
    Aborted { item: String, message: String },
    Failed { message: String },
}

impl RunAuditOutcome {
    /// Short form for status listings.
    pub fn label(&self) -> String {
        match self {
            RunAuditOutcome::InProgress => "in progress".to_string(),
            RunAuditOutcome::SentinelObserved => "agent reported completion".to_string(),
            RunAuditOutcome::AllDone => "all done".to_string(),
            RunAuditOutcome::Blocked { pending } => format!("blocked ({})", pending.join(", ")),
            RunAuditOutcome::BudgetExhausted => "budget exhausted".to_string(),
            RunAuditOutcome::Aborted { item, .. } => format!("aborted on {}", item),
            RunAuditOutcome::Failed { .. } => "failed".to_string(),
        }
    }
}

pub mod logger;
pub use logger::AuditLogger;
