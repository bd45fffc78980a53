//! Completion markers agents print to report progress.
//!
//! - `TASK_COMPLETED: <id>`: implement phase believes the task is done
//! - `FINALIZED: <id>`: finalize phase committed the task
//! - `<promise>COMPLETE</promise>`: implement phase found no work left at all
//!
//! Markers are advisory. A missing or mismatched marker is logged as an
//! ambiguous completion; exit codes decide success.

mod parser;

pub use parser::{Token, parse_markers, tokenize};

/// The literal sentinel that ends a whole run.
pub const ALL_COMPLETE_SENTINEL: &str = "<promise>COMPLETE</promise>";

/// Markers found in one phase's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSet {
    pub task_completed: Vec<String>,
    pub finalized: Vec<String>,
    pub all_complete: bool,
}

impl MarkerSet {
    pub fn completed(&self, id: &str) -> bool {
        self.task_completed.iter().any(|m| m == id)
    }

    pub fn is_finalized(&self, id: &str) -> bool {
        self.finalized.iter().any(|m| m == id)
    }

    /// The marker value relevant to a phase, for logs and audit records.
    pub fn summary(&self) -> Option<String> {
        if self.all_complete {
            return Some(ALL_COMPLETE_SENTINEL.to_string());
        }
        self.finalized
            .first()
            .map(|id| format!("FINALIZED: {}", id))
            .or_else(|| self.task_completed.first().map(|id| format!("TASK_COMPLETED: {}", id)))
    }
}
