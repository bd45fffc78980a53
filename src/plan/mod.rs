//! The WorkSet: a feature's ordered list of work items and their dependencies.
//!
//! A WorkSet is stored as YAML in `.tasksmith/tasks/<feature>.yaml`:
//!
//! ```yaml
//! feature: auth
//! prd: .tasksmith/prds/auth.md
//! created_at: 2026-01-05T10:00:00Z
//! updated_at: 2026-01-05T10:00:00Z
//! tasks:
//!   - id: T1
//!     title: Add user model
//!     status: pending
//!     dependencies: []
//!     acceptance_criteria: [migration exists]
//! ```

pub mod lifecycle;
pub mod resolver;
pub mod store;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use lifecycle::{ArchiveError, ArchiveReport, Archiver, LifecycleState, LifecycleStatus};
pub use resolver::{blocked_items, next_eligible};
pub use store::{PlanStore, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            acceptance_criteria: Vec::new(),
            completed_at: None,
        }
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Move to `completed`. Completed items never change again, so a second
    /// call keeps the original timestamp and returns false.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(at);
        true
    }
}

/// A feature's full task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSet {
    pub feature: String,
    /// Path of the source PRD, relative to the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "tasks", default)]
    pub items: Vec<WorkItem>,
}

impl WorkSet {
    pub fn new(feature: impl Into<String>, items: Vec<WorkItem>) -> Self {
        let now = Utc::now();
        Self {
            feature: feature.into(),
            prd: None,
            created_at: now,
            updated_at: now,
            items,
        }
    }

    pub fn get(&self, id: &str) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_completed()).count()
    }

    /// Ids of every item not yet completed, in declaration order.
    pub fn open_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| !item.is_completed())
            .map(|item| item.id.clone())
            .collect()
    }

    /// Mark `id` completed and bump `updated_at`. Returns false when the item
    /// was already completed or does not exist.
    pub fn complete_item(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        let changed = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .is_some_and(|item| item.mark_completed(at));
        if changed {
            self.updated_at = at.max(self.created_at);
        }
        changed
    }

    /// Structural problems that must be fixed before any phase runs.
    ///
    /// Dependency cycles and self-dependencies are not reported: they simply
    /// never become eligible.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.feature.trim().is_empty() {
            issues.push("feature name is empty".to_string());
        }
        if self.updated_at < self.created_at {
            issues.push(format!(
                "updated_at ({}) is earlier than created_at ({})",
                self.updated_at.to_rfc3339(),
                self.created_at.to_rfc3339()
            ));
        }

        let mut seen = HashSet::new();
        for (index, item) in self.items.iter().enumerate() {
            if item.id.trim().is_empty() {
                issues.push(format!("task #{} has an empty id", index + 1));
            } else if !seen.insert(item.id.as_str()) {
                issues.push(format!("duplicate task id {}", item.id));
            }

            match (item.status, item.completed_at) {
                (TaskStatus::Completed, None) => {
                    issues.push(format!("task {} is completed but has no completed_at", item.id))
                }
                (status, Some(_)) if status != TaskStatus::Completed => issues.push(format!(
                    "task {} has completed_at but status {}",
                    item.id, status
                )),
                _ => {}
            }
        }

        let ids: HashSet<&str> = self.items.iter().map(|item| item.id.as_str()).collect();
        for item in &self.items {
            for dep in &item.dependencies {
                if !ids.contains(dep.as_str()) {
                    issues.push(format!("task {} depends on unknown task {}", item.id, dep));
                }
            }
        }

        issues
    }
}
