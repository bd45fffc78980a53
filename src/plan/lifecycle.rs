//! Aggregate WorkSet status and archival of finished WorkSets.
//!
//! Archival moves the WorkSet file, its PRD and its progress log into
//! `.tasksmith/archive/<date>-<feature>/` as one unit. Files are first moved
//! into a staging directory; if any move fails, everything already moved is
//! put back and nothing is archived.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::{PlanStore, StoreError, WorkSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    NotStarted,
    InProgress,
    Completed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LifecycleState::NotStarted => "not_started",
            LifecycleState::InProgress => "in_progress",
            LifecycleState::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleStatus {
    pub state: LifecycleState,
    pub completed: usize,
    pub total: usize,
}

impl LifecycleStatus {
    pub fn of(workset: &WorkSet) -> Self {
        let completed = workset.completed_count();
        let total = workset.total();
        let state = if total == 0 || completed == 0 {
            LifecycleState::NotStarted
        } else if completed == total {
            LifecycleState::Completed
        } else {
            LifecycleState::InProgress
        };
        Self {
            state,
            completed,
            total,
        }
    }

    pub fn is_archivable(&self) -> bool {
        self.state == LifecycleState::Completed
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("WorkSet '{feature}' is not complete ({completed}/{total} tasks); refusing to archive")]
    NotCompleted {
        feature: String,
        completed: usize,
        total: usize,
    },

    #[error("WorkSet '{feature}' references {}, which does not exist", .path.display())]
    MissingArtifact { feature: String, path: PathBuf },

    #[error("Archive destination {} already exists", .path.display())]
    DestinationExists { path: PathBuf },

    #[error("Failed to move {} into the archive (all files restored): {source}", .path.display())]
    Move {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Failed to move {} into the archive and could not restore {}; check {} by hand",
        .path.display(),
        join_paths(.unrestored),
        .staging.display()
    )]
    RollbackFailed {
        path: PathBuf,
        staging: PathBuf,
        unrestored: Vec<PathBuf>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// What was archived where.
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    pub feature: String,
    pub destination: PathBuf,
    pub files: Vec<PathBuf>,
}

type MoveFn = fn(&Path, &Path) -> io::Result<()>;

/// Moves completed WorkSets and their documents into the archive directory.
pub struct Archiver {
    archive_dir: PathBuf,
    mover: MoveFn,
}

impl Archiver {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            mover: |from, to| fs::rename(from, to),
        }
    }

    #[cfg(test)]
    fn with_mover(mut self, mover: MoveFn) -> Self {
        self.mover = mover;
        self
    }

    /// Archive `feature` dated `date`.
    ///
    /// The WorkSet file is required, as is the PRD when the WorkSet references
    /// one. The progress log is moved only if it exists.
    pub fn archive(
        &self,
        store: &PlanStore,
        feature: &str,
        progress_log: &Path,
        date: NaiveDate,
    ) -> Result<ArchiveReport, ArchiveError> {
        let workset = store.load(feature)?;
        let status = LifecycleStatus::of(&workset);
        if !status.is_archivable() {
            return Err(ArchiveError::NotCompleted {
                feature: feature.to_string(),
                completed: status.completed,
                total: status.total,
            });
        }

        let mut artifacts = vec![store.path_for(feature)];
        if let Some(prd) = store.prd_path(&workset) {
            if !prd.exists() {
                return Err(ArchiveError::MissingArtifact {
                    feature: feature.to_string(),
                    path: prd,
                });
            }
            artifacts.push(prd);
        }
        if progress_log.exists() {
            artifacts.push(progress_log.to_path_buf());
        }

        let destination = self
            .archive_dir
            .join(format!("{}-{}", date.format("%Y-%m-%d"), feature));
        if destination.exists() {
            return Err(ArchiveError::DestinationExists { path: destination });
        }

        let staging = self.archive_dir.join(format!(
            ".staging-{}-{}",
            feature,
            uuid::Uuid::new_v4().simple()
        ));
        fs::create_dir_all(&staging).map_err(|source| ArchiveError::Move {
            path: staging.clone(),
            source,
        })?;

        let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();
        for source_path in &artifacts {
            let target = staging.join(staged_name(source_path, &moved));
            if let Err(source) = (self.mover)(source_path, &target) {
                return Err(self.roll_back(&staging, moved, source_path, source));
            }
            moved.push((source_path.clone(), target));
        }

        if let Err(source) = (self.mover)(&staging, &destination) {
            return Err(self.roll_back(&staging, moved, &staging, source));
        }

        let files = moved
            .iter()
            .filter_map(|(_, staged)| staged.file_name().map(|name| destination.join(name)))
            .collect();
        info!(feature, destination = %destination.display(), "WorkSet archived");

        Ok(ArchiveReport {
            feature: feature.to_string(),
            destination,
            files,
        })
    }

    fn roll_back(
        &self,
        staging: &Path,
        moved: Vec<(PathBuf, PathBuf)>,
        failed: &Path,
        source: io::Error,
    ) -> ArchiveError {
        warn!(path = %failed.display(), error = %source, "archive move failed, rolling back");

        let mut unrestored = Vec::new();
        for (original, staged) in moved.into_iter().rev() {
            if fs::rename(&staged, &original).is_err() {
                unrestored.push(original);
            }
        }

        if unrestored.is_empty() {
            let _ = fs::remove_dir_all(staging);
            ArchiveError::Move {
                path: failed.to_path_buf(),
                source,
            }
        } else {
            ArchiveError::RollbackFailed {
                path: failed.to_path_buf(),
                staging: staging.to_path_buf(),
                unrestored,
            }
        }
    }
}

/// File name inside the staging directory; disambiguated if two artifacts share one.
fn staged_name(path: &Path, moved: &[(PathBuf, PathBuf)]) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let taken = |candidate: &str| {
        moved
            .iter()
            .any(|(_, staged)| staged.file_name().is_some_and(|n| n == candidate))
    };
    if !taken(&name) {
        return name;
    }
    (1..)
        .map(|i| format!("{}-{}", i, name))
        .find(|candidate| !taken(candidate))
        .unwrap_or(name)
}
