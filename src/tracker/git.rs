use crate::audit::FileChangeSummary;
use anyhow::{Context, Result};
use git2::{Delta, DiffOptions, Oid, Repository};
use std::path::Path;

/// A commit that appeared while a phase ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub summary: String,
}

impl CommitInfo {
    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(7)]
    }
}

/// Read-only view of the project repository. Tasksmith never commits; the
/// finalize agent does.
pub struct GitTracker {
    repo: Repository,
}

impl GitTracker {
    pub fn new(project_dir: &Path) -> Result<Self> {
        let repo = Repository::open(project_dir).context("Failed to open git repository")?;
        Ok(Self { repo })
    }

    /// `None` when `project_dir` is not a repository.
    pub fn open(project_dir: &Path) -> Option<Self> {
        Self::new(project_dir).ok()
    }

    /// Get the HEAD commit if it exists (returns None for unborn branches)
    fn get_head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    /// Get current HEAD SHA (returns None for unborn branches)
    pub fn head_sha(&self) -> Option<String> {
        self.get_head_commit().map(|c| c.id().to_string())
    }

    /// The HEAD commit if it differs from `before`.
    pub fn new_commit_since(&self, before: Option<&str>) -> Option<CommitInfo> {
        let head = self.get_head_commit()?;
        let sha = head.id().to_string();
        if before == Some(sha.as_str()) {
            return None;
        }
        Some(CommitInfo {
            summary: head.summary().unwrap_or_default().to_string(),
            sha,
        })
    }

    /// Files and lines changed between two commits. A missing `before` diffs
    /// against the empty tree.
    pub fn changes_between(&self, before: Option<&str>, after: &str) -> Result<FileChangeSummary> {
        let after_tree = self.repo.find_commit(Oid::from_str(after)?)?.tree()?;
        let before_tree = match before {
            Some(sha) => Some(self.repo.find_commit(Oid::from_str(sha)?)?.tree()?),
            None => None,
        };

        let mut opts = DiffOptions::new();
        let diff = self.repo.diff_tree_to_tree(
            before_tree.as_ref(),
            Some(&after_tree),
            Some(&mut opts),
        )?;

        let mut summary = FileChangeSummary::default();

        diff.foreach(
            &mut |delta, _progress| {
                let path = delta.new_file().path().or_else(|| delta.old_file().path());
                if let Some(path) = path {
                    let path_buf = path.to_path_buf();
                    match delta.status() {
                        Delta::Added => summary.files_added.push(path_buf),
                        Delta::Modified | Delta::Renamed => summary.files_modified.push(path_buf),
                        Delta::Deleted => summary.files_deleted.push(path_buf),
                        _ => {}
                    }
                }
                true
            },
            None,
            None,
            Some(&mut |_delta, _hunk, line| {
                match line.origin() {
                    '+' => summary.total_lines_added += 1,
                    '-' => summary.total_lines_removed += 1,
                    _ => {}
                }
                true
            }),
        )?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use std::fs;
    use tempfile::tempdir;

    fn setup_repo() -> (GitTracker, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        drop(config);
        let tracker = GitTracker::new(dir.path()).unwrap();
        (tracker, dir)
    }

    fn commit_file(dir: &std::path::Path, name: &str, content: &str, msg: &str) -> String {
        let repo = Repository::open(dir).unwrap();
        let file_path = dir.join(name);
        fs::write(&file_path, content).unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@test.com").unwrap();
        let oid = if let Ok(head) = repo.head() {
            let parent = head.peel_to_commit().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[&parent])
                .unwrap()
        } else {
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[])
                .unwrap()
        };
        oid.to_string()
    }

    #[test]
    fn test_head_sha_unborn_then_populated() {
        let (tracker, dir) = setup_repo();
        assert!(tracker.head_sha().is_none());
        commit_file(dir.path(), "a.txt", "hello", "init");
        let sha = tracker.head_sha();
        assert!(sha.is_some());
        assert_eq!(sha.unwrap().len(), 40);
    }

    #[test]
    fn test_open_outside_repository() {
        let dir = tempdir().unwrap();
        assert!(GitTracker::open(dir.path()).is_none());
    }

    #[test]
    fn test_new_commit_since() {
        let (tracker, dir) = setup_repo();
        assert!(tracker.new_commit_since(None).is_none());

        let first = commit_file(dir.path(), "a.txt", "one\n", "init");
        assert_eq!(tracker.new_commit_since(Some(&first)), None);

        commit_file(dir.path(), "a.txt", "one\ntwo\n", "T1: add second line");
        let commit = tracker.new_commit_since(Some(&first)).unwrap();
        assert_eq!(commit.summary, "T1: add second line");
        assert_eq!(commit.short_sha().len(), 7);

        // first commit on an unborn branch counts as new
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "b.txt", "x", "root");
        assert!(tracker.new_commit_since(None).is_some());
    }

    #[test]
    fn test_changes_between_commits() {
        let (tracker, dir) = setup_repo();
        let first = commit_file(dir.path(), "existing.txt", "line one\n", "init");
        fs::write(dir.path().join("new_file.rs"), "fn main() {}\n").unwrap();
        let second = commit_file(dir.path(), "existing.txt", "line one\nline two\n", "change");

        let summary = tracker.changes_between(Some(&first), &second).unwrap();
        assert!(summary.files_added.iter().any(|p| p.ends_with("new_file.rs")));
        assert!(summary.files_modified.iter().any(|p| p.ends_with("existing.txt")));
        assert_eq!(summary.total_lines_added, 2);
        assert_eq!(summary.total_lines_removed, 0);
    }

    #[test]
    fn test_changes_from_empty_tree() {
        let (tracker, dir) = setup_repo();
        let root = commit_file(dir.path(), "a.txt", "hello\n", "init");
        let summary = tracker.changes_between(None, &root).unwrap();
        assert_eq!(summary.total_files(), 1);
    }
}
