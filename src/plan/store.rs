//! Reading and writing WorkSet documents.
//!
//! Saves are atomic: the YAML is written to a temporary sibling file, synced,
//! then renamed over the target, so a crash never leaves a half-written plan.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use super::WorkSet;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No WorkSet named '{feature}' (expected {})", .path.display())]
    NotFound { feature: String, path: PathBuf },

    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize WorkSet '{feature}': {source}")]
    Serialize {
        feature: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Task {item} not found in WorkSet '{feature}'")]
    UnknownItem { feature: String, item: String },
}

/// File-backed WorkSet storage under `.tasksmith/tasks/`.
#[derive(Debug, Clone)]
pub struct PlanStore {
    project_dir: PathBuf,
    tasks_dir: PathBuf,
}

impl PlanStore {
    pub fn new(project_dir: impl Into<PathBuf>, tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            tasks_dir: tasks_dir.into(),
        }
    }

    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }

    /// Where the WorkSet for `feature` lives. `.yaml` wins over `.yml`.
    pub fn path_for(&self, feature: &str) -> PathBuf {
        let yml = self.tasks_dir.join(format!("{}.yml", feature));
        let yaml = self.tasks_dir.join(format!("{}.yaml", feature));
        if !yaml.exists() && yml.exists() { yml } else { yaml }
    }

    /// Feature names of every stored WorkSet, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut features = Vec::new();
        for ext in ["yaml", "yml"] {
            let pattern = self.tasks_dir.join(format!("*.{}", ext));
            let entries = glob::glob(&pattern.to_string_lossy()).map_err(|e| StoreError::Io {
                path: pattern.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            })?;
            for path in entries.flatten() {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    features.push(stem.to_string());
                }
            }
        }
        features.sort();
        features.dedup();
        Ok(features)
    }

    pub fn load(&self, feature: &str) -> Result<WorkSet, StoreError> {
        let path = self.path_for(feature);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    feature: feature.to_string(),
                    path,
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_yaml::from_str(&content).map_err(|source| StoreError::Parse { path, source })
    }

    pub fn save(&self, workset: &WorkSet) -> Result<(), StoreError> {
        let path = self.path_for(&workset.feature);
        let yaml = serde_yaml::to_string(workset).map_err(|source| StoreError::Serialize {
            feature: workset.feature.clone(),
            source,
        })?;
        write_atomic(&path, &yaml).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(feature = %workset.feature, path = %path.display(), "WorkSet saved");
        Ok(())
    }

    /// Re-read the WorkSet from disk, mark `item` completed and save.
    ///
    /// Reading first means edits made to the file while the agent ran (for
    /// example by the agent itself) are kept. Returns the saved WorkSet.
    pub fn complete_item(
        &self,
        feature: &str,
        item: &str,
        at: DateTime<Utc>,
    ) -> Result<WorkSet, StoreError> {
        let mut workset = self.load(feature)?;
        if workset.get(item).is_none() {
            return Err(StoreError::UnknownItem {
                feature: feature.to_string(),
                item: item.to_string(),
            });
        }
        if workset.complete_item(item, at) {
            self.save(&workset)?;
        }
        Ok(workset)
    }

    /// Absolute path of the PRD the WorkSet references, if any.
    pub fn prd_path(&self, workset: &WorkSet) -> Option<PathBuf> {
        workset.prd.as_ref().map(|prd| {
            let path = Path::new(prd);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.project_dir.join(path)
            }
        })
    }

    /// PRD text, or `None` when the WorkSet references none or the file is missing.
    pub fn load_prd(&self, workset: &WorkSet) -> Option<String> {
        let path = self.prd_path(workset)?;
        fs::read_to_string(path).ok()
    }
}

/// Write `text` to `path` through a temp file and rename.
pub(crate) fn write_atomic(path: &Path, text: &str) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "target path has no parent directory")
    })?;
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("workset.yaml");
    let tmp = parent.join(format!(".{}.tmp-{}", file_name, uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{TaskStatus, WorkItem};
    use tempfile::tempdir;

    fn store(dir: &Path) -> PlanStore {
        PlanStore::new(dir, dir.join(".tasksmith/tasks"))
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let ws = WorkSet::new("auth", vec![WorkItem::new("T1", "first")]);
        store.save(&ws).unwrap();

        let loaded = store.load("auth").unwrap();
        assert_eq!(loaded, ws);
        // no temp files left behind
        let leftovers: Vec<_> = fs::read_dir(store.tasks_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let err = store(dir.path()).load("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(err.to_string().contains("No WorkSet named 'nope'"));
    }

    #[test]
    fn test_load_malformed_is_parse_error() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(store.tasks_dir()).unwrap();
        fs::write(store.tasks_dir().join("bad.yaml"), "feature: [unclosed").unwrap();
        assert!(matches!(store.load("bad"), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_yml_extension_is_found() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(store.tasks_dir()).unwrap();
        let ws = WorkSet::new("legacy", vec![]);
        fs::write(
            store.tasks_dir().join("legacy.yml"),
            serde_yaml::to_string(&ws).unwrap(),
        )
        .unwrap();
        assert_eq!(store.load("legacy").unwrap().feature, "legacy");
        assert_eq!(store.list().unwrap(), vec!["legacy"]);
    }

    #[test]
    fn test_list_sorted() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.save(&WorkSet::new("zeta", vec![])).unwrap();
        store.save(&WorkSet::new("alpha", vec![])).unwrap();
        assert_eq!(store.list().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_complete_item_reloads_from_disk() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store
            .save(&WorkSet::new("auth", vec![WorkItem::new("T1", "first")]))
            .unwrap();

        // someone appends a task while the agent runs
        let mut on_disk = store.load("auth").unwrap();
        on_disk.items.push(WorkItem::new("T2", "added later"));
        store.save(&on_disk).unwrap();

        let saved = store.complete_item("auth", "T1", Utc::now()).unwrap();
        assert_eq!(saved.items.len(), 2);
        let reloaded = store.load("auth").unwrap();
        assert_eq!(reloaded.get("T1").unwrap().status, TaskStatus::Completed);
        assert!(reloaded.get("T1").unwrap().completed_at.is_some());
        assert!(reloaded.updated_at >= reloaded.created_at);
    }

    #[test]
    fn test_complete_unknown_item() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.save(&WorkSet::new("auth", vec![])).unwrap();
        assert!(matches!(
            store.complete_item("auth", "T9", Utc::now()),
            Err(StoreError::UnknownItem { .. })
        ));
    }

    #[test]
    fn test_prd_path_resolution() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut ws = WorkSet::new("auth", vec![]);
        assert!(store.prd_path(&ws).is_none());

        ws.prd = Some(".tasksmith/prds/auth.md".into());
        assert_eq!(
            store.prd_path(&ws).unwrap(),
            dir.path().join(".tasksmith/prds/auth.md")
        );
        assert!(store.load_prd(&ws).is_none());

        fs::create_dir_all(dir.path().join(".tasksmith/prds")).unwrap();
        fs::write(dir.path().join(".tasksmith/prds/auth.md"), "# Auth PRD").unwrap();
        assert_eq!(store.load_prd(&ws).as_deref(), Some("# Auth PRD"));
    }
}
