//! Append-only progress log, one file per feature.
//!
//! Format: `timestamp|item|phase|status|detail`, one entry per line. Lines are
//! only ever appended; a malformed line is skipped on read.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::phase::Phase;

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_ABORTED: &str = "aborted";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub timestamp: DateTime<Utc>,
    pub item: String,
    pub phase: Phase,
    pub status: String,
    pub detail: String,
}

impl ProgressEntry {
    /// One-line rendering used in prompts and `tasksmith status`.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {} {} ({})",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.item,
            self.status,
            self.phase
        );
        if !self.detail.is_empty() {
            line.push_str(": ");
            line.push_str(&self.detail);
        }
        line
    }

    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(5, '|');
        let timestamp = DateTime::parse_from_rfc3339(parts.next()?)
            .ok()?
            .with_timezone(&Utc);
        let item = parts.next()?.to_string();
        let phase = parts.next()?.parse().ok()?;
        let status = parts.next()?.to_string();
        let detail = parts.next().unwrap_or_default().to_string();
        Some(Self {
            timestamp,
            item,
            phase,
            status,
            detail,
        })
    }
}

/// Flatten a value so it stays inside one `|`-separated field.
fn field(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '|' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Newlines and `|` in `detail` are flattened to spaces.
    pub fn append(&self, item: &str, phase: Phase, status: &str, detail: &str) -> io::Result<()> {
        let entry = format!(
            "{}|{}|{}|{}|{}\n",
            Utc::now().to_rfc3339(),
            field(item),
            phase,
            status,
            field(detail)
        );

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(entry.as_bytes())
    }

    pub fn entries(&self) -> Result<Vec<ProgressEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read progress log {}", self.path.display()))?;
        Ok(content.lines().filter_map(ProgressEntry::parse).collect())
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Result<Vec<ProgressEntry>> {
        let mut entries = self.entries()?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }

    /// Ids of items with a `completed` entry, in log order.
    pub fn completed_items(&self) -> Result<Vec<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.status == STATUS_COMPLETED)
            .map(|e| e.item)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_log() -> (ProgressLog, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress").join("auth.log");
        (ProgressLog::new(path), dir)
    }

    #[test]
    fn test_empty_log() {
        let (log, _dir) = make_log();
        assert!(log.entries().unwrap().is_empty());
        assert!(log.recent(3).unwrap().is_empty());
    }

    #[test]
    fn test_append_and_read_back() {
        let (log, _dir) = make_log();
        log.append("T1", Phase::Finalize, STATUS_COMPLETED, "abc1234 add user model").unwrap();
        log.append("T2", Phase::Review, STATUS_ABORTED, "RateLimited").unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].item, "T1");
        assert_eq!(entries[0].phase, Phase::Finalize);
        assert_eq!(entries[0].status, "completed");
        assert_eq!(entries[0].detail, "abc1234 add user model");
        assert_eq!(entries[1].phase, Phase::Review);
        assert_eq!(log.completed_items().unwrap(), vec!["T1"]);
    }

    #[test]
    fn test_detail_is_kept_on_one_line() {
        let (log, _dir) = make_log();
        log.append("T1", Phase::Implement, STATUS_ABORTED, "line one\nline|two\n").unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
        let entries = log.entries().unwrap();
        assert_eq!(entries[0].detail, "line one line two");
    }

    #[test]
    fn test_separator_in_item_id_keeps_fields_aligned() {
        let (log, _dir) = make_log();
        log.append("T1|x", Phase::Finalize, STATUS_COMPLETED, "done").unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item, "T1 x");
        assert_eq!(entries[0].phase, Phase::Finalize);
        assert_eq!(entries[0].status, "completed");
        assert_eq!(entries[0].detail, "done");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let (log, _dir) = make_log();
        log.append("T1", Phase::Finalize, STATUS_COMPLETED, "").unwrap();
        let mut file = fs::OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "garbage line").unwrap();
        writeln!(file, "2026-01-01T00:00:00Z|T2|deploy|completed|").unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item, "T1");
    }

    #[test]
    fn test_recent_keeps_tail_in_order() {
        let (log, _dir) = make_log();
        for id in ["T1", "T2", "T3", "T4"] {
            log.append(id, Phase::Finalize, STATUS_COMPLETED, "").unwrap();
        }
        let recent: Vec<String> = log.recent(2).unwrap().into_iter().map(|e| e.item).collect();
        assert_eq!(recent, vec!["T3", "T4"]);
        assert_eq!(log.recent(10).unwrap().len(), 4);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.log");
        ProgressLog::new(&path)
            .append("T1", Phase::Finalize, STATUS_COMPLETED, "")
            .unwrap();
        let entries = ProgressLog::new(&path).entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].summary().contains("T1 completed (finalize)"));
    }
}
