//! Picks the next item to work on.

use std::collections::HashSet;

use super::{TaskStatus, WorkItem};

/// The first pending item, in declaration order, whose dependencies are all
/// completed.
///
/// A dependency id that matches no item is unsatisfied, so its dependent never
/// becomes eligible. Cycles block the same way. `None` is a normal answer.
pub fn next_eligible(items: &[WorkItem]) -> Option<&WorkItem> {
    let completed = completed_ids(items);
    items
        .iter()
        .find(|item| item.status == TaskStatus::Pending && deps_satisfied(item, &completed))
}

/// Pending items that cannot run yet, with their unmet dependency ids.
pub fn blocked_items(items: &[WorkItem]) -> Vec<(String, Vec<String>)> {
    let completed = completed_ids(items);
    items
        .iter()
        .filter(|item| item.status == TaskStatus::Pending)
        .filter_map(|item| {
            let unmet: Vec<String> = item
                .dependencies
                .iter()
                .filter(|dep| !completed.contains(dep.as_str()))
                .cloned()
                .collect();
            (!unmet.is_empty()).then(|| (item.id.clone(), unmet))
        })
        .collect()
}

fn completed_ids(items: &[WorkItem]) -> HashSet<&str> {
    items
        .iter()
        .filter(|item| item.is_completed())
        .map(|item| item.id.as_str())
        .collect()
}

fn deps_satisfied(item: &WorkItem, completed: &HashSet<&str>) -> bool {
    item.dependencies
        .iter()
        .all(|dep| completed.contains(dep.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn done(mut item: WorkItem) -> WorkItem {
        item.mark_completed(Utc::now());
        item
    }

    #[test]
    fn test_dependency_ordering() {
        let mut items = vec![
            WorkItem::new("B", "second").with_dependencies(&["A"]),
            WorkItem::new("A", "first"),
        ];
        assert_eq!(next_eligible(&items).unwrap().id, "A");

        items[1].mark_completed(Utc::now());
        assert_eq!(next_eligible(&items).unwrap().id, "B");
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let items = vec![WorkItem::new("X", "x"), WorkItem::new("Y", "y")];
        assert_eq!(next_eligible(&items).unwrap().id, "X");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let items = vec![
            done(WorkItem::new("A", "a")),
            WorkItem::new("B", "b").with_dependencies(&["A"]),
            WorkItem::new("C", "c"),
        ];
        let first = next_eligible(&items).map(|i| i.id.clone());
        let second = next_eligible(&items).map(|i| i.id.clone());
        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("B"));
    }

    #[test]
    fn test_completed_items_are_never_reselected() {
        let items = vec![done(WorkItem::new("A", "a")), done(WorkItem::new("B", "b"))];
        assert!(next_eligible(&items).is_none());
    }

    #[test]
    fn test_non_pending_statuses_are_skipped() {
        let mut in_progress = WorkItem::new("A", "a");
        in_progress.status = TaskStatus::InProgress;
        let mut failed = WorkItem::new("B", "b");
        failed.status = TaskStatus::Failed;
        let items = vec![in_progress, failed, WorkItem::new("C", "c")];
        assert_eq!(next_eligible(&items).unwrap().id, "C");
    }

    #[test]
    fn test_dangling_dependency_blocks_without_error() {
        let items = vec![WorkItem::new("A", "a").with_dependencies(&["ghost"])];
        assert!(next_eligible(&items).is_none());
        assert_eq!(
            blocked_items(&items),
            vec![("A".to_string(), vec!["ghost".to_string()])]
        );
    }

    #[test]
    fn test_cycle_blocks_silently() {
        let items = vec![
            WorkItem::new("A", "a").with_dependencies(&["B"]),
            WorkItem::new("B", "b").with_dependencies(&["A"]),
        ];
        assert!(next_eligible(&items).is_none());
        assert_eq!(blocked_items(&items).len(), 2);
    }

    #[test]
    fn test_empty_list() {
        assert!(next_eligible(&[]).is_none());
    }
}
