//! Status aggregation from children to parent.
//!
//! Aggregation does not cascade: callers recompute a parent explicitly after
//! each child update.

use crate::core::types::TaskStatus;
use crate::tree::{NodeId, TaskTree};

/// Combine a node's own status with its children's statuses.
///
/// - No children: `own` is returned untouched (set by the execution step).
/// - Any child `failed`: `failed`.
/// - All children `completed`: `completed`.
/// - Otherwise: `in_progress`.
pub fn aggregate_statuses<I>(own: TaskStatus, children: I) -> TaskStatus
where
    I: IntoIterator<Item = TaskStatus>,
{
    let mut seen_any = false;
    let mut all_completed = true;
    for status in children {
        seen_any = true;
        match status {
            TaskStatus::Failed => return TaskStatus::Failed,
            TaskStatus::Completed => {}
            TaskStatus::Pending | TaskStatus::InProgress => all_completed = false,
        }
    }

    if !seen_any {
        own
    } else if all_completed {
        TaskStatus::Completed
    } else {
        TaskStatus::InProgress
    }
}

/// Aggregate status of `id` from its direct children.
pub fn aggregate(tree: &TaskTree, id: NodeId) -> TaskStatus {
    let node = &tree[id];
    aggregate_statuses(
        node.status(),
        node.children().iter().map(|child| tree[*child].status()),
    )
}
