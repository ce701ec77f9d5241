//! Structural and status invariants of a finished decomposition pass.

use std::collections::HashSet;

use crate::core::aggregate::aggregate;
use crate::core::types::TaskStatus;
use crate::tree::{NodeId, TaskTree};

/// Check a tree after a pass has returned:
/// - every child's parent link points back at the node listing it
/// - no node is reachable twice from the root
/// - no node is left in progress
/// - every composite node's status equals the aggregate of its children
pub fn validate_settled(tree: &TaskTree) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let root = tree.root();
    if tree[root].parent().is_some() {
        errors.push(format!("root {root} has a parent"));
    }
    validate_node(tree, root, &mut seen, &mut errors, tree[root].name());
    errors
}

fn validate_node(
    tree: &TaskTree,
    id: NodeId,
    seen: &mut HashSet<NodeId>,
    errors: &mut Vec<String>,
    path: &str,
) {
    if !seen.insert(id) {
        errors.push(format!("{path}: node {id} reachable more than once"));
        return;
    }

    let node = &tree[id];
    if node.status() == TaskStatus::InProgress {
        errors.push(format!("{path}: still in progress"));
    }
    if !node.is_leaf() {
        let expected = aggregate(tree, id);
        if node.status() != expected {
            errors.push(format!(
                "{path}: status {} but children aggregate to {expected}",
                node.status()
            ));
        }
    }

    for &child in node.children() {
        let child_node = &tree[child];
        let child_path = format!("{path}/{}", child_node.name());
        if child_node.parent() != Some(id) {
            errors.push(format!("{child_path}: parent link does not point at {id}"));
        }
        validate_node(tree, child, seen, errors, &child_path);
    }
}
