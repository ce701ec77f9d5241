//! Plan tree storage.
//!
//! Nodes live in an arena owned by [`TaskTree`]; parents and children refer to
//! each other by [`NodeId`], so the parent link never owns anything. Ids are
//! only meaningful for the tree that minted them.

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::TaskStatus;

/// Opaque handle of a node within its [`TaskTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    id: NodeId,
    name: String,
    status: TaskStatus,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl TaskNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in decomposition order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} does not belong to this tree")]
    UnknownNode(NodeId),
    #[error("adding {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("node {child} is already attached to {parent}")]
    AlreadyAttached { child: NodeId, parent: NodeId },
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
}

/// Arena-backed task tree with a single root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTree {
    nodes: Vec<TaskNode>,
    root: NodeId,
}

impl TaskTree {
    /// Create a tree whose root is a fresh pending node named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.create(root_name);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&TaskNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes ever created, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a detached pending node.
    pub fn create(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TaskNode {
            id,
            name: name.into(),
            status: TaskStatus::Pending,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a pending node and append it under `parent`.
    pub fn push_child(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let child = self.create(name);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        child
    }

    /// Attach an existing detached node as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check(parent)?;
        self.check(child)?;
        if let Some(current) = self.nodes[child.0].parent {
            return Err(TreeError::AlreadyAttached {
                child,
                parent: current,
            });
        }
        if parent == child || self.ancestors(parent).any(|ancestor| ancestor == child) {
            return Err(TreeError::Cycle { parent, child });
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Detach `child` from `parent`, clearing its parent link.
    ///
    /// The detached subtree stays in the arena and may be re-attached.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check(parent)?;
        self.check(child)?;
        let children = &mut self.nodes[parent.0].children;
        let Some(pos) = children.iter().position(|id| *id == child) else {
            return Err(TreeError::NotAChild { parent, child });
        };
        children.remove(pos);
        self.nodes[child.0].parent = None;
        Ok(())
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) {
        self.nodes[id.0].name = name.into();
    }

    pub fn set_status(&mut self, id: NodeId, status: TaskStatus) {
        let node = &mut self.nodes[id.0];
        debug_assert!(
            node.status.can_transition_to(status),
            "illegal status transition {} -> {} for {}",
            node.status,
            status,
            id
        );
        node.status = status;
    }

    /// Walk parent links upward, nearest ancestor first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut cursor = self.get(id).and_then(|node| node.parent);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = self.nodes[current.0].parent;
            Some(current)
        })
    }

    /// Names of the direct children of `id`, in order.
    pub fn child_names(&self, id: NodeId) -> Vec<String> {
        self.nodes[id.0]
            .children
            .iter()
            .map(|child| self.nodes[child.0].name.clone())
            .collect()
    }

    /// Nested, serializable view of the whole tree.
    pub fn snapshot(&self) -> PlanSnapshot {
        self.snapshot_of(self.root)
    }

    pub fn snapshot_of(&self, id: NodeId) -> PlanSnapshot {
        let node = &self.nodes[id.0];
        PlanSnapshot {
            id: node.id,
            name: node.name.clone(),
            status: node.status,
            children: node
                .children
                .iter()
                .map(|child| self.snapshot_of(*child))
                .collect(),
        }
    }

    /// Render the attached tree as an indented outline, one node per line.
    pub fn render_outline(&self) -> String {
        let mut out = String::new();
        self.render_inner(self.root, 0, &mut out);
        out
    }

    fn render_inner(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id.0];
        out.push_str(&"  ".repeat(depth));
        out.push_str("- ");
        out.push_str(&node.name);
        out.push_str(" [");
        out.push_str(node.status.as_str());
        out.push_str("]\n");
        for child in &node.children {
            self.render_inner(*child, depth + 1, out);
        }
    }

    fn check(&self, id: NodeId) -> Result<(), TreeError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(TreeError::UnknownNode(id))
        }
    }
}

impl Index<NodeId> for TaskTree {
    type Output = TaskNode;

    fn index(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id.0]
    }
}

/// Owned, nested copy of a (sub)tree used for progress updates and output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub id: NodeId,
    pub name: String,
    pub status: TaskStatus,
    pub children: Vec<PlanSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_child_links_both_directions() {
        let mut tree = TaskTree::new("make tea");
        let root = tree.root();
        let boil = tree.push_child(root, "boil water");
        let pour = tree.push_child(root, "pour water");

        assert_eq!(tree[root].children(), &[boil, pour]);
        assert_eq!(tree[boil].parent(), Some(root));
        assert_eq!(tree.child_names(root), vec!["boil water", "pour water"]);
    }

    #[test]
    fn add_child_rejects_cycles() {
        let mut tree = TaskTree::new("root");
        let root = tree.root();
        let a = tree.push_child(root, "a");
        let b = tree.push_child(a, "b");

        let detached = tree.create("c");
        tree.add_child(b, detached).expect("attach detached node");

        assert_eq!(
            tree.add_child(detached, detached),
            Err(TreeError::Cycle {
                parent: detached,
                child: detached
            })
        );

        tree.remove_child(root, a).expect("detach a");
        assert_eq!(
            tree.add_child(detached, a),
            Err(TreeError::Cycle {
                parent: detached,
                child: a
            })
        );
    }

    #[test]
    fn add_child_rejects_second_parent() {
        let mut tree = TaskTree::new("root");
        let root = tree.root();
        let a = tree.push_child(root, "a");
        let b = tree.push_child(root, "b");

        assert_eq!(
            tree.add_child(b, a),
            Err(TreeError::AlreadyAttached {
                child: a,
                parent: root
            })
        );
    }

    #[test]
    fn remove_child_clears_parent() {
        let mut tree = TaskTree::new("root");
        let root = tree.root();
        let a = tree.push_child(root, "a");

        tree.remove_child(root, a).expect("remove");
        assert!(tree[root].children().is_empty());
        assert_eq!(tree[a].parent(), None);
        assert_eq!(
            tree.remove_child(root, a),
            Err(TreeError::NotAChild { parent: root, child: a })
        );
    }

    #[test]
    fn rename_changes_only_name() {
        let mut tree = TaskTree::new("root");
        let root = tree.root();
        let leaf = tree.push_child(root, "grab cup");
        let before = tree[leaf].clone();

        tree.rename(leaf, "grasp(cup)");

        let after = &tree[leaf];
        assert_eq!(after.name(), "grasp(cup)");
        assert_eq!(after.id(), before.id());
        assert_eq!(after.parent(), before.parent());
        assert_eq!(after.children(), before.children());
        assert_eq!(after.status(), before.status());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut tree = TaskTree::new("root");
        let mut big = TaskTree::new("other");
        let stray = big.push_child(big.root(), "stray");
        assert_eq!(
            tree.add_child(tree.root(), stray),
            Err(TreeError::UnknownNode(stray))
        );
    }

    #[test]
    fn outline_indents_by_depth() {
        let mut tree = TaskTree::new("root");
        let root = tree.root();
        let a = tree.push_child(root, "a");
        tree.push_child(a, "a1");

        assert_eq!(
            tree.render_outline(),
            "- root [pending]\n  - a [pending]\n    - a1 [pending]\n"
        );
    }

    #[test]
    fn snapshot_mirrors_structure() {
        let mut tree = TaskTree::new("root");
        let root = tree.root();
        let a = tree.push_child(root, "a");
        tree.set_status(a, TaskStatus::Failed);

        let snapshot = tree.snapshot();
        assert_eq!(snapshot.name, "root");
        assert_eq!(snapshot.children.len(), 1);
        assert_eq!(snapshot.children[0].status, TaskStatus::Failed);
    }
}
