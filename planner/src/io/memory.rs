//! Long-term memory of completed plan nodes.
//!
//! The store is append-only. Each record is written with a single `write_all`
//! on a file opened in append mode so concurrent readers see whole lines only.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::types::TaskStatus;
use crate::tree::{NodeId, TaskTree};

/// What the memory keeps about one completed node.
///
/// `id` is only unique within one pass of one session; `key` is unique across
/// the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNodeRecord {
    pub key: Uuid,
    /// Planning session (one `Planner::plan` call) that produced the node.
    pub session: Uuid,
    pub id: NodeId,
    pub name: String,
    pub status: TaskStatus,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub stored_at: String,
}

impl TaskNodeRecord {
    pub fn from_tree(tree: &TaskTree, id: NodeId, session: Uuid) -> Self {
        let node = &tree[id];
        Self {
            key: Uuid::new_v4(),
            session,
            id,
            name: node.name().to_string(),
            status: node.status(),
            parent: node.parent().map(|parent| tree[parent].name().to_string()),
            children: tree.child_names(id),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub trait PlanMemory {
    fn store(&self, record: &TaskNodeRecord) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMemory;

impl PlanMemory for NoopMemory {
    fn store(&self, _record: &TaskNodeRecord) -> Result<()> {
        Ok(())
    }
}

/// JSON-lines memory file.
#[derive(Debug, Clone)]
pub struct JsonlPlanMemory {
    path: PathBuf,
}

impl JsonlPlanMemory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record, oldest first.
    pub fn load(&self) -> Result<Vec<TaskNodeRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read memory {}", self.path.display()))?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("parse memory record {} in {}", idx + 1, self.path.display())
                })
            })
            .collect()
    }
}

impl PlanMemory for JsonlPlanMemory {
    fn store(&self, record: &TaskNodeRecord) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(record).context("serialize memory record")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open memory {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append memory {}", self.path.display()))?;
        debug!(key = %record.key, node = %record.id, name = %record.name, "stored completed node");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_appended_and_reloaded_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let memory = JsonlPlanMemory::new(temp.path().join("memory.jsonl"));

        let mut tree = TaskTree::new("serve tea");
        let root = tree.root();
        let boil = tree.push_child(root, "boil water");
        tree.set_status(boil, TaskStatus::Completed);
        tree.set_status(root, TaskStatus::Completed);

        let session = Uuid::new_v4();
        memory
            .store(&TaskNodeRecord::from_tree(&tree, boil, session))
            .expect("store leaf");
        memory
            .store(&TaskNodeRecord::from_tree(&tree, root, session))
            .expect("store root");

        let records = memory.load().expect("load");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "boil water");
        assert_eq!(records[0].parent.as_deref(), Some("serve tea"));
        assert_eq!(records[1].children, vec!["boil water".to_string()]);
        assert!(records.iter().all(|record| record.session == session));
    }

    #[test]
    fn reused_node_ids_get_distinct_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let memory = JsonlPlanMemory::new(temp.path().join("memory.jsonl"));

        // Two sessions build the same tree shape and so mint the same ids.
        for _ in 0..2 {
            let mut tree = TaskTree::new("wipe table");
            let root = tree.root();
            tree.set_status(root, TaskStatus::Completed);
            memory
                .store(&TaskNodeRecord::from_tree(&tree, root, Uuid::new_v4()))
                .expect("store");
        }

        let records = memory.load().expect("load");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, records[1].id);
        assert_ne!(records[0].key, records[1].key);
        assert_ne!(records[0].session, records[1].session);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let memory = JsonlPlanMemory::new(temp.path().join("absent.jsonl"));
        assert!(memory.load().expect("load").is_empty());
    }
}
