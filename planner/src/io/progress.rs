//! Progress notifications for observers of a running plan.
//!
//! Publishing is fire-and-forget: a sink must never block planning on a slow
//! or broken observer, so failures are logged and dropped.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::tree::PlanSnapshot;

pub trait ProgressSink {
    /// Receive the whole tree, from the root, after a change.
    fn publish(&self, snapshot: &PlanSnapshot);
}

/// Sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn publish(&self, _snapshot: &PlanSnapshot) {}
}

/// Appends each snapshot as one JSON line, for a UI to tail.
#[derive(Debug, Clone)]
pub struct JsonlProgress {
    path: PathBuf,
}

impl JsonlProgress {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, snapshot: &PlanSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(snapshot).context("serialize snapshot")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", self.path.display()))
    }
}

impl ProgressSink for JsonlProgress {
    fn publish(&self, snapshot: &PlanSnapshot) {
        if let Err(err) = self.append(snapshot) {
            warn!(path = %self.path.display(), err = %format!("{err:#}"), "dropped progress update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaskStatus;
    use crate::tree::TaskTree;

    #[test]
    fn jsonl_progress_appends_one_line_per_update() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sink = JsonlProgress::new(temp.path().join("progress/updates.jsonl"));
        let mut tree = TaskTree::new("tidy kitchen");

        sink.publish(&tree.snapshot());
        let root = tree.root();
        tree.set_status(root, TaskStatus::InProgress);
        sink.publish(&tree.snapshot());

        let contents = std::fs::read_to_string(sink.path()).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let last: PlanSnapshot = serde_json::from_str(lines[1]).expect("parse");
        assert_eq!(last.status, TaskStatus::InProgress);
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let temp = tempfile::tempdir().expect("tempdir");
        // A directory cannot be opened for appending.
        let sink = JsonlProgress::new(temp.path());
        sink.publish(&TaskTree::new("goal").snapshot());
    }
}
