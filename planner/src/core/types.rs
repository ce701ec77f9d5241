//! Shared deterministic types for planner core logic.
//!
//! These types define stable contracts between core components. They do not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task node.
///
/// Within one decomposition pass a node only moves forward:
/// `pending -> in_progress -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// True for `completed` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `self -> next` is a legal move within one pass.
    ///
    /// Re-asserting the current status is always allowed.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        if self == next {
            return true;
        }
        match self {
            TaskStatus::Pending => next != TaskStatus::Pending,
            TaskStatus::InProgress => next.is_terminal(),
            TaskStatus::Completed | TaskStatus::Failed => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque description of the environment, threaded through the plan.
///
/// Only the executor capability produces a new value; everything else reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldState(String);

impl WorldState {
    pub fn new(description: impl Into<String>) -> Self {
        Self(description.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorldState {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for WorldState {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One proposed decomposition of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Zero-based generation index; breaks score ties (earlier wins).
    pub order: usize,
    pub subtasks: Vec<String>,
    /// Quality score in `[0, 1]`.
    pub score: f64,
}

impl Candidate {
    pub fn new(order: usize, subtasks: Vec<String>, score: f64) -> Self {
        Self {
            order,
            subtasks,
            score,
        }
    }

    /// Placeholder for a generation attempt that produced nothing usable.
    pub fn empty(order: usize) -> Self {
        Self::new(order, Vec::new(), 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }
}

/// Validator outcome recorded for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
    /// Never sent to the validator (an earlier candidate was accepted).
    Unchecked,
}

/// A candidate paired with its validator verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgedCandidate {
    pub candidate: Candidate,
    pub verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Pending));
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
    }
}
