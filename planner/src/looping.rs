//! Replanning loop around the decomposition engine.
//!
//! Each iteration asks the goal test first, then decomposes a fresh root
//! built from the goal input. A failed pass hands its reached world state,
//! the set of top-level task names it tried and those names (as history) to
//! the next pass. The loop stops when the goal holds, a pass succeeds, a
//! top-level task set repeats, or the iteration ceiling is hit.

use std::collections::{BTreeSet, HashSet};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::invariants::validate_settled;
use crate::core::types::{TaskStatus, WorldState};
use crate::decompose::{Decomposer, EngineSettings, PlanContext, retry_malformed};
use crate::io::memory::PlanMemory;
use crate::io::progress::ProgressSink;
use crate::oracle::{OracleError, Oracles};
use crate::tree::TaskTree;

/// Why `plan` stopped, with the tree it ended on.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// The goal test held before (further) decomposition; the root has no children.
    GoalSatisfied { tree: TaskTree, iterations: u32 },
    /// A decomposition pass completed the root.
    Planned { tree: TaskTree, iterations: u32 },
    /// A pass proposed a top-level task set that an earlier pass already tried.
    RepetitionDetected {
        tree: TaskTree,
        task_set: Vec<String>,
        iterations: u32,
    },
    /// The iteration ceiling was reached without a plan.
    IterationLimit { tree: TaskTree, iterations: u32 },
}

impl PlanOutcome {
    /// The plan, when one was found.
    pub fn plan(&self) -> Option<&TaskTree> {
        match self {
            PlanOutcome::GoalSatisfied { tree, .. } | PlanOutcome::Planned { tree, .. } => {
                Some(tree)
            }
            PlanOutcome::RepetitionDetected { .. } | PlanOutcome::IterationLimit { .. } => None,
        }
    }

    pub fn into_plan(self) -> Option<TaskTree> {
        match self {
            PlanOutcome::GoalSatisfied { tree, .. } | PlanOutcome::Planned { tree, .. } => {
                Some(tree)
            }
            PlanOutcome::RepetitionDetected { .. } | PlanOutcome::IterationLimit { .. } => None,
        }
    }

    /// The last tree built, plan or not.
    pub fn tree(&self) -> &TaskTree {
        match self {
            PlanOutcome::GoalSatisfied { tree, .. }
            | PlanOutcome::Planned { tree, .. }
            | PlanOutcome::RepetitionDetected { tree, .. }
            | PlanOutcome::IterationLimit { tree, .. } => tree,
        }
    }

    pub fn iterations(&self) -> u32 {
        match self {
            PlanOutcome::GoalSatisfied { iterations, .. }
            | PlanOutcome::Planned { iterations, .. }
            | PlanOutcome::RepetitionDetected { iterations, .. }
            | PlanOutcome::IterationLimit { iterations, .. } => *iterations,
        }
    }
}

/// Loop-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub engine: EngineSettings,
    /// Hard ceiling on replanning iterations.
    pub max_iterations: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            max_iterations: 100,
        }
    }
}

pub struct Planner<'a> {
    oracles: Oracles<'a>,
    progress: &'a dyn ProgressSink,
    memory: &'a dyn PlanMemory,
    settings: LoopSettings,
}

impl<'a> Planner<'a> {
    pub fn new(
        oracles: Oracles<'a>,
        progress: &'a dyn ProgressSink,
        memory: &'a dyn PlanMemory,
        settings: LoopSettings,
    ) -> Self {
        Self {
            oracles,
            progress,
            memory,
            settings,
        }
    }

    /// Plan for `context` starting from `initial_state`.
    ///
    /// Only a goal-test transport failure is an error: without it the loop
    /// cannot tell whether it is done. Every other oracle problem ends up as a
    /// failed node.
    pub fn plan(&self, context: &PlanContext, initial_state: WorldState) -> Result<PlanOutcome> {
        let engine = Decomposer::new(
            self.oracles,
            self.progress,
            self.memory,
            context,
            self.settings.engine,
        );
        let mut state = initial_state;
        let mut seen: HashSet<BTreeSet<String>> = HashSet::new();
        let mut history: Vec<String> = Vec::new();
        let mut last = TaskTree::new(context.goal_input.as_str());

        info!(
            goal = %context.goal_task,
            max_depth = context.max_depth,
            session = %engine.session(),
            "planning"
        );
        for iteration in 1..=self.settings.max_iterations {
            let mut tree = TaskTree::new(context.goal_input.as_str());
            let root = tree.root();

            let reached = self
                .goal_reached(&state, &context.goal_task)
                .with_context(|| format!("goal test in iteration {iteration}"))?;
            if reached {
                info!(iteration, "goal satisfied");
                tree.set_status(root, TaskStatus::Completed);
                self.progress.publish(&tree.snapshot());
                return Ok(PlanOutcome::GoalSatisfied {
                    tree,
                    iterations: iteration,
                });
            }

            self.progress.publish(&tree.snapshot());

            let outcome = engine.decompose(&mut tree, root, state, 0, &history);
            state = outcome.state;
            let violations = validate_settled(&tree);
            if !violations.is_empty() {
                warn!(iteration, ?violations, "pass left an inconsistent tree");
            }
            if outcome.success {
                tree.set_status(root, TaskStatus::Completed);
                info!(iteration, "plan found");
                return Ok(PlanOutcome::Planned {
                    tree,
                    iterations: iteration,
                });
            }

            let names = tree.child_names(root);
            let task_set: BTreeSet<String> = names.iter().cloned().collect();
            if !seen.insert(task_set) {
                warn!(iteration, tasks = ?names, "top-level task set repeated, giving up");
                return Ok(PlanOutcome::RepetitionDetected {
                    tree,
                    task_set: names,
                    iterations: iteration,
                });
            }
            debug!(iteration, tasks = ?names, "pass failed, replanning");
            history.extend(names);
            last = tree;
        }

        warn!(
            max_iterations = self.settings.max_iterations,
            "iteration ceiling reached"
        );
        Ok(PlanOutcome::IterationLimit {
            tree: last,
            iterations: self.settings.max_iterations,
        })
    }

    /// Ask the goal test, retrying malformed answers.
    ///
    /// An answer that stays malformed counts as "not reached".
    fn goal_reached(&self, state: &WorldState, goal: &str) -> Result<bool, OracleError> {
        match retry_malformed(self.settings.engine.malformed_retries, || {
            self.oracles.goal.is_goal(state, goal)
        }) {
            Err(err) if err.is_malformed() => {
                warn!(err = %err, "goal test stayed malformed, treating goal as not reached");
                Ok(false)
            }
            other => other,
        }
    }
}
