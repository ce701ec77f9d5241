//! Test-only helpers: a scripted oracle, recording sinks and fixtures.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};

use crate::core::types::WorldState;
use crate::decompose::PlanContext;
use crate::io::memory::{PlanMemory, TaskNodeRecord};
use crate::io::progress::ProgressSink;
use crate::oracle::{
    CandidateScorer, Capability, ExecutabilityTest, Executor, GoalTest, OracleError,
    OracleResult, PrimitiveTest, SubtaskGenerator, SubtaskValidator, Translator,
};
use crate::tree::PlanSnapshot;

/// Score returned for candidates without a scripted score.
pub const DEFAULT_SCORE: f64 = 0.5;

/// Deterministic planning context for tests.
pub fn context(max_depth: u32) -> PlanContext {
    PlanContext {
        goal_input: "goal".to_string(),
        goal_task: "goal task".to_string(),
        capabilities: "caps".to_string(),
        max_depth,
    }
}

/// Fresh temporary directory for file-backed stores.
pub fn temp_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir().context("create temp dir")
}

/// Oracle whose every answer is scripted up front.
///
/// Unscripted behavior: tasks are composite, the generator returns an empty
/// list, translation is the identity, every task is executable, execution
/// appends ` | <task>` to the state, scores are [`DEFAULT_SCORE`], every
/// candidate validates, and the goal is never reached.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    primitives: HashSet<String>,
    translations: HashMap<String, String>,
    not_executable: HashSet<String>,
    executor_failures: HashSet<String>,
    decompositions: HashMap<String, Vec<Vec<String>>>,
    scores: HashMap<(String, Vec<String>), f64>,
    rejected: HashSet<String>,
    accepted_only: HashMap<String, Vec<Vec<String>>>,
    goal_marker: Option<String>,
    goal_fails: bool,
    goal_malformed: Cell<usize>,
    generator_malformed: RefCell<HashMap<String, usize>>,
    generator_failures: HashSet<String>,
    validator_failures: HashSet<String>,
    calls: RefCell<HashMap<Capability, usize>>,
    generator_cursor: RefCell<HashMap<String, usize>>,
    executed: RefCell<Vec<(String, String)>>,
    generator_requests: RefCell<Vec<(String, u32, Vec<String>)>>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primitive(mut self, task: &str) -> Self {
        self.primitives.insert(task.to_string());
        self
    }

    pub fn translate(mut self, task: &str, translated: &str) -> Self {
        self.translations
            .insert(task.to_string(), translated.to_string());
        self
    }

    pub fn not_executable(mut self, task: &str) -> Self {
        self.not_executable.insert(task.to_string());
        self
    }

    pub fn executor_fails(mut self, task: &str) -> Self {
        self.executor_failures.insert(task.to_string());
        self
    }

    /// Generator answers for `task`, returned in turn and cycled.
    pub fn decompose(mut self, task: &str, answers: &[&[&str]]) -> Self {
        self.decompositions.insert(
            task.to_string(),
            answers.iter().map(|answer| owned(answer)).collect(),
        );
        self
    }

    /// Scores for the answers given to [`Self::decompose`], in the same order.
    pub fn scores(mut self, task: &str, scores: &[f64]) -> Self {
        let answers = self.decompositions.get(task).cloned().unwrap_or_default();
        for (answer, score) in answers.into_iter().zip(scores) {
            self.scores.insert((task.to_string(), answer), *score);
        }
        self
    }

    pub fn reject_all(mut self, task: &str) -> Self {
        self.rejected.insert(task.to_string());
        self
    }

    /// Only these decompositions of `task` pass validation.
    pub fn accept_only(mut self, task: &str, subtasks: &[&str]) -> Self {
        self.accepted_only
            .entry(task.to_string())
            .or_default()
            .push(owned(subtasks));
        self
    }

    /// The goal holds once the state mentions `marker`.
    pub fn goal_when_state_contains(mut self, marker: &str) -> Self {
        self.goal_marker = Some(marker.to_string());
        self
    }

    pub fn goal_test_fails(mut self) -> Self {
        self.goal_fails = true;
        self
    }

    /// Every goal-test answer is malformed.
    pub fn goal_test_malformed(self) -> Self {
        self.goal_test_malformed_times(usize::MAX)
    }

    /// The first `times` goal-test answers are malformed.
    pub fn goal_test_malformed_times(self, times: usize) -> Self {
        self.goal_malformed.set(times);
        self
    }

    /// The first `times` generator answers for `task` are malformed.
    pub fn generator_malformed(self, task: &str, times: usize) -> Self {
        self.generator_malformed
            .borrow_mut()
            .insert(task.to_string(), times);
        self
    }

    pub fn generator_fails(mut self, task: &str) -> Self {
        self.generator_failures.insert(task.to_string());
        self
    }

    pub fn validator_fails(mut self, task: &str) -> Self {
        self.validator_failures.insert(task.to_string());
        self
    }

    pub fn calls(&self, capability: Capability) -> usize {
        self.calls.borrow().get(&capability).copied().unwrap_or(0)
    }

    /// `(state, task)` pairs passed to the executor, in call order.
    pub fn executed_states(&self) -> Vec<(String, String)> {
        self.executed.borrow().clone()
    }

    /// `(task, remaining_depth, history)` of each generator call.
    pub fn generator_requests(&self) -> Vec<(String, u32, Vec<String>)> {
        self.generator_requests.borrow().clone()
    }

    fn count(&self, capability: Capability) {
        *self.calls.borrow_mut().entry(capability).or_insert(0) += 1;
    }
}

impl GoalTest for ScriptedOracle {
    fn is_goal(&self, state: &WorldState, _goal: &str) -> OracleResult<bool> {
        self.count(Capability::GoalTest);
        if self.goal_fails {
            return Err(OracleError::failure(Capability::GoalTest, "scripted failure"));
        }
        let malformed = self.goal_malformed.get();
        if malformed > 0 {
            self.goal_malformed.set(malformed - 1);
            return Err(OracleError::malformed(
                Capability::GoalTest,
                "No, the cup is not yet full.",
            ));
        }
        Ok(self
            .goal_marker
            .as_deref()
            .is_some_and(|marker| state.as_str().contains(marker)))
    }
}

impl PrimitiveTest for ScriptedOracle {
    fn is_primitive(&self, task: &str) -> OracleResult<bool> {
        self.count(Capability::PrimitiveTest);
        Ok(self.primitives.contains(task))
    }
}

impl Translator for ScriptedOracle {
    fn translate(&self, _goal_input: &str, task: &str, _capabilities: &str) -> OracleResult<String> {
        self.count(Capability::Translator);
        Ok(self
            .translations
            .get(task)
            .cloned()
            .unwrap_or_else(|| task.to_string()))
    }
}

impl ExecutabilityTest for ScriptedOracle {
    fn can_execute(
        &self,
        task: &str,
        _capabilities: &str,
        _state: &WorldState,
    ) -> OracleResult<bool> {
        self.count(Capability::ExecutabilityTest);
        Ok(!self.not_executable.contains(task))
    }
}

impl Executor for ScriptedOracle {
    fn execute(&self, state: &WorldState, task: &str) -> OracleResult<WorldState> {
        self.count(Capability::Executor);
        if self.executor_failures.contains(task) {
            return Err(OracleError::failure(Capability::Executor, "scripted failure"));
        }
        self.executed
            .borrow_mut()
            .push((state.as_str().to_string(), task.to_string()));
        Ok(WorldState::new(format!("{state} | {task}")))
    }
}

impl SubtaskGenerator for ScriptedOracle {
    fn subtasks(
        &self,
        task: &str,
        _state: &WorldState,
        remaining_depth: u32,
        _capabilities: &str,
        history: &[String],
    ) -> OracleResult<Vec<String>> {
        self.count(Capability::SubtaskGenerator);
        self.generator_requests.borrow_mut().push((
            task.to_string(),
            remaining_depth,
            history.to_vec(),
        ));
        if self.generator_failures.contains(task) {
            return Err(OracleError::failure(
                Capability::SubtaskGenerator,
                "scripted failure",
            ));
        }
        if let Some(remaining) = self.generator_malformed.borrow_mut().get_mut(task)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(OracleError::malformed(
                Capability::SubtaskGenerator,
                "here are some subtasks",
            ));
        }
        let Some(answers) = self.decompositions.get(task).filter(|a| !a.is_empty()) else {
            return Ok(Vec::new());
        };
        let mut cursor = self.generator_cursor.borrow_mut();
        let next = cursor.entry(task.to_string()).or_insert(0);
        let answer = answers[*next % answers.len()].clone();
        *next += 1;
        Ok(answer)
    }
}

impl CandidateScorer for ScriptedOracle {
    fn score(
        &self,
        _goal: &str,
        task: &str,
        subtasks: &[String],
        _capabilities: &str,
        _history: &[String],
    ) -> OracleResult<f64> {
        self.count(Capability::CandidateScorer);
        Ok(self
            .scores
            .get(&(task.to_string(), subtasks.to_vec()))
            .copied()
            .unwrap_or(DEFAULT_SCORE))
    }
}

impl SubtaskValidator for ScriptedOracle {
    fn validate(
        &self,
        task: &str,
        subtasks: &[String],
        _capabilities: &str,
        _history: &[String],
    ) -> OracleResult<bool> {
        self.count(Capability::SubtaskValidator);
        if self.validator_failures.contains(task) {
            return Err(OracleError::failure(
                Capability::SubtaskValidator,
                "scripted failure",
            ));
        }
        if self.rejected.contains(task) {
            return Ok(false);
        }
        Ok(self
            .accepted_only
            .get(task)
            .is_none_or(|allowed| allowed.iter().any(|a| a.as_slice() == subtasks)))
    }
}

/// Progress sink that keeps every snapshot.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    snapshots: RefCell<Vec<PlanSnapshot>>,
}

impl RecordingProgress {
    pub fn snapshots(&self) -> Vec<PlanSnapshot> {
        self.snapshots.borrow().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn publish(&self, snapshot: &PlanSnapshot) {
        self.snapshots.borrow_mut().push(snapshot.clone());
    }
}

/// Memory that keeps records in order.
#[derive(Debug, Default)]
pub struct RecordingMemory {
    records: RefCell<Vec<TaskNodeRecord>>,
}

impl RecordingMemory {
    pub fn records(&self) -> Vec<TaskNodeRecord> {
        self.records.borrow().clone()
    }
}

impl PlanMemory for RecordingMemory {
    fn store(&self, record: &TaskNodeRecord) -> Result<()> {
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }
}
