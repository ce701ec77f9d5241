//! Recursive HTN decomposition of a single node.
//!
//! A node either runs as a primitive leaf (translate, check, execute) or is
//! expanded into the best of several scored candidate decompositions, whose
//! subtasks are then decomposed left to right. World state is threaded through
//! the recursion by value: each child starts from the state its left sibling
//! returned.
//!
//! Oracle problems never escape this module. They are logged and surface as a
//! `failed` node, which the parent picks up through aggregation.

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::aggregate::aggregate;
use crate::core::selector::{SelectionKind, rank, select};
use crate::core::types::{Candidate, JudgedCandidate, TaskStatus, Verdict, WorldState};
use crate::io::memory::{PlanMemory, TaskNodeRecord};
use crate::io::progress::ProgressSink;
use crate::oracle::{Capability, OracleError, OracleResult, Oracles};
use crate::tree::{NodeId, TaskTree};

/// Fixed inputs of one planning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
    /// The user's goal as stated; names the root and guides translation.
    pub goal_input: String,
    /// High-level task the goal test and scorer judge against.
    pub goal_task: String,
    /// Description of what the robot can do.
    pub capabilities: String,
    pub max_depth: u32,
}

/// Search budget of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Candidate decompositions generated per composite node.
    pub candidates_per_node: u32,
    /// Attempts per generator, scorer or goal-test call while the answer is malformed.
    pub malformed_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            candidates_per_node: 3,
            malformed_retries: 3,
        }
    }
}

/// Result of decomposing one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposeOutcome {
    /// True when the node ended `completed`.
    pub success: bool,
    /// Latest world state; unchanged input state when nothing executed.
    pub state: WorldState,
}

impl DecomposeOutcome {
    fn failed(state: WorldState) -> Self {
        Self {
            success: false,
            state,
        }
    }
}

/// Call `call` until it returns something other than a malformed response,
/// at most `max_attempts` times (at least once).
pub fn retry_malformed<T>(
    max_attempts: u32,
    mut call: impl FnMut() -> OracleResult<T>,
) -> OracleResult<T> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call() {
            Err(err) if err.is_malformed() && attempt < max_attempts => {
                warn!(attempt, max_attempts, err = %err, "malformed response, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

pub struct Decomposer<'a> {
    oracles: Oracles<'a>,
    progress: &'a dyn ProgressSink,
    memory: &'a dyn PlanMemory,
    context: &'a PlanContext,
    settings: EngineSettings,
    session: Uuid,
}

impl<'a> Decomposer<'a> {
    pub fn new(
        oracles: Oracles<'a>,
        progress: &'a dyn ProgressSink,
        memory: &'a dyn PlanMemory,
        context: &'a PlanContext,
        settings: EngineSettings,
    ) -> Self {
        Self {
            oracles,
            progress,
            memory,
            context,
            settings,
            session: Uuid::new_v4(),
        }
    }

    /// Tags every record this engine stores in memory.
    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Decompose `node` at `depth`, starting from `state`.
    ///
    /// `history` is read-only here; the replanning loop owns its growth.
    #[instrument(skip_all, fields(node = %node, depth = depth))]
    pub fn decompose(
        &self,
        tree: &mut TaskTree,
        node: NodeId,
        state: WorldState,
        depth: u32,
        history: &[String],
    ) -> DecomposeOutcome {
        let task = tree[node].name().to_string();
        debug!(task = %task, max_depth = self.context.max_depth, "decomposing");

        if depth >= self.context.max_depth {
            info!(task = %task, "depth budget exhausted");
            self.finish(tree, node, TaskStatus::Failed);
            return DecomposeOutcome::failed(state);
        }

        self.update(tree, node, TaskStatus::InProgress);

        match self.oracles.primitive.is_primitive(&task) {
            Ok(true) => return self.execute_leaf(tree, node, state),
            Ok(false) => {}
            Err(err) => {
                warn!(task = %task, err = %err, "primitive test failed");
                self.finish(tree, node, TaskStatus::Failed);
                return DecomposeOutcome::failed(state);
            }
        }

        let remaining = self.context.max_depth - depth;
        let candidates = self.generate_candidates(&task, &state, remaining, history);
        let judged = self.judge(&task, rank(candidates), history);
        let Some(selection) = select(&judged) else {
            info!(task = %task, "no usable decomposition");
            self.finish(tree, node, TaskStatus::Failed);
            return DecomposeOutcome::failed(state);
        };
        if selection.kind == SelectionKind::Fallback {
            debug!(task = %task, score = selection.candidate.score, "no candidate validated, using best score");
        }
        info!(
            task = %task,
            subtasks = ?selection.candidate.subtasks,
            score = selection.candidate.score,
            "accepted decomposition"
        );

        let children: Vec<NodeId> = selection
            .candidate
            .subtasks
            .iter()
            .map(|name| tree.push_child(node, name.as_str()))
            .collect();
        self.notify(tree);

        let mut state = state;
        for child in children {
            let outcome = self.decompose(tree, child, state, depth + 1, history);
            state = outcome.state;

            if aggregate(tree, node) == TaskStatus::Failed {
                break;
            }
        }

        let status = aggregate(tree, node);
        self.finish(tree, node, status);
        DecomposeOutcome {
            success: status == TaskStatus::Completed,
            state,
        }
    }

    /// Translate, check and execute a primitive task.
    fn execute_leaf(&self, tree: &mut TaskTree, node: NodeId, state: WorldState) -> DecomposeOutcome {
        let task = tree[node].name().to_string();
        let ctx = self.context;

        let translated =
            match self
                .oracles
                .translator
                .translate(&ctx.goal_input, &task, &ctx.capabilities)
            {
                Ok(translated) => translated,
                Err(err) => {
                    warn!(task = %task, err = %err, "translation failed");
                    self.finish(tree, node, TaskStatus::Failed);
                    return DecomposeOutcome::failed(state);
                }
            };
        tree.rename(node, translated.as_str());
        debug!(task = %task, translated = %translated, "translated primitive");

        match self
            .oracles
            .executability
            .can_execute(&translated, &ctx.capabilities, &state)
        {
            Ok(true) => {}
            Ok(false) => {
                info!(task = %translated, "task is not executable");
                self.finish(tree, node, TaskStatus::Failed);
                return DecomposeOutcome::failed(state);
            }
            Err(err) => {
                warn!(task = %translated, err = %err, "executability test failed");
                self.finish(tree, node, TaskStatus::Failed);
                return DecomposeOutcome::failed(state);
            }
        }

        match self.oracles.executor.execute(&state, &translated) {
            Ok(next) => {
                info!(
                    target: "state_change",
                    task = %translated,
                    before = %state,
                    after = %next,
                    "executed task"
                );
                self.finish(tree, node, TaskStatus::Completed);
                DecomposeOutcome {
                    success: true,
                    state: next,
                }
            }
            Err(err) => {
                warn!(task = %translated, err = %err, "execution failed");
                self.finish(tree, node, TaskStatus::Failed);
                DecomposeOutcome::failed(state)
            }
        }
    }

    /// Produce exactly `candidates_per_node` scored candidates in generation order.
    ///
    /// Attempts that yield nothing usable still count, as empty zero-scored candidates.
    fn generate_candidates(
        &self,
        task: &str,
        state: &WorldState,
        remaining_depth: u32,
        history: &[String],
    ) -> Vec<Candidate> {
        let ctx = self.context;
        (0..self.settings.candidates_per_node as usize)
            .map(|order| {
                let subtasks = match self.with_malformed_retries(|| {
                    self.oracles.generator.subtasks(
                        task,
                        state,
                        remaining_depth,
                        &ctx.capabilities,
                        history,
                    )
                }) {
                    Ok(subtasks) => subtasks,
                    Err(err) => {
                        warn!(task = %task, order, err = %err, "subtask generation failed");
                        Vec::new()
                    }
                };
                if subtasks.is_empty() {
                    return Candidate::empty(order);
                }

                let score = match self.with_malformed_retries(|| {
                    self.score_checked(task, &subtasks, history)
                }) {
                    Ok(score) => score,
                    Err(err) => {
                        warn!(task = %task, order, err = %err, "scoring failed, using 0");
                        0.0
                    }
                };
                debug!(task = %task, order, ?subtasks, score, "candidate");
                Candidate::new(order, subtasks, score)
            })
            .collect()
    }

    fn score_checked(&self, task: &str, subtasks: &[String], history: &[String]) -> OracleResult<f64> {
        let ctx = self.context;
        let score = self.oracles.scorer.score(
            &ctx.goal_task,
            task,
            subtasks,
            &ctx.capabilities,
            history,
        )?;
        if score.is_finite() && (0.0..=1.0).contains(&score) {
            Ok(score)
        } else {
            Err(OracleError::malformed(
                Capability::CandidateScorer,
                score.to_string(),
            ))
        }
    }

    /// Validate ranked candidates until the first one passes.
    fn judge(&self, task: &str, ranked: Vec<Candidate>, history: &[String]) -> Vec<JudgedCandidate> {
        let mut accepted = false;
        ranked
            .into_iter()
            .map(|candidate| {
                let verdict = if accepted {
                    Verdict::Unchecked
                } else if candidate.is_empty() {
                    Verdict::Invalid
                } else {
                    match self.oracles.validator.validate(
                        task,
                        &candidate.subtasks,
                        &self.context.capabilities,
                        history,
                    ) {
                        Ok(true) => {
                            accepted = true;
                            Verdict::Valid
                        }
                        Ok(false) => Verdict::Invalid,
                        Err(err) => {
                            warn!(task = %task, order = candidate.order, err = %err, "validation failed");
                            Verdict::Invalid
                        }
                    }
                };
                JudgedCandidate { candidate, verdict }
            })
            .collect()
    }

    fn with_malformed_retries<T>(&self, call: impl FnMut() -> OracleResult<T>) -> OracleResult<T> {
        retry_malformed(self.settings.malformed_retries, call)
    }

    fn update(&self, tree: &mut TaskTree, node: NodeId, status: TaskStatus) {
        if tree[node].status() != status {
            tree.set_status(node, status);
            self.notify(tree);
        }
    }

    /// Set a terminal status, remember completed nodes and notify observers.
    fn finish(&self, tree: &mut TaskTree, node: NodeId, status: TaskStatus) {
        tree.set_status(node, status);
        if status == TaskStatus::Completed
            && let Err(err) = self
                .memory
                .store(&TaskNodeRecord::from_tree(tree, node, self.session))
        {
            warn!(node = %node, err = %format!("{err:#}"), "failed to store completed node");
        }
        self.notify(tree);
    }

    fn notify(&self, tree: &TaskTree) {
        self.progress.publish(&tree.snapshot());
    }
}
