//! Capability contracts the planner asks of its reasoning oracle.
//!
//! Each judgment the engine needs is its own trait so tests can fake any one of
//! them in isolation. The engine only sees typed values: decoding raw service
//! text happens in `io::decode`, before a value reaches these traits' callers.

use std::fmt;

use thiserror::Error;

use crate::core::types::WorldState;

/// Named oracle capability, used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    GoalTest,
    PrimitiveTest,
    Translator,
    ExecutabilityTest,
    Executor,
    SubtaskGenerator,
    CandidateScorer,
    SubtaskValidator,
    /// Derives the goal task from the user's goal before planning.
    InitialTask,
    /// Shortens the capability description before planning.
    CapabilityCompression,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::GoalTest => "goal_test",
            Capability::PrimitiveTest => "primitive_test",
            Capability::Translator => "translator",
            Capability::ExecutabilityTest => "executability_test",
            Capability::Executor => "executor",
            Capability::SubtaskGenerator => "subtask_generator",
            Capability::CandidateScorer => "candidate_scorer",
            Capability::SubtaskValidator => "subtask_validator",
            Capability::InitialTask => "initial_task",
            Capability::CapabilityCompression => "compress_capabilities",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// The capability could not produce an answer (after its own retries).
    #[error("{capability} failed: {message}")]
    Failure {
        capability: Capability,
        message: String,
    },
    /// The capability answered outside its contract.
    #[error("{capability} returned a malformed response: {response:?}")]
    Malformed {
        capability: Capability,
        response: String,
    },
}

impl OracleError {
    pub fn failure(capability: Capability, message: impl Into<String>) -> Self {
        OracleError::Failure {
            capability,
            message: message.into(),
        }
    }

    pub fn malformed(capability: Capability, response: impl Into<String>) -> Self {
        OracleError::Malformed {
            capability,
            response: response.into(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, OracleError::Malformed { .. })
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

pub trait GoalTest {
    fn is_goal(&self, state: &WorldState, goal: &str) -> OracleResult<bool>;
}

pub trait PrimitiveTest {
    fn is_primitive(&self, task: &str) -> OracleResult<bool>;
}

pub trait Translator {
    /// Rewrite `task` into a form the robot's capabilities can execute.
    fn translate(&self, goal_input: &str, task: &str, capabilities: &str) -> OracleResult<String>;
}

pub trait ExecutabilityTest {
    fn can_execute(&self, task: &str, capabilities: &str, state: &WorldState)
    -> OracleResult<bool>;
}

pub trait Executor {
    /// Execute `task` and return the resulting world state.
    fn execute(&self, state: &WorldState, task: &str) -> OracleResult<WorldState>;
}

pub trait SubtaskGenerator {
    /// Propose an ordered decomposition of `task`. An empty list is a legal answer.
    fn subtasks(
        &self,
        task: &str,
        state: &WorldState,
        remaining_depth: u32,
        capabilities: &str,
        history: &[String],
    ) -> OracleResult<Vec<String>>;
}

pub trait CandidateScorer {
    /// Score in `[0, 1]`; anything else breaks the contract.
    fn score(
        &self,
        goal: &str,
        task: &str,
        subtasks: &[String],
        capabilities: &str,
        history: &[String],
    ) -> OracleResult<f64>;
}

pub trait SubtaskValidator {
    fn validate(
        &self,
        task: &str,
        subtasks: &[String],
        capabilities: &str,
        history: &[String],
    ) -> OracleResult<bool>;
}

/// The full set of capabilities one planning session uses.
#[derive(Clone, Copy)]
pub struct Oracles<'a> {
    pub goal: &'a dyn GoalTest,
    pub primitive: &'a dyn PrimitiveTest,
    pub translator: &'a dyn Translator,
    pub executability: &'a dyn ExecutabilityTest,
    pub executor: &'a dyn Executor,
    pub generator: &'a dyn SubtaskGenerator,
    pub scorer: &'a dyn CandidateScorer,
    pub validator: &'a dyn SubtaskValidator,
}

impl<'a> Oracles<'a> {
    /// Take every capability from one implementation.
    pub fn from_service<T>(service: &'a T) -> Self
    where
        T: GoalTest
            + PrimitiveTest
            + Translator
            + ExecutabilityTest
            + Executor
            + SubtaskGenerator
            + CandidateScorer
            + SubtaskValidator,
    {
        Self {
            goal: service,
            primitive: service,
            translator: service,
            executability: service,
            executor: service,
            generator: service,
            scorer: service,
            validator: service,
        }
    }

    /// Swap in a different primitive test (e.g. the keyword classifier).
    pub fn with_primitive(self, primitive: &'a dyn PrimitiveTest) -> Self {
        Self { primitive, ..self }
    }
}

impl fmt::Debug for Oracles<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Oracles").finish_non_exhaustive()
    }
}
