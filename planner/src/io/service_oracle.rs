//! Oracle capabilities answered by a reasoning service.
//!
//! Every capability renders its prompt, asks the service once and decodes the
//! answer strictly. Transport errors become `OracleError::Failure`; answers of
//! the wrong shape become `OracleError::Malformed` so the engine can retry.

use minijinja::{Value, context};
use tracing::{debug, warn};

use crate::core::types::WorldState;
use crate::io::decode::{parse_bool, parse_score, parse_subtasks, parse_text};
use crate::io::prompt::{Prompt, PromptEngine};
use crate::io::service::ReasoningService;
use crate::oracle::{
    CandidateScorer, Capability, ExecutabilityTest, Executor, GoalTest, OracleError,
    OracleResult, PrimitiveTest, SubtaskGenerator, SubtaskValidator, Translator,
};

#[derive(Debug)]
pub struct ServiceOracle<R> {
    service: R,
    prompts: PromptEngine,
    /// Capability description shown to the granularity test, which gets no
    /// capabilities argument of its own.
    capabilities: String,
}

impl<R: ReasoningService> ServiceOracle<R> {
    pub fn new(service: R) -> Self {
        Self {
            service,
            prompts: PromptEngine::new(),
            capabilities: String::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl Into<String>) -> Self {
        self.capabilities = capabilities.into();
        self
    }

    pub fn service(&self) -> &R {
        &self.service
    }

    fn ask(&self, capability: Capability, prompt: Prompt, ctx: Value) -> OracleResult<String> {
        let rendered = self
            .prompts
            .render(prompt, ctx)
            .map_err(|err| OracleError::failure(capability, format!("{err:#}")))?;
        debug!(%capability, prompt = prompt.name(), "asking reasoning service");
        let answer = self.service.complete(&rendered).map_err(|err| {
            warn!(%capability, err = %format!("{err:#}"), "reasoning service failed");
            OracleError::failure(capability, format!("{err:#}"))
        })?;
        debug!(%capability, answer = %answer.trim(), "reasoning service answered");
        Ok(answer)
    }

    /// Suggest one high-level task that accomplishes `goal`.
    pub fn initial_task(&self, goal: &str) -> OracleResult<String> {
        let capability = Capability::InitialTask;
        let answer = self.ask(capability, Prompt::InitialTask, context! { goal })?;
        parse_text(capability, &answer)
    }

    /// Shorten a capability description before it is repeated in every prompt.
    pub fn compress_capabilities(&self, capabilities: &str) -> OracleResult<String> {
        let capability = Capability::CapabilityCompression;
        let answer = self.ask(capability, Prompt::Compress, context! { capabilities })?;
        parse_text(capability, &answer)
    }
}

impl<R: ReasoningService> GoalTest for ServiceOracle<R> {
    fn is_goal(&self, state: &WorldState, goal: &str) -> OracleResult<bool> {
        let capability = Capability::GoalTest;
        let answer = self.ask(
            capability,
            Prompt::GoalTest,
            context! { state => state.as_str(), goal },
        )?;
        parse_bool(capability, &answer)
    }
}

impl<R: ReasoningService> PrimitiveTest for ServiceOracle<R> {
    fn is_primitive(&self, task: &str) -> OracleResult<bool> {
        let capability = Capability::PrimitiveTest;
        let answer = self.ask(
            capability,
            Prompt::Granular,
            context! { task, capabilities => self.capabilities.as_str() },
        )?;
        parse_bool(capability, &answer)
    }
}

impl<R: ReasoningService> Translator for ServiceOracle<R> {
    fn translate(&self, goal_input: &str, task: &str, capabilities: &str) -> OracleResult<String> {
        let capability = Capability::Translator;
        let answer = self.ask(
            capability,
            Prompt::Translate,
            context! { goal_input, task, capabilities },
        )?;
        parse_text(capability, &answer)
    }
}

impl<R: ReasoningService> ExecutabilityTest for ServiceOracle<R> {
    fn can_execute(
        &self,
        task: &str,
        capabilities: &str,
        state: &WorldState,
    ) -> OracleResult<bool> {
        let capability = Capability::ExecutabilityTest;
        let answer = self.ask(
            capability,
            Prompt::CanExecute,
            context! { task, capabilities, state => state.as_str() },
        )?;
        parse_bool(capability, &answer)
    }
}

impl<R: ReasoningService> Executor for ServiceOracle<R> {
    fn execute(&self, state: &WorldState, task: &str) -> OracleResult<WorldState> {
        let capability = Capability::Executor;
        let answer = self.ask(
            capability,
            Prompt::Execute,
            context! { state => state.as_str(), task },
        )?;
        parse_text(capability, &answer).map(WorldState::new)
    }
}

impl<R: ReasoningService> SubtaskGenerator for ServiceOracle<R> {
    fn subtasks(
        &self,
        task: &str,
        state: &WorldState,
        remaining_depth: u32,
        capabilities: &str,
        history: &[String],
    ) -> OracleResult<Vec<String>> {
        let capability = Capability::SubtaskGenerator;
        let answer = self.ask(
            capability,
            Prompt::Subtasks,
            context! { task, state => state.as_str(), remaining_depth, capabilities, history },
        )?;
        parse_subtasks(capability, &answer)
    }
}

impl<R: ReasoningService> CandidateScorer for ServiceOracle<R> {
    fn score(
        &self,
        goal: &str,
        task: &str,
        subtasks: &[String],
        capabilities: &str,
        history: &[String],
    ) -> OracleResult<f64> {
        let capability = Capability::CandidateScorer;
        let answer = self.ask(
            capability,
            Prompt::Score,
            context! { goal, task, subtasks, capabilities, history },
        )?;
        parse_score(capability, &answer)
    }
}

impl<R: ReasoningService> SubtaskValidator for ServiceOracle<R> {
    fn validate(
        &self,
        task: &str,
        subtasks: &[String],
        capabilities: &str,
        history: &[String],
    ) -> OracleResult<bool> {
        let capability = Capability::SubtaskValidator;
        let answer = self.ask(
            capability,
            Prompt::CheckSubtasks,
            context! { task, subtasks, capabilities, history },
        )?;
        parse_bool(capability, &answer)
    }
}
