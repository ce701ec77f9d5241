//! Prompt templates for the reasoning service.

use anyhow::{Context, Result};
use minijinja::{Environment, Value};

/// One compiled-in prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    GoalTest,
    Granular,
    Translate,
    CanExecute,
    Execute,
    Subtasks,
    Score,
    CheckSubtasks,
    InitialTask,
    Compress,
}

impl Prompt {
    const ALL: [Prompt; 10] = [
        Prompt::GoalTest,
        Prompt::Granular,
        Prompt::Translate,
        Prompt::CanExecute,
        Prompt::Execute,
        Prompt::Subtasks,
        Prompt::Score,
        Prompt::CheckSubtasks,
        Prompt::InitialTask,
        Prompt::Compress,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Prompt::GoalTest => "goal_test",
            Prompt::Granular => "granular",
            Prompt::Translate => "translate",
            Prompt::CanExecute => "can_execute",
            Prompt::Execute => "execute",
            Prompt::Subtasks => "subtasks",
            Prompt::Score => "score",
            Prompt::CheckSubtasks => "check_subtasks",
            Prompt::InitialTask => "initial_task",
            Prompt::Compress => "compress",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Prompt::GoalTest => include_str!("prompts/goal_test.md"),
            Prompt::Granular => include_str!("prompts/granular.md"),
            Prompt::Translate => include_str!("prompts/translate.md"),
            Prompt::CanExecute => include_str!("prompts/can_execute.md"),
            Prompt::Execute => include_str!("prompts/execute.md"),
            Prompt::Subtasks => include_str!("prompts/subtasks.md"),
            Prompt::Score => include_str!("prompts/score.md"),
            Prompt::CheckSubtasks => include_str!("prompts/check_subtasks.md"),
            Prompt::InitialTask => include_str!("prompts/initial_task.md"),
            Prompt::Compress => include_str!("prompts/compress.md"),
        }
    }
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl std::fmt::Debug for PromptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptEngine").finish_non_exhaustive()
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for prompt in Prompt::ALL {
            env.add_template(prompt.name(), prompt.source())
                .expect("compiled-in prompt template should be valid");
        }
        Self { env }
    }

    pub fn render(&self, prompt: Prompt, ctx: Value) -> Result<String> {
        let template = self
            .env
            .get_template(prompt.name())
            .with_context(|| format!("load prompt {}", prompt.name()))?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render prompt {}", prompt.name()))?;
        Ok(rendered.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use minijinja::context;

    use super::*;

    #[test]
    fn every_template_renders() {
        let engine = PromptEngine::new();
        let ctx = context! {
            goal => "serve tea",
            goal_input => "serve tea",
            state => "kitchen",
            task => "boil water",
            subtasks => vec!["fill kettle", "switch on kettle"],
            remaining_depth => 4,
            capabilities => "grab, pour",
            history => vec!["boil water"],
        };
        for prompt in Prompt::ALL {
            let rendered = engine.render(prompt, ctx.clone()).expect("render");
            assert!(!rendered.contains("{{"), "{}", prompt.name());
        }
    }

    #[test]
    fn subtasks_prompt_lists_history_only_when_present() {
        let engine = PromptEngine::new();
        let without = engine
            .render(
                Prompt::Subtasks,
                context! { task => "make tea", state => "kitchen", remaining_depth => 3, capabilities => "grab", history => Vec::<String>::new() },
            )
            .expect("render");
        assert!(without.contains("\"make tea\""));
        assert!(without.contains("remaining before failing: 3"));
        assert!(!without.contains("already tried"));

        let with = engine
            .render(
                Prompt::Subtasks,
                context! { task => "make tea", state => "kitchen", remaining_depth => 2, capabilities => "grab", history => vec!["boil water"] },
            )
            .expect("render");
        assert!(with.contains("- boil water"));
    }

    #[test]
    fn score_prompt_numbers_subtasks() {
        let engine = PromptEngine::new();
        let rendered = engine
            .render(
                Prompt::Score,
                context! { goal => "tea", task => "make tea", subtasks => vec!["boil water", "steep"], capabilities => "grab", history => Vec::<String>::new() },
            )
            .expect("render");
        assert!(rendered.contains("1. boil water"));
        assert!(rendered.contains("2. steep"));
    }
}
