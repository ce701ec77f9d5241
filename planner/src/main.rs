//! Command-line front end of the HTN planner.
//!
//! `plan` asks the configured reasoning service to decompose a goal into
//! executable robot tasks and prints the resulting task tree. `init-config`
//! writes a default configuration file to edit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use htn_planner::core::classifier::KeywordClassifier;
use htn_planner::core::types::WorldState;
use htn_planner::decompose::PlanContext;
use htn_planner::exit_codes;
use htn_planner::io::config::{PlannerConfig, PrimitiveStrategy, load_config, write_config};
use htn_planner::io::memory::{JsonlPlanMemory, NoopMemory, PlanMemory};
use htn_planner::io::progress::{JsonlProgress, NoopProgress, ProgressSink};
use htn_planner::io::service::CommandService;
use htn_planner::io::service_oracle::ServiceOracle;
use htn_planner::logging;
use htn_planner::looping::{PlanOutcome, Planner};
use htn_planner::oracle::Oracles;

const DEFAULT_CONFIG_PATH: &str = "htn-planner.toml";

#[derive(Parser)]
#[command(
    name = "htn-planner",
    version,
    about = "Hierarchical task network planner backed by a reasoning service"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decompose a goal into executable tasks and print the plan.
    Plan(PlanArgs),
    /// Write a default configuration file.
    InitConfig {
        /// Config file to create.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(clap::Args)]
struct PlanArgs {
    /// Description of the current world state.
    #[arg(long)]
    state: String,
    /// The goal to reach, in plain language.
    #[arg(long)]
    goal: String,
    /// What the robot can do; defaults to the configured description.
    #[arg(long)]
    capabilities: Option<String>,
    /// High-level task to plan for; derived from the goal when omitted.
    #[arg(long)]
    goal_task: Option<String>,
    /// Config file; defaults apply when it does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Append a JSON snapshot of the tree to this file on every update.
    #[arg(long)]
    progress: Option<PathBuf>,
    /// Append completed tasks to this JSON-lines memory file.
    #[arg(long)]
    memory: Option<PathBuf>,
    /// Print the plan as JSON instead of an outline.
    #[arg(long)]
    json: bool,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Plan(args) => cmd_plan(args),
        Command::InitConfig { config, force } => {
            cmd_init_config(&config, force)?;
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &PlannerConfig::default())?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> Result<i32> {
    let config = load_config(&args.config)?;
    let service = CommandService::from_config(&config.oracle).context("build reasoning service")?;
    let oracle = ServiceOracle::new(service);

    let described = args
        .capabilities
        .unwrap_or_else(|| config.default_capabilities.clone());
    let capabilities = match oracle.compress_capabilities(&described) {
        Ok(compressed) => compressed,
        Err(err) => {
            warn!(err = %err, "capability compression failed, using description as given");
            described
        }
    };
    let oracle = oracle.with_capabilities(capabilities.as_str());

    let goal_task = match args.goal_task {
        Some(task) => task,
        None => oracle.initial_task(&args.goal).context("derive goal task")?,
    };
    info!(goal_task = %goal_task, "planning for goal task");

    let keywords = KeywordClassifier::default();
    let mut oracles = Oracles::from_service(&oracle);
    if config.primitive_test == PrimitiveStrategy::Keywords {
        oracles = oracles.with_primitive(&keywords);
    }

    let progress: Box<dyn ProgressSink> = match args.progress {
        Some(path) => Box::new(JsonlProgress::new(path)),
        None => Box::new(NoopProgress),
    };
    let memory: Box<dyn PlanMemory> = match args.memory {
        Some(path) => Box::new(JsonlPlanMemory::new(path)),
        None => Box::new(NoopMemory),
    };

    let context = PlanContext {
        goal_input: args.goal,
        goal_task,
        capabilities,
        max_depth: config.max_depth,
    };
    let outcome = Planner::new(
        oracles,
        progress.as_ref(),
        memory.as_ref(),
        config.loop_settings(),
    )
    .plan(&context, WorldState::new(args.state))?;

    let (rendered, code) = report(&outcome, args.json)?;
    print!("{rendered}");
    Ok(code)
}

/// Render the outcome for stdout and pick the exit code.
///
/// Without a plan the last tree is still printed; the reason goes to stderr.
fn report(outcome: &PlanOutcome, json: bool) -> Result<(String, i32)> {
    let code = match outcome {
        PlanOutcome::GoalSatisfied { iterations, .. } => {
            eprintln!("goal satisfied after {iterations} iteration(s)");
            exit_codes::OK
        }
        PlanOutcome::Planned { iterations, .. } => {
            eprintln!("plan found in {iterations} iteration(s)");
            exit_codes::OK
        }
        PlanOutcome::RepetitionDetected {
            task_set,
            iterations,
            ..
        } => {
            eprintln!(
                "no plan: iteration {iterations} repeated top-level tasks {}",
                task_set.join(", ")
            );
            exit_codes::NO_PLAN
        }
        PlanOutcome::IterationLimit { iterations, .. } => {
            eprintln!("no plan: stopped after {iterations} iteration(s)");
            exit_codes::NO_PLAN
        }
    };

    let tree = outcome.tree();
    let rendered = if json {
        let mut payload =
            serde_json::to_string_pretty(&tree.snapshot()).context("serialize plan json")?;
        payload.push('\n');
        payload
    } else {
        tree.render_outline()
    };
    Ok((rendered, code))
}
