//! Planner configuration (TOML).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::decompose::EngineSettings;
use crate::looping::LoopSettings;

pub const DEFAULT_CAPABILITIES: &str = "Manipulation actions (grab, push, pull, ...); \
Movement actions (move, reach, ...); Kitchen tasks (cook, bake, boil, ...); \
Cleaning tasks (clean, wipe, vacuum, ...); Miscellaneous tasks (scan, activate, identify, ...)";

/// Which implementation answers "is this task primitive?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveStrategy {
    /// Fixed action vocabulary, no service call.
    Keywords,
    /// Ask the reasoning service whether the task is granular enough.
    Oracle,
}

/// Planner configuration.
///
/// Missing fields default to the values the planner was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum decomposition depth below the root.
    pub max_depth: u32,

    /// Candidate decompositions generated per composite task.
    pub candidates_per_node: u32,

    /// Attempts per generator/scorer call while its answer is malformed.
    pub malformed_retries: u32,

    /// Replanning iterations before giving up.
    pub max_iterations: u32,

    pub primitive_test: PrimitiveStrategy,

    /// Capability description used when none is supplied.
    pub default_capabilities: String,

    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Command that reads a prompt on stdin and prints the answer on stdout.
    pub command: Vec<String>,

    pub timeout_secs: u64,

    /// Truncate service output beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Transport attempts per call (spawn failure, non-zero exit, timeout).
    pub max_attempts: u32,

    /// Pause between transport attempts.
    pub retry_delay_ms: u64,

    /// Service calls allowed in any 60-second window; 0 disables the limit.
    pub max_calls_per_minute: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: vec!["llm".to_string()],
            timeout_secs: 120,
            output_limit_bytes: 100_000,
            max_attempts: 3,
            retry_delay_ms: 5_000,
            max_calls_per_minute: 0,
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            candidates_per_node: 3,
            malformed_retries: 3,
            max_iterations: 100,
            primitive_test: PrimitiveStrategy::Keywords,
            default_capabilities: DEFAULT_CAPABILITIES.to_string(),
            oracle: OracleConfig::default(),
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(anyhow!("max_depth must be > 0"));
        }
        if self.candidates_per_node == 0 {
            return Err(anyhow!("candidates_per_node must be > 0"));
        }
        if self.malformed_retries == 0 {
            return Err(anyhow!("malformed_retries must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.oracle.command.is_empty() || self.oracle.command[0].trim().is_empty() {
            return Err(anyhow!("oracle.command must be a non-empty array"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if self.oracle.output_limit_bytes == 0 {
            return Err(anyhow!("oracle.output_limit_bytes must be > 0"));
        }
        if self.oracle.max_attempts == 0 {
            return Err(anyhow!("oracle.max_attempts must be > 0"));
        }
        Ok(())
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            engine: EngineSettings {
                candidates_per_node: self.candidates_per_node,
                malformed_retries: self.malformed_retries,
            },
            max_iterations: self.max_iterations,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PlannerConfig::default()`.
pub fn load_config(path: &Path) -> Result<PlannerConfig> {
    if !path.exists() {
        let cfg = PlannerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PlannerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PlannerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PlannerConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/planner.toml");
        let cfg = PlannerConfig {
            primitive_test: PrimitiveStrategy::Oracle,
            ..PlannerConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("planner.toml");
        fs::write(
            &path,
            "max_depth = 7\nprimitive_test = \"oracle\"\n\n[oracle]\ncommand = [\"ollama\", \"run\", \"llama3\"]\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_depth, 7);
        assert_eq!(cfg.primitive_test, PrimitiveStrategy::Oracle);
        assert_eq!(cfg.oracle.command, vec!["ollama", "run", "llama3"]);
        assert_eq!(cfg.oracle.timeout_secs, 120);
        assert_eq!(cfg.oracle.max_calls_per_minute, 0);
        assert_eq!(cfg.candidates_per_node, 3);
    }

    #[test]
    fn rate_limit_is_read_from_oracle_table() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("planner.toml");
        fs::write(&path, "[oracle]\nmax_calls_per_minute = 20\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.oracle.max_calls_per_minute, 20);
        assert_eq!(cfg.oracle.max_attempts, 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("planner.toml");
        fs::write(&path, "candidates_per_node = 0\n").expect("write");

        let err = load_config(&path).expect_err("should reject");
        assert!(format!("{err:#}").contains("candidates_per_node must be > 0"));
    }

    #[test]
    fn loop_settings_follow_config() {
        let cfg = PlannerConfig {
            candidates_per_node: 5,
            max_iterations: 9,
            ..PlannerConfig::default()
        };
        let settings = cfg.loop_settings();
        assert_eq!(settings.engine.candidates_per_node, 5);
        assert_eq!(settings.max_iterations, 9);
    }
}
