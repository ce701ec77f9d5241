//! Reasoning service transport.
//!
//! A reasoning service turns a prompt into free text. The planner only talks
//! to it through [`ReasoningService`]; [`CommandService`] is the stock
//! implementation that pipes the prompt into a local command.

use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, instrument, warn};

use crate::io::config::OracleConfig;
use crate::io::process::run_with_deadline;
use crate::io::rate_limit::RateLimiter;

pub trait ReasoningService {
    /// Answer `prompt`. Transport problems are errors; content is not checked.
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Runs a configured command per prompt: prompt on stdin, answer on stdout.
///
/// Every attempt, retries included, counts against the rate limit.
#[derive(Debug)]
pub struct CommandService {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    capture_limit: usize,
    max_attempts: u32,
    retry_delay: Duration,
    limiter: RateLimiter,
}

impl CommandService {
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let Some((program, args)) = config.command.split_first() else {
            bail!("oracle.command is empty");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: config.timeout(),
            capture_limit: config.output_limit_bytes,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            limiter: RateLimiter::per_minute(config.max_calls_per_minute),
        })
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    fn attempt(&self, prompt: &str) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        let output = run_with_deadline(cmd, prompt.as_bytes(), self.timeout, self.capture_limit)?;
        if output.timed_out {
            bail!(
                "{} timed out after {}s",
                self.program,
                self.timeout.as_secs()
            );
        }
        if !output.status.success() {
            bail!(
                "{} exited with {:?}: {}",
                self.program,
                output.status.code(),
                output.stderr_tail()
            );
        }
        Ok(output.stdout_text())
    }
}

impl ReasoningService for CommandService {
    #[instrument(skip_all, fields(program = %self.program, prompt_bytes = prompt.len()))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            let waited = self.limiter.acquire();
            if !waited.is_zero() {
                debug!(attempt, waited_ms = waited.as_millis() as u64, "held back by rate limit");
            }
            match self.attempt(prompt) {
                Ok(answer) => {
                    debug!(attempt, answer_bytes = answer.len(), "service answered");
                    return Ok(answer);
                }
                Err(err) => {
                    warn!(attempt, max_attempts = self.max_attempts, err = %format!("{err:#}"), "service call failed");
                    last_err = Some(err);
                    if attempt < self.max_attempts && !self.retry_delay.is_zero() {
                        thread::sleep(self.retry_delay);
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| anyhow!("no attempts made"))
            .context(format!(
                "reasoning service failed after {} attempts",
                self.max_attempts
            )))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Instant;

    use super::*;

    fn config(command: &[&str]) -> OracleConfig {
        OracleConfig {
            command: command.iter().map(|part| part.to_string()).collect(),
            timeout_secs: 5,
            output_limit_bytes: 4096,
            max_attempts: 2,
            retry_delay_ms: 0,
            max_calls_per_minute: 0,
        }
    }

    #[test]
    fn command_receives_prompt_on_stdin() {
        let service = CommandService::from_config(&config(&["cat"])).expect("service");
        assert_eq!(service.complete("is the cup full?").expect("complete"), "is the cup full?");
    }

    #[test]
    fn arguments_are_passed_through() {
        let service =
            CommandService::from_config(&config(&["sh", "-c", "cat >/dev/null; echo yes"]))
                .expect("service");
        assert_eq!(service.complete("prompt").expect("complete").trim(), "yes");
    }

    #[test]
    fn failing_command_reports_attempts_and_stderr() {
        let service =
            CommandService::from_config(&config(&["sh", "-c", "echo 'model offline' >&2; exit 1"]))
                .expect("service");
        let err = service.complete("prompt").expect_err("should fail");
        let message = format!("{err:#}");
        assert!(message.contains("failed after 2 attempts"), "{message}");
        assert!(message.contains("model offline"), "{message}");
    }

    #[test]
    fn calls_beyond_the_rate_limit_wait_for_the_window() {
        let service = CommandService::from_config(&config(&["cat"]))
            .expect("service")
            .with_rate_limiter(RateLimiter::new(2, Duration::from_millis(200)));
        let start = Instant::now();

        for prompt in ["one", "two", "three"] {
            assert_eq!(service.complete(prompt).expect("complete"), prompt);
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandService::from_config(&config(&[])).is_err());
    }
}
