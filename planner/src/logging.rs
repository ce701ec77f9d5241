//! Tracing setup for the planner binary.
//!
//! Diagnostics go to stderr so stdout carries only the plan. World-state
//! changes are emitted under the `state_change` target, so
//! `RUST_LOG=state_change=info` shows just the execution trace.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=htn_planner=debug,state_change=info htn-planner plan --state "..." --goal "..."
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
