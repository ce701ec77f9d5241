//! Hierarchical task network planner driven by a reasoning oracle.
//!
//! A goal is decomposed top-down into a tree of tasks. Composite tasks are
//! expanded with the best of several oracle-proposed decompositions; primitive
//! tasks are translated, checked and executed against an evolving world state.
//! A replanning loop repeats the pass from the reached state until the goal
//! holds, a pass succeeds, a top-level plan repeats, or the iteration ceiling
//! is hit.
//!
//! - **[`core`]**: Pure, deterministic logic (aggregation, ranking, keyword
//!   classification, invariants). No I/O.
//! - **[`io`]**: Side-effecting adapters (config files, the reasoning service
//!   process, prompts, memory and progress stores).
//!
//! [`decompose`] and [`looping`] orchestrate the two through the capability
//! traits in [`oracle`].

pub mod core;
pub mod decompose;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod oracle;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
