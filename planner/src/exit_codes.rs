//! Stable exit codes for the planner CLI.

/// A plan was found or the goal already held.
pub const OK: i32 = 0;
/// Invalid config or arguments, or the goal test itself failed.
pub const INVALID: i32 = 1;
/// Planning stopped without a plan (repeated top-level tasks or iteration ceiling).
pub const NO_PLAN: i32 = 2;
