//! Pure planning logic: status aggregation, candidate ranking, the keyword
//! primitive classifier and tree invariants.
//!
//! Nothing here performs I/O or calls an oracle.

pub mod aggregate;
pub mod classifier;
pub mod invariants;
pub mod selector;
pub mod types;
