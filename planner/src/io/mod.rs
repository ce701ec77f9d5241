//! Side-effecting adapters: configuration files, the reasoning service
//! process, prompt rendering and the memory and progress stores.

pub mod config;
pub mod decode;
pub mod memory;
pub mod process;
pub mod progress;
pub mod prompt;
pub mod rate_limit;
pub mod service;
pub mod service_oracle;
