//! Streaming session orchestration.

mod runner;
mod source;
mod stats;

pub use runner::{start, RunConfig, RunningSession};
pub use source::load_config;
pub use stats::RunStats;
