//! Process execution engine
//!
//! Provides single-command and bounded parallel execution of external
//! commands.

mod buffer;
mod error;
mod parallel;
mod runner;
mod task;

pub use buffer::OutputBuffer;
pub use parallel::{normalize_jobs, source_fn, ParallelExecutor, RunSummary, TaskSource, Verdict};
pub use runner::{run_command, start_fails_with_not_found};
pub use task::{EnvOverride, OutputPolicy, Task, TaskStatus};
