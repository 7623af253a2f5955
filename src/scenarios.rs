//! Canned parallel-run scenarios
//!
//! Small task sources and handlers used to exercise the executor from the
//! command line: a bounded batch of identical commands, a batch that asks to
//! stop after the first completion, and a source with nothing to offer.

use anyhow::Result;
use std::io::Write;

use crate::executor::{
    source_fn, OutputBuffer, ParallelExecutor, RunSummary, Task, TaskSource, TaskStatus, Verdict,
};

/// Number of tasks the preloaded source hands out
pub const PRELOADED_TASKS: usize = 4;

/// Which scenario to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// Run the command [`PRELOADED_TASKS`] times
    Parallel,
    /// Same batch, but every completion asks for a quick stop
    Abort,
    /// The source reports no work at all
    NoJobs,
}

/// Per-run scenario context
#[derive(Debug)]
pub struct ScenarioContext {
    template: Task,
    limit: usize,
    callbacks: usize,
}

impl ScenarioContext {
    pub fn new(template: Task) -> Self {
        Self {
            template,
            limit: PRELOADED_TASKS,
            callbacks: 0,
        }
    }

    /// Tasks handed out so far
    pub fn callbacks(&self) -> usize {
        self.callbacks
    }
}

/// Hands out copies of the template command, each with preloaded output
pub struct Preloaded;

impl TaskSource<ScenarioContext, usize> for Preloaded {
    fn next_task(&mut self, ctx: &mut ScenarioContext, out: &mut OutputBuffer) -> Option<(Task, usize)> {
        if ctx.callbacks >= ctx.limit {
            return None;
        }

        out.push_line("preloaded output of a child");
        ctx.callbacks += 1;
        Some((ctx.template.clone(), ctx.callbacks))
    }

    fn size_hint(&self, ctx: &ScenarioContext) -> Option<usize> {
        Some(ctx.limit.saturating_sub(ctx.callbacks))
    }
}

/// Completion handler that stops the batch after any task finishes
pub fn quick_stop(
    _status: TaskStatus,
    out: &mut OutputBuffer,
    _ctx: &mut ScenarioContext,
    _task: &usize,
) -> Verdict {
    out.push_line("asking for a quick stop");
    Verdict::Abort
}

/// Run `scenario` with `jobs` workers, writing task output to `output`
pub async fn run_scenario(
    scenario: Scenario,
    jobs: usize,
    ctx: &mut ScenarioContext,
    output: impl Write,
) -> Result<RunSummary> {
    let executor = ParallelExecutor::new(jobs).with_output(output);

    match scenario {
        Scenario::Parallel => executor.run(&mut Preloaded, ctx).await,
        Scenario::Abort => executor.on_finished(quick_stop).run(&mut Preloaded, ctx).await,
        Scenario::NoJobs => {
            let mut source = source_fn(|_ctx: &mut ScenarioContext, out: &mut OutputBuffer| {
                out.push_line("no further jobs available");
                None::<(Task, usize)>
            });
            executor.on_finished(quick_stop).run(&mut source, ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Task {
        Task::new("sh").args(["-c", "echo Hello"])
    }

    #[tokio::test]
    async fn test_parallel_scenario() {
        let mut ctx = ScenarioContext::new(echo());
        let mut out = Vec::new();

        let summary = run_scenario(Scenario::Parallel, 4, &mut ctx, &mut out)
            .await
            .unwrap();

        assert_eq!(ctx.callbacks(), 4);
        assert_eq!(summary.completed, 4);
        assert_eq!(summary.status(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "preloaded output of a child\nHello\n".repeat(4)
        );
    }

    #[tokio::test]
    async fn test_abort_scenario() {
        let mut ctx = ScenarioContext::new(echo());
        let mut out = Vec::new();

        let summary = run_scenario(Scenario::Abort, 2, &mut ctx, &mut out)
            .await
            .unwrap();

        // both workers were busy when the first completion asked to stop
        assert_eq!(ctx.callbacks(), 2);
        assert_eq!(summary.completed, 2);
        assert!(summary.aborted);
        assert_eq!(summary.status(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "preloaded output of a child\nHello\nasking for a quick stop\n".repeat(2)
        );
    }

    #[tokio::test]
    async fn test_no_jobs_scenario() {
        let mut ctx = ScenarioContext::new(echo());
        let mut out = Vec::new();

        let summary = run_scenario(Scenario::NoJobs, 4, &mut ctx, &mut out)
            .await
            .unwrap();

        assert_eq!(summary.requested, 0);
        assert_eq!(summary.status(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "no further jobs available\n");
    }

    #[tokio::test]
    async fn test_limit_and_single_worker() {
        let mut ctx = ScenarioContext::new(echo());
        ctx.limit = 3;

        let summary = run_scenario(Scenario::Parallel, 1, &mut ctx, std::io::sink())
            .await
            .unwrap();

        assert_eq!(summary.max_jobs, 1);
        assert_eq!(summary.peak_active, 1);
        assert_eq!(summary.completed, 3);
    }
}
