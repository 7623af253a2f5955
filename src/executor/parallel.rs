//! Parallel process execution
//!
//! Runs a caller-supplied stream of commands with at most `max_jobs` child
//! processes alive at once. A single coordinating future pulls tasks from a
//! [`TaskSource`], waits for whichever child exits first and hands each
//! outcome to the caller's handlers, which decide whether the batch goes on.
//!
//! Callbacks are only ever invoked from the coordinator, one at a time, so
//! they can mutate the shared context without locking.
//!
//! Output of each task is collected in an [`OutputBuffer`] and written out as
//! one block when that task's outcome is dispatched (completion order). A
//! failing output writer never stops the run; failures are counted in
//! [`RunSummary::write_failures`].

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::io::{self, Write};
use std::process::ExitStatus;
use tracing::{debug, info, warn};

use super::buffer::OutputBuffer;
use super::error::ExecError;
use super::task::{Task, TaskStatus, WAIT_FAILED};
use crate::utils::Timer;

/// Handler decision after a task outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Abort,
}

impl Verdict {
    pub fn is_abort(self) -> bool {
        self == Verdict::Abort
    }
}

/// Supplier of tasks for a parallel run
///
/// Each call may prepare text in `out`; that buffer travels with the task and
/// is written when the task's outcome is dispatched. Returning `None` ends the
/// supply for the run and the source is not asked again; text written during
/// that final call is still flushed.
pub trait TaskSource<C, T> {
    fn next_task(&mut self, ctx: &mut C, out: &mut OutputBuffer) -> Option<(Task, T)>;

    /// Number of tasks still available, when known up front
    fn size_hint(&self, _ctx: &C) -> Option<usize> {
        None
    }
}

/// [`TaskSource`] backed by a closure, see [`source_fn`]
pub struct FnSource<F>(F);

/// Wrap a closure as a task source
pub fn source_fn<C, T, F>(f: F) -> FnSource<F>
where
    F: FnMut(&mut C, &mut OutputBuffer) -> Option<(Task, T)>,
{
    FnSource(f)
}

impl<C, T, F> TaskSource<C, T> for FnSource<F>
where
    F: FnMut(&mut C, &mut OutputBuffer) -> Option<(Task, T)>,
{
    fn next_task(&mut self, ctx: &mut C, out: &mut OutputBuffer) -> Option<(Task, T)> {
        (self.0)(ctx, out)
    }
}

type FailureHandler<'a, C, T> = Box<dyn FnMut(&mut OutputBuffer, &mut C, &T) -> Verdict + 'a>;
type CompletionHandler<'a, C, T> =
    Box<dyn FnMut(TaskStatus, &mut OutputBuffer, &mut C, &T) -> Verdict + 'a>;

/// Clamp a requested job count to a usable concurrency limit
pub fn normalize_jobs(requested: i64) -> usize {
    if requested < 1 {
        warn!("Invalid job count {}, using 1", requested);
        1
    } else {
        usize::try_from(requested).unwrap_or(usize::MAX)
    }
}

/// Aggregate outcome of a parallel run
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub max_jobs: usize,
    /// Tasks handed out by the source
    pub requested: usize,
    pub spawned: usize,
    pub completed: usize,
    /// Completed tasks with a non-zero status
    pub failed: usize,
    pub start_failures: usize,
    pub aborted: bool,
    pub peak_active: usize,
    /// Output blocks that could not be written
    pub write_failures: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunSummary {
    fn new(max_jobs: usize) -> Self {
        Self {
            max_jobs,
            requested: 0,
            spawned: 0,
            completed: 0,
            failed: 0,
            start_failures: 0,
            aborted: false,
            peak_active: 0,
            write_failures: 0,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0 && self.start_failures == 0 && !self.aborted
    }

    /// Process-style status: 0 on success, 1 otherwise
    pub fn status(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// One running task
struct Slot<T> {
    token: T,
    buffer: OutputBuffer,
    program: String,
    timer: Timer,
}

type WaitFuture = BoxFuture<'static, (usize, io::Result<(ExitStatus, Vec<u8>)>)>;

/// Per-run scheduler bookkeeping
struct SchedulerState<T> {
    slots: Vec<Option<Slot<T>>>,
    active: usize,
    aborting: bool,
    exhausted: bool,
}

impl<T> SchedulerState<T> {
    fn new(max_jobs: usize) -> Self {
        Self {
            slots: (0..max_jobs).map(|_| None).collect(),
            active: 0,
            aborting: false,
            exhausted: false,
        }
    }

    fn wants_task(&self) -> bool {
        !self.aborting && !self.exhausted && self.active < self.slots.len()
    }

    fn occupy(&mut self, slot: Slot<T>) -> Result<usize> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| anyhow!("no idle slot with {} tasks active", self.active))?;
        self.slots[index] = Some(slot);
        self.active += 1;
        Ok(index)
    }

    fn release(&mut self, index: usize) -> Result<Slot<T>> {
        let slot = self
            .slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| anyhow!("slot {index} finished but was not active"))?;
        self.active -= 1;
        Ok(slot)
    }
}

/// Bounded parallel process executor
pub struct ParallelExecutor<'a, C, T> {
    max_jobs: usize,
    output: Box<dyn Write + 'a>,
    on_start_failure: Option<FailureHandler<'a, C, T>>,
    on_finished: Option<CompletionHandler<'a, C, T>>,
}

impl<'a, C, T> ParallelExecutor<'a, C, T> {
    /// Create an executor; a limit of zero is raised to one
    pub fn new(max_jobs: usize) -> Self {
        Self {
            max_jobs: max_jobs.max(1),
            output: Box::new(io::stderr()),
            on_start_failure: None,
            on_finished: None,
        }
    }

    /// Where task output blocks are written (stderr by default)
    pub fn with_output(mut self, output: impl Write + 'a) -> Self {
        self.output = Box::new(output);
        self
    }

    /// Called when a task could not be started
    pub fn on_start_failure<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut OutputBuffer, &mut C, &T) -> Verdict + 'a,
    {
        self.on_start_failure = Some(Box::new(handler));
        self
    }

    /// Called when a started task has exited
    pub fn on_finished<F>(mut self, handler: F) -> Self
    where
        F: FnMut(TaskStatus, &mut OutputBuffer, &mut C, &T) -> Verdict + 'a,
    {
        self.on_finished = Some(Box::new(handler));
        self
    }

    /// Run tasks from `source` until it is exhausted or a handler aborts
    pub async fn run<S>(mut self, source: &mut S, ctx: &mut C) -> Result<RunSummary>
    where
        S: TaskSource<C, T>,
    {
        let max_jobs = match source.size_hint(ctx) {
            Some(available) => self.max_jobs.min(available.max(1)),
            None => self.max_jobs,
        };

        info!("Running tasks in parallel (max {} at a time)", max_jobs);

        let run_timer = Timer::start("parallel run");
        let mut summary = RunSummary::new(max_jobs);
        let mut state: SchedulerState<T> = SchedulerState::new(max_jobs);
        let mut waiting: FuturesUnordered<WaitFuture> = FuturesUnordered::new();

        loop {
            while state.wants_task() {
                self.start_next(source, ctx, &mut state, &mut summary, &mut waiting)?;
            }

            if state.active == 0 {
                break;
            }

            let (index, result) = waiting
                .next()
                .await
                .ok_or_else(|| anyhow!("{} slots active but nothing to wait on", state.active))?;

            let slot = state.release(index)?;
            self.finish(slot, result, ctx, &mut state, &mut summary);
        }

        summary.duration_ms = run_timer.elapsed_ms();

        info!(
            "Parallel run completed in {}ms - {} finished, {} failed, {} failed to start{}",
            summary.duration_ms,
            summary.completed,
            summary.failed,
            summary.start_failures,
            if summary.aborted { " (aborted)" } else { "" }
        );
        if summary.write_failures > 0 {
            warn!("{} task output blocks could not be written", summary.write_failures);
        }

        Ok(summary)
    }

    /// Ask the source for one task and start it
    fn start_next<S>(
        &mut self,
        source: &mut S,
        ctx: &mut C,
        state: &mut SchedulerState<T>,
        summary: &mut RunSummary,
        waiting: &mut FuturesUnordered<WaitFuture>,
    ) -> Result<()>
    where
        S: TaskSource<C, T>,
    {
        let mut buffer = OutputBuffer::new();

        let Some((task, token)) = source.next_task(ctx, &mut buffer) else {
            debug!("Task source exhausted after {} tasks", summary.requested);
            state.exhausted = true;
            self.flush(buffer, summary);
            return Ok(());
        };
        summary.requested += 1;

        match task.spawn() {
            Ok(running) => {
                let program = task.program().to_string();
                let index = state.occupy(Slot {
                    token,
                    buffer,
                    program,
                    timer: Timer::start(task.to_string()),
                })?;

                summary.spawned += 1;
                summary.peak_active = summary.peak_active.max(state.active);
                debug!("Started '{}' in slot {} ({} active)", task, index, state.active);

                waiting.push(async move { (index, running.wait_with_output().await) }.boxed());
            }
            Err(err) => {
                warn!("{}", err);
                summary.start_failures += 1;
                buffer.push_line(err.to_string());

                let verdict = match self.on_start_failure.as_mut() {
                    Some(handler) => handler(&mut buffer, ctx, &token),
                    None => Verdict::Continue,
                };
                self.flush(buffer, summary);
                self.apply(verdict, state, summary);
            }
        }

        Ok(())
    }

    /// Dispatch the outcome of a finished slot
    fn finish(
        &mut self,
        slot: Slot<T>,
        result: io::Result<(ExitStatus, Vec<u8>)>,
        ctx: &mut C,
        state: &mut SchedulerState<T>,
        summary: &mut RunSummary,
    ) {
        let Slot {
            token,
            mut buffer,
            program,
            timer,
        } = slot;
        let duration_ms = timer.elapsed_ms();

        let status = match result {
            Ok((exit, output)) => {
                buffer.push_bytes(&output);
                TaskStatus::from_exit(exit, duration_ms)
            }
            Err(source) => {
                let err = ExecError::Wait { program, source };
                warn!("{}", err);
                buffer.push_line(err.to_string());
                TaskStatus::new(WAIT_FAILED, duration_ms)
            }
        };

        summary.completed += 1;
        if !status.success() {
            summary.failed += 1;
        }
        debug!(
            "Task finished with status {} after {}ms",
            status.code(),
            status.duration_ms()
        );

        let verdict = match self.on_finished.as_mut() {
            Some(handler) => handler(status, &mut buffer, ctx, &token),
            None => Verdict::Continue,
        };
        self.flush(buffer, summary);
        self.apply(verdict, state, summary);
    }

    fn apply(&self, verdict: Verdict, state: &mut SchedulerState<T>, summary: &mut RunSummary) {
        if verdict.is_abort() && !state.aborting {
            info!(
                "Abort requested, waiting for {} running task(s)",
                state.active
            );
            state.aborting = true;
            summary.aborted = true;
        }
    }

    /// Write a finished buffer as one block
    fn flush(&mut self, buffer: OutputBuffer, summary: &mut RunSummary) {
        if buffer.is_empty() {
            return;
        }

        let written = self
            .output
            .write_all(&buffer.into_bytes())
            .and_then(|_| self.output.flush());

        if let Err(err) = written {
            if summary.write_failures == 0 {
                warn!("Failed to write task output: {}", err);
            }
            summary.write_failures += 1;
        }
    }
}
