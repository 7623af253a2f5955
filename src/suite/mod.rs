//! Parallel test-suite runner
//!
//! Discovers `tNNNN-*.sh` scripts and runs them through the parallel
//! executor, recording which ones failed.

mod discover;
mod pattern;

pub use discover::discover_tests;

use anyhow::{bail, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::executor::{
    OutputBuffer, ParallelExecutor, Task, TaskSource, TaskStatus, Verdict,
};
use crate::models::{SuiteReport, TestResult};

/// Flags forwarded to every test script
#[derive(Clone, Debug)]
pub struct SuiteOptions {
    pub quiet: bool,
    pub immediate: bool,
    pub verbose: bool,
    pub trace: bool,
    /// Interpreter used to run the scripts
    pub shell: String,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            immediate: false,
            verbose: false,
            trace: false,
            shell: "sh".to_string(),
        }
    }
}

impl SuiteOptions {
    fn script_args(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.quiet, "--quiet"),
            (self.immediate, "-i"),
            (self.verbose, "-v"),
            (self.trace, "-x"),
        ]
        .into_iter()
        .filter_map(|(enabled, flag)| enabled.then_some(flag))
    }
}

/// Shared state of one suite run, threaded through every callback
#[derive(Debug)]
pub struct TestSuite {
    dir: PathBuf,
    tests: Vec<String>,
    next: usize,
    options: SuiteOptions,
    failed: Vec<String>,
    results: Vec<TestResult>,
}

impl TestSuite {
    pub fn new(dir: impl Into<PathBuf>, tests: Vec<String>, options: SuiteOptions) -> Self {
        Self {
            dir: dir.into(),
            tests,
            next: 0,
            options,
            failed: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Build a suite from the scripts in `dir` that match `patterns`
    pub fn discover(dir: &Path, patterns: &[String], options: SuiteOptions) -> Result<Self> {
        let tests = discover_tests(dir, patterns)?;
        if tests.is_empty() {
            bail!("No tests match!");
        }
        Ok(Self::new(dir, tests, options))
    }

    /// Failed scripts, in the order their outcome was reported
    pub fn failed(&self) -> &[String] {
        &self.failed
    }
}

/// Hands out the suite's scripts in order
pub struct NextTest;

impl TaskSource<TestSuite, String> for NextTest {
    fn next_task(&mut self, suite: &mut TestSuite, out: &mut OutputBuffer) -> Option<(Task, String)> {
        let test = suite.tests.get(suite.next)?.clone();
        suite.next += 1;

        let task = Task::new(&suite.options.shell)
            .arg(&test)
            .args(suite.options.script_args())
            .current_dir(&suite.dir);

        out.push_line(format!("Output of '{test}':"));
        Some((task, test))
    }

    fn size_hint(&self, suite: &TestSuite) -> Option<usize> {
        Some(suite.tests.len() - suite.next)
    }
}

/// Record a finished script
pub fn test_finished(
    status: TaskStatus,
    out: &mut OutputBuffer,
    suite: &mut TestSuite,
    name: &String,
) -> Verdict {
    let result = TestResult::finished(name.as_str(), status.code(), status.duration_ms());
    if !status.success() {
        suite.failed.push(name.clone());
    }
    out.push_line(format!("{}: '{}'", result.status, name));
    suite.results.push(result);
    Verdict::Continue
}

/// Record a script that could not be started
pub fn test_failed(out: &mut OutputBuffer, suite: &mut TestSuite, name: &String) -> Verdict {
    suite.failed.push(name.clone());
    suite.results.push(TestResult::start_failed(name.as_str()));
    out.push_line(format!("FAILED TO START: '{name}'"));
    Verdict::Continue
}

/// Turn a requested job count into one usable for `tests` scripts
///
/// Zero or negative means one job per available CPU.
pub fn resolve_jobs(requested: i64, tests: usize) -> usize {
    let jobs = if requested <= 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        usize::try_from(requested).unwrap_or(usize::MAX)
    };
    jobs.min(tests).max(1)
}

/// Run every script of `suite`, writing per-test output blocks to `output`
pub async fn run_suite(
    suite: &mut TestSuite,
    jobs: i64,
    output: impl Write,
) -> Result<SuiteReport> {
    let jobs = resolve_jobs(jobs, suite.tests.len());

    info!("Running {} tests ({} at a time)", suite.tests.len(), jobs);

    let summary = ParallelExecutor::new(jobs)
        .with_output(output)
        .on_start_failure(test_failed)
        .on_finished(test_finished)
        .run(&mut NextTest, suite)
        .await?;

    if !suite.failed.is_empty() {
        warn!("{} tests failed", suite.failed.len());
    }

    Ok(SuiteReport::new(
        summary.max_jobs,
        summary.started_at,
        summary.duration_ms,
        suite.results.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_suite(dir: &Path) {
        fs::write(dir.join("t0001-pass.sh"), "echo one\n").unwrap();
        fs::write(dir.join("t0002-fail.sh"), "echo two >&2\nexit 1\n").unwrap();
        fs::write(dir.join("t0003-args.sh"), "echo \"args: $*\"\n").unwrap();
        fs::write(dir.join("t0004-pass.sh"), "exit 0\n").unwrap();
    }

    #[test]
    fn test_resolve_jobs() {
        assert_eq!(resolve_jobs(4, 2), 2);
        assert_eq!(resolve_jobs(2, 10), 2);
        assert!(resolve_jobs(0, 3) >= 1);
        assert!(resolve_jobs(-1, 3) <= 3);
        assert_eq!(resolve_jobs(8, 0), 1);
    }

    #[test]
    fn test_script_args() {
        let options = SuiteOptions {
            quiet: true,
            verbose: true,
            ..Default::default()
        };
        let args: Vec<&str> = options.script_args().collect();
        assert_eq!(args, vec!["--quiet", "-v"]);
    }

    #[test]
    fn test_discover_no_match() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(dir.path());
        let err = TestSuite::discover(dir.path(), &["t9*".to_string()], SuiteOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "No tests match!");
    }

    #[test]
    fn test_next_test_source() {
        let mut suite = TestSuite::new(
            "/tmp",
            vec!["t0001-a.sh".to_string()],
            SuiteOptions {
                trace: true,
                ..Default::default()
            },
        );
        let mut out = OutputBuffer::new();

        assert_eq!(NextTest.size_hint(&suite), Some(1));
        let (task, name) = NextTest.next_task(&mut suite, &mut out).unwrap();
        assert_eq!(name, "t0001-a.sh");
        assert_eq!(task.to_string(), "sh t0001-a.sh -x");
        assert_eq!(out.as_str(), "Output of 't0001-a.sh':\n");
        assert_eq!(NextTest.size_hint(&suite), Some(0));
        assert!(NextTest.next_task(&mut suite, &mut out).is_none());
    }

    #[tokio::test]
    async fn test_run_suite_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(dir.path());

        let options = SuiteOptions {
            quiet: true,
            ..Default::default()
        };
        let mut suite = TestSuite::discover(dir.path(), &[], options).unwrap();
        let mut out = Vec::new();

        let report = run_suite(&mut suite, 2, &mut out).await.unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.jobs, 2);
        assert_eq!(suite.failed(), &["t0002-fail.sh".to_string()]);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Output of 't0001-pass.sh':\none\nSUCCESS: 't0001-pass.sh'\n"));
        assert!(text.contains("Output of 't0002-fail.sh':\ntwo\nFAIL: 't0002-fail.sh'\n"));
        assert!(text.contains("Output of 't0003-args.sh':\nargs: --quiet\nSUCCESS: 't0003-args.sh'\n"));
    }

    #[tokio::test]
    async fn test_run_suite_start_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(dir.path());

        let options = SuiteOptions {
            shell: "run-parallel-no-such-shell".to_string(),
            ..Default::default()
        };
        let mut suite =
            TestSuite::discover(dir.path(), &["t0001-*".to_string()], options).unwrap();
        let mut out = Vec::new();

        let report = run_suite(&mut suite, 1, &mut out).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(suite.failed(), &["t0001-pass.sh".to_string()]);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Output of 't0001-pass.sh':\nfailed to start"));
        assert!(text.ends_with("FAILED TO START: 't0001-pass.sh'\n"));
    }
}
