//! Test result models for suite runs
//!
//! Defines per-script results and the report of a whole run.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one test script
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Pass,
    Fail,
    StartFailed,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Pass => "✓",
            TestStatus::Fail => "✗",
            TestStatus::StartFailed => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Pass)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pass => write!(f, "SUCCESS"),
            TestStatus::Fail => write!(f, "FAIL"),
            TestStatus::StartFailed => write!(f, "FAILED TO START"),
        }
    }
}

/// Result of a single test script
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl TestResult {
    /// Result of a script that ran; pass or fail follows the exit code
    pub fn finished(name: impl Into<String>, exit_code: i32, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: if exit_code == 0 {
                TestStatus::Pass
            } else {
                TestStatus::Fail
            },
            exit_code: Some(exit_code),
            duration_ms,
        }
    }

    pub fn start_failed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::StartFailed,
            exit_code: None,
            duration_ms: 0,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.name,
            self.duration_ms
        )?;
        if let Some(code) = self.exit_code.filter(|c| *c != 0) {
            write!(f, " - exit {code}")?;
        }
        Ok(())
    }
}

/// Report of a whole suite run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteReport {
    pub jobs: usize,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Results in completion order
    pub results: Vec<TestResult>,
}

impl SuiteReport {
    pub fn new(
        jobs: usize,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        results: Vec<TestResult>,
    ) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.status.is_success()).count();

        Self {
            jobs,
            total,
            passed,
            failed: total - passed,
            started_at,
            duration_ms,
            results,
        }
    }

    /// Names of failed scripts, in completion order
    pub fn failed_tests(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.status.is_success())
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test suite ({} at a time)", self.jobs)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {}",
            self.total, self.passed, self.failed
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.duration_ms
        )
    }
}
