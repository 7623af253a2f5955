//! Data models for test-suite runs

mod test_result;

pub use test_result::{SuiteReport, TestResult, TestStatus};
