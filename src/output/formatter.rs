//! Output formatters for run results
//!
//! Provides table, JSON, CSV and summary output for suite reports and
//! parallel run summaries.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{IsTerminal, Write};

use crate::executor::RunSummary;
use crate::models::{SuiteReport, TestResult, TestStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// CSV row for one test result
#[derive(Serialize)]
struct CsvRow<'a> {
    name: &'a str,
    status: String,
    exit_code: Option<i32>,
    duration_ms: u64,
}

/// Whether colour escapes should be written to stdout
pub fn color_enabled() -> bool {
    color_wanted(
        std::env::var_os("NO_COLOR").is_some(),
        std::env::var("TERM").ok().as_deref(),
        std::io::stdout().is_terminal(),
    )
}

fn color_wanted(no_color: bool, term: Option<&str>, is_terminal: bool) -> bool {
    !no_color && term != Some("dumb") && is_terminal
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    /// Colour follows [`color_enabled`]
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: color_enabled(),
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn status_label(&self, status: TestStatus) -> String {
        let plain = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return plain;
        }
        match status {
            TestStatus::Pass => format!("\x1b[32m{plain}\x1b[0m"),
            TestStatus::Fail | TestStatus::StartFailed => format!("\x1b[31m{plain}\x1b[0m"),
        }
    }

    fn format_result_table(&self, result: &TestResult) -> String {
        let code = result
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{:40} {} (exit {}) [{:>6}ms]",
            result.name,
            self.status_label(result.status),
            code,
            result.duration_ms
        )
    }

    /// Format a suite report
    pub fn format_report(&self, report: &SuiteReport) -> Result<String> {
        Ok(match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json => serde_json::to_string(report)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report)?,
            OutputFormat::Csv => self.format_report_csv(report)?,
            OutputFormat::Summary => self.format_report_brief(report),
        })
    }

    fn format_report_table(&self, report: &SuiteReport) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Test suite: {} tests ({} at a time)\n",
            report.total, report.jobs
        ));
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        let mut results: Vec<&TestResult> = report.results.iter().collect();
        results.sort_by(|a, b| a.name.cmp(&b.name));
        for result in results {
            output.push_str(&format!(" {}\n", self.format_result_table(result)));
        }

        output.push_str(" ───────────────────────────────────────────────────────────\n");

        let fail_str = if self.colorize && report.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", report.failed)
        } else {
            report.failed.to_string()
        };

        output.push_str(&format!(
            " Total: {} | Pass: {} | Fail: {} | Pass Rate: {:.1}% | {}ms\n",
            report.total,
            report.passed,
            fail_str,
            report.pass_rate(),
            report.duration_ms
        ));

        output
    }

    fn format_report_csv(&self, report: &SuiteReport) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for result in &report.results {
            writer.serialize(CsvRow {
                name: &result.name,
                status: result.status.to_string(),
                exit_code: result.exit_code,
                duration_ms: result.duration_ms,
            })?;
        }
        let bytes = writer.into_inner().context("Failed to flush CSV output")?;
        Ok(String::from_utf8(bytes)?)
    }

    fn format_report_brief(&self, report: &SuiteReport) -> String {
        format!(
            "{}/{} tests passed ({:.1}%) in {}ms with {} jobs",
            report.passed,
            report.total,
            report.pass_rate(),
            report.duration_ms,
            report.jobs
        )
    }

    /// Format the summary of a plain parallel run
    pub fn format_run_summary(&self, summary: &RunSummary) -> Result<String> {
        Ok(match self.format {
            OutputFormat::Json => serde_json::to_string(summary)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary)?,
            _ => format!(
                "{} tasks: {} finished, {} failed, {} failed to start{} ({} jobs, {}ms)",
                summary.requested,
                summary.completed,
                summary.failed,
                summary.start_failures,
                if summary.aborted { ", aborted" } else { "" },
                summary.max_jobs,
                summary.duration_ms
            ),
        })
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Format the list of failed tests the way the suite runner prints it
pub fn format_failures(failed: &[String]) -> String {
    let mut output = format!("{} tests failed:\n\n", failed.len());
    for name in failed {
        output.push_str(&format!("\t{name}\n"));
    }
    output
}

/// Write a report to a file
pub fn write_report_to_file(path: &str, report: &SuiteReport, format: OutputFormat) -> Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_report(report)?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file '{path}'"))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn report() -> SuiteReport {
        SuiteReport::new(
            2,
            Utc::now(),
            42,
            vec![
                TestResult::finished("t0002-fail.sh", 1, 20),
                TestResult::finished("t0001-pass.sh", 0, 10),
                TestResult::start_failed("t0003-gone.sh"),
            ],
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = ResultFormatter::new(OutputFormat::Json).no_color();
        assert_eq!(formatter.format, OutputFormat::Json);
        assert!(!formatter.colorize);
    }

    #[test]
    fn test_color_detection() {
        assert!(color_wanted(false, Some("xterm-256color"), true));
        assert!(color_wanted(false, None, true));
        assert!(!color_wanted(false, Some("xterm"), false));
        assert!(!color_wanted(true, Some("xterm"), true));
        assert!(!color_wanted(false, Some("dumb"), true));
    }

    #[test]
    fn test_plain_table_has_no_escapes() {
        let output = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_report(&report())
            .unwrap();
        assert!(!output.contains('\x1b'));
    }

    #[test]
    fn test_format_table_sorted_by_name() {
        let output = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_report(&report())
            .unwrap();
        let first = output.find("t0001-pass.sh").unwrap();
        let second = output.find("t0002-fail.sh").unwrap();
        assert!(first < second);
        assert!(output.contains("Total: 3 | Pass: 1 | Fail: 2"));
        assert!(output.contains("! FAILED TO START (exit -)"));
    }

    #[test]
    fn test_format_csv() {
        let output = ResultFormatter::new(OutputFormat::Csv)
            .format_report(&report())
            .unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "name,status,exit_code,duration_ms");
        assert_eq!(lines[1], "t0002-fail.sh,FAIL,1,20");
        assert_eq!(lines[3], "t0003-gone.sh,FAILED TO START,,0");
    }

    #[test]
    fn test_format_json() {
        let output = ResultFormatter::new(OutputFormat::Json)
            .format_report(&report())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["failed"], 2);
        assert_eq!(value["results"][2]["status"], "start_failed");
    }

    #[test]
    fn test_format_failures() {
        let failed = vec!["t0002-fail.sh".to_string(), "t0003-gone.sh".to_string()];
        assert_eq!(
            format_failures(&failed),
            "2 tests failed:\n\n\tt0002-fail.sh\n\tt0003-gone.sh\n"
        );
    }
}
