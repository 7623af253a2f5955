//! Output formatting module
//!
//! Provides various output formats for run results.

mod formatter;

pub use formatter::{format_failures, write_report_to_file, OutputFormat, ResultFormatter};
