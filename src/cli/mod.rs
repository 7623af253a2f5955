//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Bounded parallel subprocess runner
#[derive(Parser, Debug)]
#[command(name = "run-parallel")]
#[command(author = "hephaex@gmail.com")]
#[command(version)]
#[command(about = "Run commands and test scripts in parallel with a bounded worker pool")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one command and exit with its status
    Run(CommandArgs),

    /// Succeed only if the command cannot be started because it does not exist
    StartEnoent(CommandArgs),

    /// Run the command four times, N at a time
    Parallel(JobArgs),

    /// Like `parallel`, but stop after the first task finishes
    Abort(JobArgs),

    /// Run with a task source that has no work
    NoJobs(JobArgs),

    /// Run tNNNN-*.sh test scripts in parallel
    Testsuite(TestsuiteArgs),

    /// Check that an open file handle is not inherited by a child process
    InheritedHandle,

    /// Child side of `inherited-handle`: echo stdin
    #[command(hide = true)]
    InheritedHandleChild,

    /// Show or create the configuration file
    Config(ConfigArgs),
}

/// Environment overrides shared by command-running subcommands
#[derive(ClapArgs, Debug, Default)]
pub struct EnvArgs {
    /// Set (NAME=VALUE) or unset (NAME) a variable for the command
    #[arg(short, long = "env", value_name = "NAME[=VALUE]")]
    pub env: Vec<String>,
}

/// Arguments for single command execution
#[derive(ClapArgs, Debug)]
pub struct CommandArgs {
    #[command(flatten)]
    pub env: EnvArgs,

    /// Command and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Arguments for the parallel scenarios
#[derive(ClapArgs, Debug)]
pub struct JobArgs {
    #[command(flatten)]
    pub env: EnvArgs,

    /// Maximum number of tasks running at once
    #[arg(allow_negative_numbers = true)]
    pub jobs: i64,

    /// Command and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Print a run summary (summary, json, json-pretty)
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Arguments for the test-suite runner
#[derive(ClapArgs, Debug)]
pub struct TestsuiteArgs {
    /// Stop at first failed test case(s)
    #[arg(short, long)]
    pub immediate: bool,

    /// Run <N> jobs in parallel (0 = one per CPU)
    #[arg(short, long, allow_negative_numbers = true)]
    pub jobs: Option<i64>,

    /// Be terse
    #[arg(short, long)]
    pub quiet: bool,

    // `-v` (global --verbose) is also forwarded to the scripts

    /// Trace shell commands
    #[arg(short = 'x', long)]
    pub trace: bool,

    /// Directory containing the test scripts
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Interpreter for the test scripts
    #[arg(long)]
    pub shell: Option<String>,

    /// Report format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Never colour the report
    #[arg(long)]
    pub no_color: bool,

    /// Save the report to a file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Only run tests matching these patterns
    pub patterns: Vec<String>,
}

/// Arguments for configuration management
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Destination (defaults to the user config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_args() {
        let args = Args::parse_from([
            "run-parallel",
            "parallel",
            "--env",
            "LANG=C",
            "4",
            "sh",
            "-c",
            "printf working",
        ]);
        match args.command {
            Command::Parallel(job_args) => {
                assert_eq!(job_args.jobs, 4);
                assert_eq!(job_args.env.env, vec!["LANG=C"]);
                assert_eq!(job_args.command, vec!["sh", "-c", "printf working"]);
            }
            _ => panic!("Expected Parallel command"),
        }
    }

    #[test]
    fn test_negative_jobs_accepted() {
        let args = Args::parse_from(["run-parallel", "no-jobs", "-1", "true"]);
        match args.command {
            Command::NoJobs(job_args) => assert_eq!(job_args.jobs, -1),
            _ => panic!("Expected NoJobs command"),
        }
    }

    #[test]
    fn test_testsuite_args() {
        let args = Args::parse_from([
            "run-parallel",
            "testsuite",
            "-j",
            "8",
            "-q",
            "-x",
            "t00*",
            "t01*",
        ]);
        match args.command {
            Command::Testsuite(suite_args) => {
                assert_eq!(suite_args.jobs, Some(8));
                assert!(suite_args.quiet);
                assert!(suite_args.trace);
                assert!(!suite_args.immediate);
                assert_eq!(suite_args.patterns, vec!["t00*", "t01*"]);
            }
            _ => panic!("Expected Testsuite command"),
        }
    }

    #[test]
    fn test_inherited_handle_commands() {
        let args = Args::parse_from(["run-parallel", "inherited-handle"]);
        assert!(matches!(args.command, Command::InheritedHandle));

        let args = Args::parse_from(["run-parallel", "inherited-handle-child"]);
        assert!(matches!(args.command, Command::InheritedHandleChild));
    }

    #[test]
    fn test_testsuite_no_color() {
        let args = Args::parse_from(["run-parallel", "testsuite", "--no-color"]);
        match args.command {
            Command::Testsuite(suite_args) => assert!(suite_args.no_color),
            _ => panic!("Expected Testsuite command"),
        }
    }

    #[test]
    fn test_global_verbose() {
        let args = Args::parse_from(["run-parallel", "-v", "run", "true"]);
        assert!(args.verbose);
        match args.command {
            Command::Run(cmd_args) => assert_eq!(cmd_args.command, vec!["true"]),
            _ => panic!("Expected Run command"),
        }
    }
}
