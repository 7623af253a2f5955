//! run-parallel - bounded parallel subprocess runner
//!
//! Runs external commands with at most N child processes alive at once,
//! keeps each command's output together, and lets callers stop a batch
//! early. Ships a small parallel test-suite runner on top of the engine.
//!
//! ## Features
//!
//! - Bounded worker pool over real OS processes
//! - Per-task output buffered and written as one block
//! - Cooperative abort after any completion
//! - "Failed to start" reported separately from "ran and failed"
//! - Test-suite runner for `tNNNN-*.sh` scripts with pattern selection
//! - Reports as table, JSON or CSV
//!
//! ## Usage
//!
//! ```bash
//! # Run a command four times, two at a time
//! run-parallel parallel 2 sh -c "echo hello"
//!
//! # Same, but stop after the first one finishes
//! run-parallel abort 2 sh -c "echo hello"
//!
//! # Check that open file handles do not leak into children
//! run-parallel inherited-handle
//!
//! # Run test scripts, one job per CPU
//! run-parallel testsuite -j 0 --dir t 't00*'
//!
//! # Single command with an environment override
//! run-parallel run --env LANG=C locale
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

mod cli;
mod config;
mod executor;
mod handles;
mod models;
mod output;
mod scenarios;
mod suite;
mod utils;

use cli::Args;
use config::{AppConfig, EnvConfig};
use executor::{normalize_jobs, EnvOverride, OutputPolicy, Task};
use output::{OutputFormat, ResultFormatter};
use scenarios::{Scenario, ScenarioContext};
use suite::{SuiteOptions, TestSuite};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let config_path = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));
    let config = AppConfig::load_or_default(config_path.as_deref())?.merge_env(&env);

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        args.log_level
            .as_deref()
            .and_then(LogLevel::from_str)
            .or_else(|| LogLevel::from_str(&config.log_level))
            .unwrap_or(LogLevel::Info)
    };
    init_logger(level);
    debug!("Effective configuration: {:?}", config);

    let code = match args.command {
        cli::Command::Run(cmd_args) => run_single(cmd_args).await?,
        cli::Command::StartEnoent(cmd_args) => start_enoent(cmd_args).await?,
        cli::Command::Parallel(job_args) => run_jobs(Scenario::Parallel, job_args).await?,
        cli::Command::Abort(job_args) => run_jobs(Scenario::Abort, job_args).await?,
        cli::Command::NoJobs(job_args) => run_jobs(Scenario::NoJobs, job_args).await?,
        cli::Command::Testsuite(suite_args) => {
            run_testsuite(suite_args, &config, args.verbose).await?
        }
        cli::Command::InheritedHandle => {
            let program = std::env::current_exe().context("Could not locate own executable")?;
            handles::check_handle_not_inherited(
                Path::new("."),
                &program,
                &["inherited-handle-child"],
            )
            .await?;
            0
        }
        cli::Command::InheritedHandleChild => {
            println!("{}", handles::read_received(tokio::io::stdin()).await?);
            0
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &config, &env)?;
            0
        }
    };

    Ok(exit_code(code))
}

/// Clamp a task status into a process exit code
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn build_task(command: &[String], env: &cli::EnvArgs) -> Result<Task> {
    let task = Task::from_argv(command).ok_or_else(|| anyhow!("No command given"))?;
    let overrides = env
        .env
        .iter()
        .map(|spec| EnvOverride::parse(spec))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(task.env_overrides(overrides))
}

async fn run_single(args: cli::CommandArgs) -> Result<i32> {
    let task = build_task(&args.command, &args.env)?.output(OutputPolicy::Inherit);
    let status = executor::run_command(&task).await?;
    Ok(status.code())
}

async fn start_enoent(args: cli::CommandArgs) -> Result<i32> {
    let task = build_task(&args.command, &args.env)?.output(OutputPolicy::Discard);
    if executor::start_fails_with_not_found(&task).await {
        Ok(0)
    } else {
        eprintln!("FAIL start-enoent: '{task}' did not fail with not found");
        Ok(1)
    }
}

async fn run_jobs(scenario: Scenario, args: cli::JobArgs) -> Result<i32> {
    let task = build_task(&args.command, &args.env)?;
    let jobs = normalize_jobs(args.jobs);
    let mut ctx = ScenarioContext::new(task);

    let summary = scenarios::run_scenario(scenario, jobs, &mut ctx, io::stderr()).await?;

    if let Some(ref format) = args.format {
        let format = OutputFormat::from_str(format)
            .ok_or_else(|| anyhow!("Unknown output format: {format}"))?;
        println!(
            "{}",
            ResultFormatter::new(format).format_run_summary(&summary)?
        );
    }

    Ok(summary.status())
}

async fn run_testsuite(args: cli::TestsuiteArgs, config: &AppConfig, verbose: bool) -> Result<i32> {
    let options = SuiteOptions {
        quiet: args.quiet,
        immediate: args.immediate,
        verbose,
        trace: args.trace,
        shell: args.shell.unwrap_or_else(|| config.shell.clone()),
    };
    let dir = args.dir.unwrap_or_else(|| config.test_dir.clone());
    let jobs = args.jobs.unwrap_or(config.jobs);
    let format_name = args.format.unwrap_or_else(|| config.format.clone());
    let format = OutputFormat::from_str(&format_name)
        .ok_or_else(|| anyhow!("Unknown output format: {format_name}"))?;

    let mut suite = TestSuite::discover(&dir, &args.patterns, options)?;
    let report = suite::run_suite(&mut suite, jobs, io::stderr()).await?;

    let mut formatter = ResultFormatter::new(format);
    if args.no_color {
        formatter = formatter.no_color();
    }
    println!("{}", formatter.format_report(&report)?);

    if let Some(ref path) = args.output {
        output::write_report_to_file(path, &report, format)?;
        info!("Report saved to {}", path);
    }

    if suite.failed().is_empty() {
        Ok(0)
    } else {
        eprint!("{}", output::format_failures(suite.failed()));
        Ok(1)
    }
}

fn manage_config(args: cli::ConfigArgs, config: &AppConfig, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Show => {
            print!("{}", serde_yaml::to_string(config)?);
            if env.has_any() {
                println!();
                env.print_summary();
            }
        }
        cli::ConfigAction::Init { path, force } => {
            let path = path
                .or_else(AppConfig::default_path)
                .ok_or_else(|| anyhow!("No configuration directory available"))?;
            if path.exists() && !force {
                bail!(
                    "Config file '{}' already exists (use --force to overwrite)",
                    path.display()
                );
            }
            AppConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        cli::ConfigAction::Env => config::print_env_help(),
    }
    Ok(())
}
