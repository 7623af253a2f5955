//! Single command execution
//!
//! Runs one task to completion outside of a parallel batch.

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::error::ExecError;
use super::task::{Task, TaskStatus};
use crate::utils::Timer;

/// Start a task, wait for it and return its status
pub async fn run_command(task: &Task) -> Result<TaskStatus> {
    info!("Running {}", task);

    let timer = Timer::start(task.to_string());
    let running = task.spawn()?;
    let (status, output) = running
        .wait_with_output()
        .await
        .map_err(|source| ExecError::Wait {
            program: task.program().to_string(),
            source,
        })
        .context("Command did not finish")?;

    if !output.is_empty() {
        debug!("{} output:\n{}", task, String::from_utf8_lossy(&output));
    }

    let elapsed = timer.stop();
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    let status = TaskStatus::from_exit(status, elapsed_ms);
    debug!("{} exited with {}", task, status.code());
    Ok(status)
}

/// True when starting `task` fails because the program does not exist
///
/// A child that does start is reaped before returning.
pub async fn start_fails_with_not_found(task: &Task) -> bool {
    match task.spawn() {
        Err(err) => {
            debug!("{}", err);
            err.is_not_found()
        }
        Ok(running) => {
            let _ = running.wait_with_output().await;
            false
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::executor::OutputPolicy;

    #[test]
    fn test_run_command_status() {
        let status = tokio_test::block_on(run_command(
            &Task::new("sh")
                .args(["-c", "exit 4"])
                .output(OutputPolicy::Discard),
        ))
        .unwrap();
        assert_eq!(status.code(), 4);
    }

    #[tokio::test]
    async fn test_run_command_missing_program() {
        let err = run_command(&Task::new("run-parallel-no-such-program"))
            .await
            .unwrap_err();
        let exec = err.downcast_ref::<ExecError>().unwrap();
        assert!(exec.is_not_found());
    }

    #[tokio::test]
    async fn test_start_enoent() {
        assert!(start_fails_with_not_found(&Task::new("run-parallel-no-such-program")).await);
        assert!(!start_fails_with_not_found(&Task::new("true")).await);
    }
}
