//! Handle inheritance check
//!
//! Opens a temporary file, starts a child that blocks on its stdin, then
//! closes and deletes the file while the child is still running. On
//! platforms that refuse to delete open files this fails if the child
//! inherited the handle.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Run `program args...` while a temporary file in `dir` is open, then
/// delete the file before the child exits
pub async fn check_handle_not_inherited(dir: &Path, program: &Path, args: &[&str]) -> Result<()> {
    let file = tempfile::Builder::new()
        .prefix("out-")
        .tempfile_in(dir)
        .with_context(|| format!("Could not create a temporary file in '{}'", dir.display()))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .context("Could not start child process")?;

    let path = file.path().to_path_buf();
    file.close()
        .with_context(|| format!("Could not delete '{}'", path.display()))?;
    debug!("Deleted {} with the child still running", path.display());

    drop(child.stdin.take());
    let status = child.wait().await.context("Child did not finish")?;
    if !status.success() {
        bail!("Child did not finish: {status}");
    }

    Ok(())
}

/// Child side: read all of `input` and echo it back
pub async fn read_received(mut input: impl AsyncRead + Unpin) -> Result<String> {
    let mut buf = String::new();
    input
        .read_to_string(&mut buf)
        .await
        .context("Could not read stdin")?;
    Ok(format!("Received {buf}"))
}
