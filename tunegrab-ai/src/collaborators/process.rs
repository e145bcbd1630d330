//! Running external command-line tools

use crate::error::{AcquireError, AcquireResult};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;

/// Path of `binary` on `PATH`
pub fn locate(binary: &'static str) -> AcquireResult<PathBuf> {
    which::which(binary)
        .map_err(|e| AcquireError::collaborator(binary, format!("binary not found in PATH: {}", e)))
}

/// Run `binary` with `args`, returning stdout on a zero exit status
pub async fn run<I, S>(binary: &'static str, args: I) -> AcquireResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let path = locate(binary)?;
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();

    tracing::debug!(binary, path = %path.display(), args = ?args, "Running external tool");

    let output: Output = Command::new(&path)
        .args(&args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| AcquireError::collaborator(binary, format!("failed to execute: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last_line = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no error output");
        return Err(AcquireError::collaborator(
            binary,
            format!("exited with {}: {}", output.status, last_line.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
