// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for introspection commands (systemctl list, docker ps, journalctl).
pub const INTROSPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for control commands (service/container start/stop).
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Run a shell command line with a timeout.
pub async fn shell_with_timeout(
    command: &str,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(command);
    run_with_timeout(cmd, timeout, description).await
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
