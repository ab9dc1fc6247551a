use crate::error::RunnerError;
use std::process::Stdio;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::{CommandSpec, ProcessOutput, ProcessRunner};

/// Process runner backed by `std::process::Command`.
///
/// Timeouts are enforced by waiting on a monitor thread with `recv_timeout`;
/// on expiry the child is killed and [`RunnerError::Timeout`] is returned.
///
/// # Example
///
/// ```rust,no_run
/// use intexration_runner::{CommandSpec, NativeRunner, ProcessRunner};
/// use std::time::Duration;
///
/// let runner = NativeRunner::new();
/// let cmd = CommandSpec::new("git").arg("--version");
/// let output = runner.run(&cmd, Duration::from_secs(30)).unwrap();
/// assert!(output.success());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRunner;

impl NativeRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Kill a process by PID.
    fn terminate_process(pid: u32) {
        #[cfg(unix)]
        {
            // SAFETY: kill(2) with a PID we spawned; a stale PID only yields ESRCH.
            unsafe {
                libc::kill(pid as i32, libc::SIGKILL);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = pid;
        }
    }
}

impl ProcessRunner for NativeRunner {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        let mut command = cmd.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(command = %cmd, timeout_secs = timeout.as_secs(), "Spawning process");

        let child = command.spawn().map_err(|e| RunnerError::SpawnFailed {
            program: cmd.program.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

        let (tx, rx) = mpsc::channel();
        let child_id = child.id();

        let handle = thread::spawn(move || {
            let output = child.wait_with_output();
            let _ = tx.send(output);
        });

        match rx.recv_timeout(timeout) {
            Ok(output_result) => {
                let _ = handle.join();

                let output = output_result.map_err(|e| RunnerError::ExecutionFailed {
                    reason: format!("Failed to wait for process: {e}"),
                })?;

                Ok(ProcessOutput::new(
                    output.stdout,
                    output.stderr,
                    output.status.code(),
                ))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Self::terminate_process(child_id);
                // The monitor thread finishes once the killed child is reaped.
                let _ = handle.join();

                tracing::warn!(command = %cmd, timeout_secs = timeout.as_secs(), "Process killed after timeout");
                Err(RunnerError::Timeout {
                    timeout_seconds: timeout.as_secs(),
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RunnerError::ExecutionFailed {
                reason: "Process monitoring thread terminated unexpectedly".to_string(),
            }),
        }
    }
}
