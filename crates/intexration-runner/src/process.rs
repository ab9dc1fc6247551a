use crate::error::RunnerError;
use std::time::Duration;

use super::CommandSpec;

/// Output from a process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output from the process
    pub stdout: Vec<u8>,
    /// Standard error from the process
    pub stderr: Vec<u8>,
    /// Exit code from the process (None if terminated by signal)
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    /// A successful, silent result. Handy for fakes.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(Vec::new(), Vec::new(), Some(0))
    }

    /// Get stdout as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Check if the process exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last `max_lines` lines of stderr (falling back to stdout), for error messages.
    ///
    /// latexmk reports errors on stdout, git on stderr.
    #[must_use]
    pub fn failure_excerpt(&self, max_lines: usize) -> String {
        let text = if self.stderr.iter().any(|b| !b.is_ascii_whitespace()) {
            self.stderr_string()
        } else {
            self.stdout_string()
        };
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Trait for process execution.
///
/// Implementations MUST use argv-style APIs only (no shell string evaluation).
/// The interface is synchronous; compile workers are plain threads.
///
/// Implementations must be `Send + Sync` because one runner is shared by every
/// worker of a threaded build batch.
pub trait ProcessRunner: Send + Sync {
    /// Execute a command, killing it once `timeout` elapses.
    ///
    /// * `Ok(ProcessOutput)` - the process completed (possibly with non-zero exit code)
    /// * `Err(RunnerError::Timeout)` - the process was killed after `timeout`
    /// * `Err(RunnerError::*)` - the process could not be spawned or waited on
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<R> {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        (**self).run(cmd, timeout)
    }
}
