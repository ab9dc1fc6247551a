//! Source control seam and its git implementation.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use intexration_runner::{CommandSpec, ProcessRunner, RunnerError};
use intexration_utils::error::BuildError;

/// Fetches a repository at a ref into a working copy.
pub trait SourceControl: Send + Sync {
    /// Make `target` a working copy of `url` checked out at `git_ref`.
    ///
    /// Returns the working copy path. Errors are [`BuildError::FetchFailure`] or
    /// [`BuildError::Timeout`] with stage `fetch`.
    fn fetch(&self, url: &str, git_ref: &str, target: &Path) -> Result<PathBuf, BuildError>;
}

/// `git` driven through a [`ProcessRunner`].
///
/// A fresh target is cloned; an existing working copy is fetched. Either way the
/// ref is then force-checked-out, so reruns are idempotent. The whole fetch shares
/// one deadline.
#[derive(Debug, Clone)]
pub struct GitClient<R> {
    runner: R,
    program: String,
    timeout: Duration,
}

impl<R: ProcessRunner> GitClient<R> {
    pub fn new(runner: R, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    fn git(
        &self,
        url: &str,
        cwd: Option<&Path>,
        args: &[&str],
        deadline: Instant,
    ) -> Result<(), BuildError> {
        let mut cmd = CommandSpec::new(&self.program).args(args.iter().copied());
        if let Some(dir) = cwd {
            cmd = cmd.cwd(dir);
        }
        // Never prompt for credentials on a headless server.
        cmd = cmd.env("GIT_TERMINAL_PROMPT", "0");

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.timeout_error());
        }

        let output = self.runner.run(&cmd, remaining).map_err(|e| match e {
            RunnerError::Timeout { .. } => self.timeout_error(),
            other => BuildError::FetchFailure {
                url: url.to_string(),
                reason: other.to_string(),
            },
        })?;

        if output.success() {
            Ok(())
        } else {
            Err(BuildError::FetchFailure {
                url: url.to_string(),
                reason: format!(
                    "git {} exited with {:?}: {}",
                    args.first().copied().unwrap_or_default(),
                    output.exit_code,
                    output.failure_excerpt(5)
                ),
            })
        }
    }

    fn timeout_error(&self) -> BuildError {
        BuildError::Timeout {
            stage: "fetch".to_string(),
            timeout_seconds: self.timeout.as_secs(),
        }
    }
}

impl<R: ProcessRunner> SourceControl for GitClient<R> {
    fn fetch(&self, url: &str, git_ref: &str, target: &Path) -> Result<PathBuf, BuildError> {
        let deadline = Instant::now() + self.timeout;
        let io_failure = |e: std::io::Error| BuildError::FetchFailure {
            url: url.to_string(),
            reason: format!("{}: {e}", target.display()),
        };

        if target.join(".git").is_dir() {
            tracing::debug!(url = %url, target = %target.display(), "Updating working copy");
            self.git(url, Some(target), &["fetch", "--quiet", "origin"], deadline)?;
        } else {
            if target.exists() {
                std::fs::remove_dir_all(target).map_err(io_failure)?;
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(io_failure)?;
            }
            tracing::debug!(url = %url, target = %target.display(), "Cloning repository");
            let target_arg = target.to_string_lossy().into_owned();
            self.git(url, None, &["clone", "--quiet", "--", url, target_arg.as_str()], deadline)?;
        }

        self.git(
            url,
            Some(target),
            &["checkout", "--quiet", "--force", "--detach", "--end-of-options", git_ref],
            deadline,
        )?;

        Ok(target.to_path_buf())
    }
}
