//! Typesetting compiler seam and its latexmk implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use intexration_runner::{CommandSpec, ProcessRunner, RunnerError};
use intexration_utils::error::BuildError;

use crate::model::{ARTIFACT_EXTENSION, BuildRequest};

/// Compiles one document.
pub trait Compiler: Send + Sync {
    /// Compile `request` from `source_dir`, writing into `build_dir`.
    ///
    /// Returns the produced artifact. Errors are [`BuildError::CompileFailure`] or
    /// [`BuildError::Timeout`] with stage `compile`.
    fn compile(
        &self,
        request: &BuildRequest,
        source_dir: &Path,
        build_dir: &Path,
    ) -> Result<PathBuf, BuildError>;
}

/// Runs `latexmk` (or any compiler taking `-output-directory=`) through a [`ProcessRunner`].
#[derive(Debug, Clone)]
pub struct LatexCompiler<R> {
    runner: R,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl<R: ProcessRunner> LatexCompiler<R> {
    pub fn new(runner: R, program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            args,
            timeout,
        }
    }

    fn command(&self, request: &BuildRequest, source_dir: &Path, build_dir: &Path) -> CommandSpec {
        let mut output_dir = std::ffi::OsString::from("-output-directory=");
        output_dir.push(build_dir);

        CommandSpec::new(&self.program)
            .args(&self.args)
            .arg(output_dir)
            // Relative to cwd, and never mistaken for an option.
            .arg(format!("./{}.tex", request.identifier.name()))
            .cwd(source_dir)
    }
}

impl<R: ProcessRunner> Compiler for LatexCompiler<R> {
    fn compile(
        &self,
        request: &BuildRequest,
        source_dir: &Path,
        build_dir: &Path,
    ) -> Result<PathBuf, BuildError> {
        let identifier = request.identifier.to_string();
        let failure = |reason: String| BuildError::CompileFailure {
            identifier: identifier.clone(),
            reason,
        };

        std::fs::create_dir_all(build_dir)
            .map_err(|e| failure(format!("{}: {e}", build_dir.display())))?;

        let cmd = self.command(request, source_dir, build_dir);
        let output = self.runner.run(&cmd, self.timeout).map_err(|e| match e {
            RunnerError::Timeout { .. } => BuildError::Timeout {
                stage: "compile".to_string(),
                timeout_seconds: self.timeout.as_secs(),
            },
            other => failure(other.to_string()),
        })?;

        if !output.success() {
            return Err(failure(format!(
                "{} exited with {:?}: {}",
                self.program,
                output.exit_code,
                output.failure_excerpt(10)
            )));
        }

        let artifact = build_dir.join(format!(
            "{}.{ARTIFACT_EXTENSION}",
            request.identifier.name()
        ));
        if !artifact.is_file() {
            return Err(failure(format!(
                "compiler succeeded but produced no {}",
                artifact.display()
            )));
        }

        Ok(artifact)
    }
}
