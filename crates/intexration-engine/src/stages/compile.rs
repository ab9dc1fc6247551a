use std::path::{Path, PathBuf};

use tempfile::TempDir;

use intexration_utils::error::BuildError;

use crate::compiler::Compiler;
use crate::model::BuildRequest;

/// Output of a compile, still sitting in its private build directory.
///
/// The directory is removed when this value is dropped, so the artifact must
/// be copied out first.
#[derive(Debug)]
pub struct CompiledArtifact {
    pub path: PathBuf,
    _build_dir: TempDir,
}

/// Compiles one request into a fresh directory under `work_dir/builds`.
pub struct CompileStage<'a> {
    compiler: &'a dyn Compiler,
    work_dir: &'a Path,
}

impl<'a> CompileStage<'a> {
    pub fn new(compiler: &'a dyn Compiler, work_dir: &'a Path) -> Self {
        Self { compiler, work_dir }
    }

    pub fn run(&self, request: &BuildRequest) -> Result<CompiledArtifact, BuildError> {
        let identifier = &request.identifier;
        let parent = self
            .work_dir
            .join("builds")
            .join(identifier.relative_dir());
        let io_failure = |e: std::io::Error| BuildError::CompileFailure {
            identifier: identifier.to_string(),
            reason: format!("cannot prepare build directory {}: {e}", parent.display()),
        };

        std::fs::create_dir_all(&parent).map_err(io_failure)?;
        let build_dir = tempfile::Builder::new()
            .prefix(&format!("{}-", identifier.name()))
            .tempdir_in(&parent)
            .map_err(io_failure)?;

        let path = self
            .compiler
            .compile(request, &request.clone_target, build_dir.path())?;

        Ok(CompiledArtifact {
            path,
            _build_dir: build_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Identifier;

    struct WritingCompiler;

    impl Compiler for WritingCompiler {
        fn compile(
            &self,
            request: &BuildRequest,
            _source_dir: &Path,
            build_dir: &Path,
        ) -> Result<PathBuf, BuildError> {
            let artifact = build_dir.join(format!("{}.pdf", request.identifier.name()));
            std::fs::write(&artifact, b"%PDF").unwrap();
            Ok(artifact)
        }
    }

    #[test]
    fn test_build_directory_lives_until_artifact_dropped() {
        let temp = tempfile::TempDir::new().unwrap();
        let request = BuildRequest::new(
            Identifier::new("acme", "paper", "main").unwrap(),
            "https://github.com/acme/paper",
            "abc123",
            temp.path().join("src"),
        );

        let compiled = CompileStage::new(&WritingCompiler, temp.path())
            .run(&request)
            .unwrap();
        let path = compiled.path.clone();
        assert!(path.is_file());
        assert!(path.starts_with(temp.path().join("builds/acme/paper")));

        drop(compiled);
        assert!(!path.exists());
    }
}
