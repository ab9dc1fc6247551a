//! Atomic file operations
//!
//! Artifacts and the key file are replaced with temp file + fsync + rename so that
//! a concurrent reader (or the startup scan) never observes a half-written file.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Content written and fsynced next to its destination, not yet visible there.
///
/// Dropping it without [`StagedFile::commit`] deletes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged content over the target.
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| anyhow::anyhow!(e.error))
            .with_context(|| format!("Failed to atomically write file: {}", target.display()))?;
        Ok(())
    }
}

/// Write `content` to a temp file beside `path`, creating parent directories as needed.
pub fn stage_file(path: &Path, content: &[u8]) -> Result<StagedFile> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {}", parent.display()))?;

    temp_file
        .write_all(content)
        .context("Failed to write content to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .context("Failed to fsync temporary file")?;

    Ok(StagedFile {
        temp: temp_file,
        target: path.to_path_buf(),
    })
}

/// Atomically write `content` to `path`, creating parent directories as needed.
pub fn write_file_atomic(path: &Path, content: &[u8]) -> Result<()> {
    stage_file(path, content)?.commit()
}

/// Stage a copy of `source` for `target`.
///
/// The data is staged next to `target`, so the final rename never crosses a
/// filesystem boundary even when the build directory lives elsewhere. All the
/// I/O happens here; [`StagedFile::commit`] is a single rename.
pub fn stage_copy(source: &Path, target: &Path) -> Result<StagedFile> {
    let content =
        fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    stage_file(target, &content)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("acme/paper/main.pdf");

        write_file_atomic(&target, b"%PDF-1.5").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"%PDF-1.5");
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("keys.txt");
        fs::write(&target, "old").unwrap();

        write_file_atomic(&target, b"new").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("main.pdf");

        write_file_atomic(&target, b"a").unwrap();
        write_file_atomic(&target, b"b").unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_stage_copy_then_commit() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("build/main.pdf");
        let target = temp.path().join("out/acme/paper/main.pdf");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"%PDF").unwrap();

        let staged = stage_copy(&source, &target).unwrap();
        assert!(!target.exists());
        assert_eq!(staged.target(), target);

        staged.commit().unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"%PDF");
        assert!(source.exists());
    }

    #[test]
    fn test_dropped_stage_leaves_target_untouched() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("main.pdf");
        let out = temp.path().join("out");
        fs::write(&source, b"new").unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("main.pdf"), b"old").unwrap();

        drop(stage_copy(&source, &out.join("main.pdf")).unwrap());

        assert_eq!(fs::read(out.join("main.pdf")).unwrap(), b"old");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let err = stage_copy(&temp.path().join("nope.pdf"), &temp.path().join("x.pdf"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
