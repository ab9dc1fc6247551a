//! Identifier, Document and BuildRequest.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use intexration_utils::error::BuildError;
use intexration_utils::segment::validate_segment;

/// File extension of compiled artifacts.
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// Composite key of a document: `(owner, repository, name)`.
///
/// Displays as `owner/repository/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identifier {
    owner: String,
    repository: String,
    name: String,
}

impl Identifier {
    /// Create an identifier. Fields must be non-empty.
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, BuildError> {
        let id = Self {
            owner: owner.into(),
            repository: repository.into(),
            name: name.into(),
        };
        for (field, value) in [
            ("owner", &id.owner),
            ("repository", &id.repository),
            ("name", &id.name),
        ] {
            if value.is_empty() {
                return Err(BuildError::InvalidIdentifier {
                    reason: format!("{field} must not be empty"),
                });
            }
        }
        Ok(id)
    }

    /// Create an identifier whose segments are safe to use as path components.
    ///
    /// Every segment goes through [`validate_segment`]; use this for anything
    /// derived from untrusted input.
    pub fn checked(owner: &str, repository: &str, name: &str) -> Result<Self, BuildError> {
        Self::new(
            validate_segment(owner)?,
            validate_segment(repository)?,
            validate_segment(name)?,
        )
    }

    /// Parse the `owner/repository/name` display form.
    pub fn parse(s: &str) -> Result<Self, BuildError> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [owner, repository, name] => Self::checked(owner, repository, name),
            _ => Err(BuildError::InvalidIdentifier {
                reason: format!("'{s}' is not of the form owner/repository/name"),
            }),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/repository` below an output root.
    #[must_use]
    pub fn relative_dir(&self) -> PathBuf {
        Path::new(&self.owner).join(&self.repository)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repository, self.name)
    }
}

/// A compiled artifact: `location/name.pdf`.
///
/// Can only be constructed while the artifact exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    name: String,
    location: PathBuf,
    modified: Option<DateTime<Utc>>,
}

impl Document {
    /// Fails with [`BuildError::ArtifactMissing`] unless `location/name.pdf` is a file.
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let name = name.into();
        let location = location.into();
        let artifact = artifact_path(&location, &name);

        let metadata = std::fs::metadata(&artifact)
            .ok()
            .filter(std::fs::Metadata::is_file)
            .ok_or_else(|| BuildError::ArtifactMissing {
                path: artifact.display().to_string(),
            })?;
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        Ok(Self {
            name,
            location,
            modified,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the artifact.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        artifact_path(&self.location, &self.name)
    }

    /// Modification time of the artifact when the document was constructed.
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }
}

fn artifact_path(location: &Path, name: &str) -> PathBuf {
    location.join(format!("{name}.{ARTIFACT_EXTENSION}"))
}

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Next value of the process-wide request sequence.
pub(crate) fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Pending work for one document.
///
/// Every request carries a process-wide increasing `sequence`; a compile result
/// is only registered while its request is still the newest one for the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRequest {
    pub identifier: Identifier,
    pub source_url: String,
    pub git_ref: String,
    /// Working copy the document is compiled from.
    pub clone_target: PathBuf,
    pub sequence: u64,
}

impl BuildRequest {
    #[must_use]
    pub fn new(
        identifier: Identifier,
        source_url: impl Into<String>,
        git_ref: impl Into<String>,
        clone_target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identifier,
            source_url: source_url.into(),
            git_ref: git_ref.into(),
            clone_target: clone_target.into(),
            sequence: next_sequence(),
        }
    }

    /// Main source file of the document inside the working copy.
    #[must_use]
    pub fn source_file(&self) -> PathBuf {
        self.clone_target
            .join(format!("{}.tex", self.identifier.name()))
    }
}

/// A webhook notification that `repository` at `source_url` moved to `git_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub source_url: String,
    pub repository: String,
    pub git_ref: String,
}

impl Submission {
    #[must_use]
    pub fn new(
        source_url: impl Into<String>,
        repository: impl Into<String>,
        git_ref: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            repository: repository.into(),
            git_ref: git_ref.into(),
        }
    }

    /// Owner segment of the source URL: the path segment preceding the repository.
    ///
    /// Handles `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo` and
    /// scp-like `git@host:owner/repo.git`.
    pub fn owner(&self) -> Result<String, BuildError> {
        let url = self.source_url.trim().trim_end_matches('/');
        let path = match url.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map_or("", |(_, path)| path),
            None => url.split_once(':').map_or(url, |(_, path)| path),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [.., owner, _repo] => validate_segment(owner),
            _ => Err(BuildError::InvalidIdentifier {
                reason: format!("cannot derive owner from '{}'", self.source_url),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_identifier_display_and_equality() {
        let a = Identifier::new("acme", "paper", "main").unwrap();
        let b = Identifier::new("acme", "paper", "main").unwrap();
        let c = Identifier::new("acme", "paper", "slides").unwrap();

        assert_eq!(a.to_string(), "acme/paper/main");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_identifier_rejects_empty_fields() {
        assert!(Identifier::new("", "paper", "main").is_err());
        assert!(Identifier::new("acme", "", "main").is_err());
        assert!(Identifier::new("acme", "paper", "").is_err());
    }

    #[test]
    fn test_identifier_parse() {
        let id = Identifier::parse("acme/paper/main").unwrap();
        assert_eq!(id.owner(), "acme");
        assert_eq!(id.repository(), "paper");
        assert_eq!(id.name(), "main");
        assert_eq!(id.relative_dir(), PathBuf::from("acme/paper"));

        assert!(Identifier::parse("acme/paper").is_err());
        assert!(Identifier::parse("acme/../main").is_err());
        assert!(Identifier::parse("a/b/c/d").is_err());
    }

    #[test]
    fn test_document_requires_artifact() {
        let temp = TempDir::new().unwrap();
        let err = Document::new("main", temp.path()).unwrap_err();
        assert!(matches!(err, BuildError::ArtifactMissing { .. }));

        std::fs::write(temp.path().join("main.pdf"), b"%PDF").unwrap();
        let doc = Document::new("main", temp.path()).unwrap();
        assert_eq!(doc.name(), "main");
        assert_eq!(doc.artifact_path(), temp.path().join("main.pdf"));
        assert!(doc.modified().is_some());
    }

    #[test]
    fn test_document_rejects_directory_artifact() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("main.pdf")).unwrap();
        assert!(Document::new("main", temp.path()).is_err());
    }

    #[test]
    fn test_request_sequences_increase() {
        let id = Identifier::new("acme", "paper", "main").unwrap();
        let first = BuildRequest::new(id.clone(), "u", "r1", "/w");
        let second = BuildRequest::new(id, "u", "r2", "/w");
        assert!(second.sequence > first.sequence);
        assert_eq!(first.source_file(), PathBuf::from("/w/main.tex"));
    }

    #[test]
    fn test_owner_derivation() {
        let owner = |url: &str| Submission::new(url, "paper", "abc123").owner();

        assert_eq!(owner("https://github.com/acme/paper").unwrap(), "acme");
        assert_eq!(owner("https://github.com/acme/paper.git").unwrap(), "acme");
        assert_eq!(owner("https://github.com/acme/paper/").unwrap(), "acme");
        assert_eq!(owner("git@github.com:acme/paper.git").unwrap(), "acme");
        assert_eq!(owner("ssh://git@host:22/acme/paper").unwrap(), "acme");
        assert!(owner("https://github.com/paper").is_err());
        assert!(owner("https://github.com/../paper").is_err());
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(
            owner in "[a-z][a-z0-9-]{0,11}",
            repo in "[a-z][a-z0-9_.-]{0,11}",
            name in "[a-z][a-z0-9_-]{0,11}",
        ) {
            let id = Identifier::new(owner, repo, name).unwrap();
            prop_assert_eq!(Identifier::parse(&id.to_string()).unwrap(), id);
        }
    }
}
