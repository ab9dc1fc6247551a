use std::path::{Path, PathBuf};
use std::time::Instant;

use intexration_utils::error::BuildError;
use intexration_utils::logging::{build_span, log_stage_complete, log_stage_error, log_stage_start};
use intexration_utils::segment::validate_segment;

use crate::discovery::discover_documents;
use crate::model::{BuildRequest, Identifier, Submission, next_sequence};
use crate::scm::SourceControl;

/// Fetches a submission and turns every discovered document into a [`BuildRequest`].
///
/// Working copies live at `work_dir/repos/<owner>/<repository>/<ref>`, one per
/// submitted ref, so a compile never sees a checkout that moved under it.
pub struct CloneStage<'a> {
    scm: &'a dyn SourceControl,
    work_dir: &'a Path,
    default_branch: &'a str,
}

/// A submission whose names and ref passed validation, not yet fetched.
///
/// The sequence number is taken here, when the submission arrives, so the order
/// of submissions decides which build wins and not the order their fetches finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    owner: String,
    repository: String,
    source_url: String,
    git_ref: String,
    target: PathBuf,
    sequence: u64,
}

impl Checkout {
    /// Working copy directory the submission is fetched into.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl<'a> CloneStage<'a> {
    pub fn new(scm: &'a dyn SourceControl, work_dir: &'a Path, default_branch: &'a str) -> Self {
        Self {
            scm,
            work_dir,
            default_branch,
        }
    }

    /// Validate `submission` and pick its working copy. Nothing touches the disk.
    pub fn prepare(&self, submission: &Submission) -> Result<Checkout, BuildError> {
        let owner = submission.owner()?;
        let repository = validate_segment(&submission.repository)?;
        let git_ref = match submission.git_ref.trim() {
            "" => self.default_branch,
            r => r,
        };
        if git_ref.starts_with('-') {
            return Err(BuildError::InvalidIdentifier {
                reason: format!("ref '{}' must not start with '-'", git_ref.escape_debug()),
            });
        }
        let target = self.clone_target(&owner, &repository, git_ref)?;

        Ok(Checkout {
            owner,
            repository,
            source_url: submission.source_url.clone(),
            git_ref: git_ref.to_string(),
            target,
            sequence: next_sequence(),
        })
    }

    /// Fetch and discover. All-or-nothing: any failure yields no requests.
    ///
    /// Every request shares the checkout's sequence number.
    pub fn fetch(&self, checkout: &Checkout) -> Result<Vec<BuildRequest>, BuildError> {
        let label = format!("{}/{}", checkout.owner, checkout.repository);
        let span = build_span(&label, "clone");
        let _entered = span.enter();
        let start = Instant::now();
        log_stage_start(&label, "clone");

        let working_copy =
            match self
                .scm
                .fetch(&checkout.source_url, &checkout.git_ref, &checkout.target)
            {
                Ok(path) => path,
                Err(e) => {
                    log_stage_error(&label, "clone", &e.to_string(), start.elapsed().as_millis());
                    return Err(e);
                }
            };

        let requests = discover_documents(&working_copy)
            .into_iter()
            .map(|name| {
                Identifier::checked(&checkout.owner, &checkout.repository, &name).map(
                    |identifier| BuildRequest {
                        identifier,
                        source_url: checkout.source_url.clone(),
                        git_ref: checkout.git_ref.clone(),
                        clone_target: working_copy.clone(),
                        sequence: checkout.sequence,
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        if requests.is_empty() {
            tracing::warn!(repository = %label, git_ref = %checkout.git_ref, "No documents found in working copy");
        }
        log_stage_complete(&label, "clone", start.elapsed().as_millis());

        Ok(requests)
    }

    fn clone_target(&self, owner: &str, repository: &str, git_ref: &str) -> Result<PathBuf, BuildError> {
        let ref_dir = validate_segment(&git_ref.replace(['/', '\\'], "_"))?;
        Ok(self
            .work_dir
            .join("repos")
            .join(owner)
            .join(repository)
            .join(ref_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Materializes a fixed set of files instead of running git.
    struct FakeScm {
        files: Vec<(&'static str, &'static str)>,
        fail: bool,
        calls: Mutex<Vec<(String, String, PathBuf)>>,
    }

    impl SourceControl for FakeScm {
        fn fetch(&self, url: &str, git_ref: &str, target: &Path) -> Result<PathBuf, BuildError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), git_ref.to_string(), target.to_path_buf()));
            if self.fail {
                return Err(BuildError::FetchFailure {
                    url: url.to_string(),
                    reason: "unreachable".to_string(),
                });
            }
            fs::create_dir_all(target).unwrap();
            for (name, content) in &self.files {
                fs::write(target.join(name), content).unwrap();
            }
            Ok(target.to_path_buf())
        }
    }

    fn run(stage: &CloneStage<'_>, submission: &Submission) -> Result<Vec<BuildRequest>, BuildError> {
        stage.fetch(&stage.prepare(submission)?)
    }

    fn scm(fail: bool) -> FakeScm {
        FakeScm {
            files: vec![
                ("main.tex", "\\documentclass{article}\n"),
                ("appendix.tex", "\\section{A}\n"),
                ("slides.tex", "\\documentclass{beamer}\n"),
            ],
            fail,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_clone_yields_one_request_per_document() {
        let temp = TempDir::new().unwrap();
        let scm = scm(false);
        let stage = CloneStage::new(&scm, temp.path(), "master");

        let requests = run(
            &stage,
            &Submission::new("https://github.com/acme/paper", "paper", "abc123"),
        )
        .unwrap();

        let ids: Vec<String> = requests.iter().map(|r| r.identifier.to_string()).collect();
        assert_eq!(ids, vec!["acme/paper/main", "acme/paper/slides"]);
        let expected_target = temp.path().join("repos/acme/paper/abc123");
        assert!(requests.iter().all(|r| r.clone_target == expected_target));
        assert!(requests.iter().all(|r| r.git_ref == "abc123"));
    }

    #[test]
    fn test_empty_ref_falls_back_to_branch() {
        let temp = TempDir::new().unwrap();
        let scm = scm(false);
        let stage = CloneStage::new(&scm, temp.path(), "main");

        run(
            &stage,
            &Submission::new("https://github.com/acme/paper", "paper", ""),
        )
        .unwrap();

        let calls = scm.calls.lock().unwrap();
        assert_eq!(calls[0].1, "main");
    }

    #[test]
    fn test_fetch_failure_yields_no_requests() {
        let temp = TempDir::new().unwrap();
        let scm = scm(true);
        let stage = CloneStage::new(&scm, temp.path(), "master");

        let err = run(
            &stage,
            &Submission::new("https://github.com/acme/paper", "paper", "abc123"),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::FetchFailure { .. }));
    }

    #[test]
    fn test_hostile_repository_name_rejected_before_fetch() {
        let temp = TempDir::new().unwrap();
        let scm = scm(false);
        let stage = CloneStage::new(&scm, temp.path(), "master");

        let err = run(
            &stage,
            &Submission::new("https://github.com/acme/paper", "..", "abc123"),
        )
        .unwrap_err();

        assert!(matches!(err, BuildError::InvalidIdentifier { .. }));
        assert!(scm.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_slashed_ref_gets_flat_directory() {
        let temp = TempDir::new().unwrap();
        let scm = scm(false);
        let stage = CloneStage::new(&scm, temp.path(), "master");

        let requests = run(
            &stage,
            &Submission::new("https://github.com/acme/paper", "paper", "refs/heads/draft"),
        )
        .unwrap();

        assert_eq!(
            requests[0].clone_target,
            temp.path().join("repos/acme/paper/refs_heads_draft")
        );
        assert_eq!(requests[0].git_ref, "refs/heads/draft");
    }

    #[test]
    fn test_option_like_ref_rejected_before_fetch() {
        let temp = TempDir::new().unwrap();
        let scm = scm(false);
        let stage = CloneStage::new(&scm, temp.path(), "master");

        let err = run(
            &stage,
            &Submission::new("https://github.com/acme/paper", "paper", "--orphan=evil"),
        )
        .unwrap_err();

        assert!(matches!(err, BuildError::InvalidIdentifier { .. }));
        assert!(scm.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sequence_is_taken_when_submission_arrives() {
        let temp = TempDir::new().unwrap();
        let scm = scm(false);
        let stage = CloneStage::new(&scm, temp.path(), "master");

        let older = stage
            .prepare(&Submission::new("https://github.com/acme/paper", "paper", "c1"))
            .unwrap();
        let newer = stage
            .prepare(&Submission::new("https://github.com/acme/paper", "paper", "c2"))
            .unwrap();

        // The newer submission is fetched first; the older one still loses.
        let newer_requests = stage.fetch(&newer).unwrap();
        let older_requests = stage.fetch(&older).unwrap();

        assert!(newer_requests[0].sequence > older_requests[0].sequence);
        assert!(newer_requests.iter().all(|r| r.sequence == newer.sequence()));
        assert_eq!(older.target(), temp.path().join("repos/acme/paper/c1"));
    }
}
