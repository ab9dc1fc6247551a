//! Shared fakes for orchestrator integration tests.
//!
//! `FakeScm` materializes a fixed set of files instead of running git, and
//! `FakeCompiler` writes a PDF whose content is the request's ref, so tests can
//! tell which build produced a registered document.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use intexration::engine::compiler::Compiler;
use intexration::engine::scm::SourceControl;
use intexration::{BuildError, BuildRequest, Identifier, Orchestrator, OrchestratorConfig};

pub const ARTICLE: &str = "\\documentclass{article}\n\\begin{document}\nHi\n\\end{document}\n";

#[derive(Default)]
pub struct ScmState {
    pub files: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    /// Extra fetch time per ref.
    pub delays: Mutex<HashMap<String, Duration>>,
    /// Targets currently being written.
    pub fetching: Mutex<HashSet<PathBuf>>,
    /// Set when two fetches wrote the same target at once.
    pub overlapped: AtomicBool,
}

/// Source control backed by an in-memory file list.
#[derive(Clone, Default)]
pub struct FakeScm(pub Arc<ScmState>);

impl FakeScm {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let scm = Self::default();
        *scm.0.files.lock().unwrap() = files
            .iter()
            .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
            .collect();
        scm
    }

    pub fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        self.0.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, git_ref: &str, delay: Duration) {
        self.0
            .delays
            .lock()
            .unwrap()
            .insert(git_ref.to_string(), delay);
    }

    pub fn overlapped(&self) -> bool {
        self.0.overlapped.load(Ordering::SeqCst)
    }
}

impl SourceControl for FakeScm {
    fn fetch(&self, url: &str, git_ref: &str, target: &Path) -> Result<PathBuf, BuildError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail.load(Ordering::SeqCst) {
            return Err(BuildError::FetchFailure {
                url: url.to_string(),
                reason: format!("ref {git_ref} not found"),
            });
        }
        if !self.0.fetching.lock().unwrap().insert(target.to_path_buf()) {
            self.0.overlapped.store(true, Ordering::SeqCst);
        }

        let delay = self.0.delays.lock().unwrap().get(git_ref).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        fs::create_dir_all(target).unwrap();
        for (name, content) in self.0.files.lock().unwrap().iter() {
            fs::write(target.join(name), content).unwrap();
        }

        self.0.fetching.lock().unwrap().remove(target);
        Ok(target.to_path_buf())
    }
}

/// Working copies currently on disk for `owner/repo`.
pub fn working_copies(work_dir: &Path, owner: &str, repo: &str) -> Vec<String> {
    let Ok(entries) = fs::read_dir(work_dir.join("repos").join(owner).join(repo)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[derive(Default)]
pub struct CompilerState {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay_ms: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub compiled: Mutex<Vec<(Identifier, String)>>,
}

/// Compiler that writes `<name>.pdf` containing the request's ref.
#[derive(Clone, Default)]
pub struct FakeCompiler(pub Arc<CompilerState>);

impl FakeCompiler {
    pub fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        self.0.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.0
            .delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn max_in_flight(&self) -> usize {
        self.0.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Compiler for FakeCompiler {
    fn compile(
        &self,
        request: &BuildRequest,
        _source_dir: &Path,
        build_dir: &Path,
    ) -> Result<PathBuf, BuildError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.0.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay as u64));
        }
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.0.fail.load(Ordering::SeqCst) {
            return Err(BuildError::CompileFailure {
                identifier: request.identifier.to_string(),
                reason: "! Undefined control sequence.".to_string(),
            });
        }

        let artifact = build_dir.join(format!("{}.pdf", request.identifier.name()));
        fs::write(&artifact, request.git_ref.as_bytes()).unwrap();
        self.0
            .compiled
            .lock()
            .unwrap()
            .push((request.identifier.clone(), request.git_ref.clone()));
        Ok(artifact)
    }
}

/// An orchestrator over fakes rooted in a temp directory.
pub struct Harness {
    pub temp: TempDir,
    pub scm: FakeScm,
    pub compiler: FakeCompiler,
    pub orchestrator: Orchestrator,
}

pub fn config_in(root: &Path, lazy: bool, threaded: bool) -> OrchestratorConfig {
    OrchestratorConfig {
        lazy,
        threaded,
        explore: true,
        max_workers: 4,
        output_dir: root.join("output"),
        work_dir: root.join("work"),
        branch: "master".to_string(),
    }
}

pub fn harness(lazy: bool, threaded: bool) -> Harness {
    harness_with(FakeScm::with_files(&[("main.tex", ARTICLE)]), lazy, threaded)
}

pub fn harness_with(scm: FakeScm, lazy: bool, threaded: bool) -> Harness {
    let temp = TempDir::new().unwrap();
    let compiler = FakeCompiler::default();
    let orchestrator = Orchestrator::open(
        config_in(temp.path(), lazy, threaded),
        Box::new(scm.clone()),
        Box::new(compiler.clone()),
    )
    .unwrap();
    Harness {
        temp,
        scm,
        compiler,
        orchestrator,
    }
}

pub fn id(s: &str) -> Identifier {
    Identifier::parse(s).unwrap()
}

/// A request whose working copy is a fresh directory under `root`.
pub fn request(root: &Path, identifier: &str, git_ref: &str) -> BuildRequest {
    let identifier = id(identifier);
    let clone_target = root.join("src").join(git_ref);
    fs::create_dir_all(&clone_target).unwrap();
    BuildRequest::new(
        identifier,
        "https://example.com/acme/paper",
        git_ref,
        clone_target,
    )
}

/// Place `owner/repo/name.pdf` under `output_dir`.
pub fn seed_artifact(output_dir: &Path, owner: &str, repo: &str, name: &str) -> PathBuf {
    let dir = output_dir.join(owner).join(repo);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{name}.pdf"));
    fs::write(&path, b"%PDF-1.5").unwrap();
    path
}
