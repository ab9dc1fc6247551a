//! The build orchestrator: owns the document store and the build queue, and
//! decides when compilation happens.
//!
//! # Concurrency
//!
//! Store and queue live behind one mutex; every transition between them happens
//! inside that critical section, so an identifier is never observed as both ready
//! and pending. Compiles run outside it. Compiles of the same identifier are
//! serialized by a per-identifier build guard, which is what makes a just-in-time
//! compile happen once even when many lookups race for it.
//!
//! Every [`BuildRequest`] carries a sequence number taken when its submission
//! arrived. A compile that finishes after a newer request for the same identifier
//! was queued or registered is discarded, and an older request is never queued over
//! a newer one.
//!
//! # Working copies
//!
//! Each working copy under `work_dir/repos` is leased by the submission fetching
//! into it, by every queued request built from it and by every compile reading it.
//! It is deleted as soon as the last lease goes. Fetches and deletions of the same
//! working copy are serialized by a per-checkout guard.

mod summary;

pub use summary::BatchSummary;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Instant;

use intexration_config::Config;
use intexration_runner::NativeRunner;
use intexration_utils::atomic_write::stage_copy;
use intexration_utils::error::{BuildError, IntexrationError};
use intexration_utils::logging::{build_span, log_stage_complete, log_stage_error, log_stage_start};

use crate::compiler::{Compiler, LatexCompiler};
use crate::model::{
    ARTIFACT_EXTENSION, BuildRequest, Document, Identifier, Submission, next_sequence,
};
use crate::pool::run_bounded;
use crate::queue::BuildQueue;
use crate::scm::{GitClient, SourceControl};
use crate::stages::{CloneStage, CompileStage};
use crate::store::DocumentStore;

/// Scheduling policy and locations the orchestrator works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Defer compiles until the first lookup.
    pub lazy: bool,
    /// Run eager batches on the worker pool.
    pub threaded: bool,
    /// Scan `output_dir` when opening.
    pub explore: bool,
    pub max_workers: usize,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
    /// Ref used when a submission names none.
    pub branch: String,
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            lazy: config.compilation.lazy,
            threaded: config.compilation.threaded,
            explore: config.compilation.explore,
            max_workers: config.compilation.max_workers,
            output_dir: config.output_dir(),
            work_dir: config.work_dir(),
            branch: config.compilation.branch.clone(),
        }
    }
}

/// Result of compiling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// The document is registered and served from now on.
    Registered(Document),
    /// A newer request for the identifier won; this result was thrown away.
    Superseded,
}

enum Enqueued {
    /// Queued, replacing the returned request if there was one.
    Queued(Option<BuildRequest>),
    /// Not queued: a newer request is already queued or registered.
    Stale(BuildRequest),
}

#[derive(Debug, Default)]
struct BuildState {
    store: DocumentStore,
    queue: BuildQueue,
    /// Sequence of the request behind each registered document.
    registered: HashMap<Identifier, u64>,
    /// Lease count per working copy. Zero counts are not stored.
    leases: HashMap<PathBuf, usize>,
}

impl BuildState {
    fn lease(&mut self, working_copy: &Path) {
        *self.leases.entry(working_copy.to_path_buf()).or_default() += 1;
    }

    /// Drop one lease. Returns the working copy once nothing holds it.
    fn release(&mut self, working_copy: &Path) -> Option<PathBuf> {
        let count = self.leases.get_mut(working_copy)?;
        *count = count.saturating_sub(1);
        if *count > 0 {
            return None;
        }
        self.leases.remove(working_copy);
        Some(working_copy.to_path_buf())
    }

    /// Whether a newer request for `identifier` than `sequence` is queued or registered.
    fn has_newer(&self, identifier: &Identifier, sequence: u64) -> bool {
        self.queue
            .get(identifier)
            .is_some_and(|queued| queued.sequence > sequence)
            || self
                .registered
                .get(identifier)
                .is_some_and(|registered| *registered > sequence)
    }
}

/// Owns the document store and build queue and applies the eager/lazy and
/// threaded/sequential policy.
///
/// Shared by reference (typically in an `Arc`) between the webhook transport and
/// lookups; every method takes `&self`.
///
/// # Example
///
/// ```rust,no_run
/// use intexration_config::{CliArgs, Config};
/// use intexration_engine::{Identifier, Orchestrator};
///
/// let config = Config::discover(&CliArgs::default())?;
/// let orchestrator = Orchestrator::from_config(&config)?;
///
/// let id = Identifier::parse("acme/paper/main")?;
/// let document = orchestrator.get_document(&id)?;
/// println!("{}", document.artifact_path().display());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Orchestrator {
    config: OrchestratorConfig,
    state: Mutex<BuildState>,
    guards: Mutex<HashMap<Identifier, Arc<Mutex<()>>>>,
    /// Per working copy: held while fetching into it or deleting it.
    checkouts: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    scm: Box<dyn SourceControl>,
    compiler: Box<dyn Compiler>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The maps stay structurally valid if a holder panicked.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(identifier: &Identifier) -> BuildError {
    BuildError::BuildNotFound {
        identifier: identifier.to_string(),
    }
}

fn publish_failure(identifier: &Identifier, err: &dyn std::fmt::Display) -> BuildError {
    BuildError::CompileFailure {
        identifier: identifier.to_string(),
        reason: format!("cannot publish artifact: {err:#}"),
    }
}

impl Orchestrator {
    /// Create an orchestrator and finish its warm-up before returning.
    ///
    /// Creates the output and work directories and, when `explore` is set, loads
    /// every document already present in the output directory.
    pub fn open(
        config: OrchestratorConfig,
        scm: Box<dyn SourceControl>,
        compiler: Box<dyn Compiler>,
    ) -> Result<Self, IntexrationError> {
        std::fs::create_dir_all(&config.output_dir)?;
        std::fs::create_dir_all(&config.work_dir)?;

        let store = if config.explore {
            DocumentStore::scan(&config.output_dir)
        } else {
            DocumentStore::new()
        };

        tracing::info!(
            lazy = config.lazy,
            threaded = config.threaded,
            max_workers = config.max_workers,
            documents = store.len(),
            "Orchestrator ready"
        );

        Ok(Self {
            config,
            state: Mutex::new(BuildState {
                store,
                ..BuildState::default()
            }),
            guards: Mutex::new(HashMap::new()),
            checkouts: Mutex::new(HashMap::new()),
            scm,
            compiler,
        })
    }

    /// Wire git and latexmk through the native process runner.
    pub fn from_config(config: &Config) -> Result<Self, IntexrationError> {
        let scm = GitClient::new(NativeRunner::new(), &config.tools.git, config.fetch_timeout());
        let compiler = LatexCompiler::new(
            NativeRunner::new(),
            &config.tools.compiler,
            config.tools.compiler_args.clone(),
            config.compile_timeout(),
        );
        Self::open(
            OrchestratorConfig::from_config(config),
            Box::new(scm),
            Box::new(compiler),
        )
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Fetch a submission and hand its documents to [`Self::submit_builds`].
    ///
    /// A fetch failure is terminal for the whole submission: nothing is queued or built.
    /// Submissions of the same ref fetch one at a time. The working copy is deleted
    /// afterwards unless queued requests still need it.
    pub fn submit_request(&self, submission: &Submission) -> Result<BatchSummary, BuildError> {
        let stage = CloneStage::new(self.scm.as_ref(), &self.config.work_dir, &self.config.branch);
        let checkout = stage.prepare(submission)?;
        let target = checkout.target().to_path_buf();

        lock(&self.state).lease(&target);
        let result = {
            let guard = self.checkout_guard(&target);
            let _fetching = lock(&guard);
            stage
                .fetch(&checkout)
                .map(|requests| self.submit_builds(requests))
        };
        self.release(&target);
        result
    }

    /// Lazy: queue every request. Eager: compile them now and wait for all of them.
    ///
    /// Eager failures are logged and reported in the summary; they are not queued.
    pub fn submit_builds(&self, requests: Vec<BuildRequest>) -> BatchSummary {
        let mut summary = BatchSummary::default();

        if self.config.lazy {
            for request in requests {
                let identifier = request.identifier.clone();
                match self.queue_request(identifier.clone(), request) {
                    Enqueued::Queued(_) => summary.queued.push(identifier),
                    Enqueued::Stale(_) => summary.superseded.push(identifier),
                }
            }
            return summary;
        }

        {
            let mut state = lock(&self.state);
            for request in &requests {
                state.lease(&request.clone_target);
            }
        }

        let outcomes = if self.config.threaded {
            run_bounded(&requests, self.config.max_workers, |r| self.build_now(r))
        } else {
            requests.iter().map(|r| self.build_now(r)).collect()
        };

        for request in &requests {
            self.release(&request.clone_target);
        }
        for (request, outcome) in requests.into_iter().zip(outcomes) {
            summary.record(request.identifier, outcome);
        }
        summary
    }

    /// Register `document` for `identifier` and clear any pending request, atomically.
    ///
    /// Compiles already running for the identifier are treated as superseded.
    pub fn submit_document(&self, identifier: Identifier, document: Document) {
        let unused = {
            let mut state = lock(&self.state);
            let unused = state
                .queue
                .remove(&identifier)
                .and_then(|old| state.release(&old.clone_target));
            state.registered.insert(identifier.clone(), next_sequence());
            state.store.insert(identifier, document);
            unused
        };
        if let Some(working_copy) = unused {
            self.remove_working_copy(&working_copy);
        }
    }

    /// Queue `request`, replacing any pending request for `identifier`.
    ///
    /// Returns the superseded request. A compile already running for it is not
    /// interrupted; its result is discarded when it arrives. A `request` older than
    /// the one already queued or registered is not queued and is returned itself.
    pub fn enqueue(&self, identifier: Identifier, request: BuildRequest) -> Option<BuildRequest> {
        match self.queue_request(identifier, request) {
            Enqueued::Queued(previous) => previous,
            Enqueued::Stale(request) => Some(request),
        }
    }

    fn queue_request(&self, identifier: Identifier, request: BuildRequest) -> Enqueued {
        let (superseded, unused) = {
            let mut state = lock(&self.state);
            if state.has_newer(&identifier, request.sequence) {
                tracing::info!(
                    identifier = %identifier,
                    git_ref = %request.git_ref,
                    "Ignoring build older than the current one"
                );
                return Enqueued::Stale(request);
            }

            state.lease(&request.clone_target);
            let previous = state.queue.enqueue(identifier.clone(), request);
            let unused = previous
                .as_ref()
                .and_then(|old| state.release(&old.clone_target));
            (previous, unused)
        };

        if let Some(old) = &superseded {
            tracing::info!(
                identifier = %identifier,
                superseded_ref = %old.git_ref,
                "Queued build superseded"
            );
        } else {
            tracing::debug!(identifier = %identifier, "Build queued");
        }
        if let Some(working_copy) = unused {
            self.remove_working_copy(&working_copy);
        }
        Enqueued::Queued(superseded)
    }

    #[must_use]
    pub fn is_queued(&self, identifier: &Identifier) -> bool {
        lock(&self.state).queue.contains(identifier)
    }

    /// In the store and not pending.
    #[must_use]
    pub fn is_ready(&self, identifier: &Identifier) -> bool {
        let state = lock(&self.state);
        state.store.contains(identifier) && !state.queue.contains(identifier)
    }

    /// Resolve a document: cached when ready, compiled now when queued.
    ///
    /// Concurrent lookups of the same queued identifier compile it once; the others
    /// wait and receive the registered document. A failed compile leaves the request
    /// queued, so the next lookup retries it.
    pub fn get_document(&self, identifier: &Identifier) -> Result<Document, BuildError> {
        {
            let state = lock(&self.state);
            if !state.queue.contains(identifier) {
                return state
                    .store
                    .get(identifier)
                    .cloned()
                    .ok_or_else(|| not_found(identifier));
            }
        }

        let guard = self.guard_for(identifier);
        let _building = lock(&guard);

        loop {
            let request = {
                let mut state = lock(&self.state);
                let Some(request) = state.queue.get(identifier).cloned() else {
                    return state
                        .store
                        .get(identifier)
                        .cloned()
                        .ok_or_else(|| not_found(identifier));
                };
                // Taken with the lock held, so a replacement cannot free the working copy first.
                state.lease(&request.clone_target);
                request
            };

            let outcome = self.compile_guarded(&request);
            self.release(&request.clone_target);
            match outcome? {
                CompileOutcome::Registered(document) => return Ok(document),
                CompileOutcome::Superseded => continue,
            }
        }
    }

    /// Snapshot of registered documents, sorted by identifier.
    #[must_use]
    pub fn documents(&self) -> Vec<(Identifier, Document)> {
        lock(&self.state).store.snapshot()
    }

    /// Snapshot of pending requests, sorted by identifier.
    #[must_use]
    pub fn queue(&self) -> Vec<(Identifier, BuildRequest)> {
        lock(&self.state).queue.snapshot()
    }

    fn guard_for(&self, identifier: &Identifier) -> Arc<Mutex<()>> {
        Arc::clone(lock(&self.guards).entry(identifier.clone()).or_default())
    }

    fn checkout_guard(&self, working_copy: &Path) -> Arc<Mutex<()>> {
        Arc::clone(
            lock(&self.checkouts)
                .entry(working_copy.to_path_buf())
                .or_default(),
        )
    }

    fn release(&self, working_copy: &Path) {
        let unused = lock(&self.state).release(working_copy);
        if let Some(working_copy) = unused {
            self.remove_working_copy(&working_copy);
        }
    }

    /// Delete a working copy that no longer has a lease.
    ///
    /// Only directories under `work_dir/repos` are touched. When the checkout guard
    /// is busy, its holder owns a lease and comes back here when it releases it.
    fn remove_working_copy(&self, working_copy: &Path) {
        if !working_copy.starts_with(self.config.work_dir.join("repos")) {
            return;
        }

        let guard = self.checkout_guard(working_copy);
        let _removing = match guard.try_lock() {
            Ok(held) => held,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        if lock(&self.state).leases.contains_key(working_copy) {
            return;
        }

        match std::fs::remove_dir_all(working_copy) {
            Ok(()) => tracing::debug!(path = %working_copy.display(), "Removed working copy"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %working_copy.display(),
                error = %e,
                "Failed to remove working copy"
            ),
        }

        // Forget the guard unless someone else is already waiting on it.
        let mut checkouts = lock(&self.checkouts);
        if checkouts
            .get(working_copy)
            .is_some_and(|g| Arc::ptr_eq(g, &guard) && Arc::strong_count(&guard) == 2)
        {
            checkouts.remove(working_copy);
        }
    }

    fn build_now(&self, request: &BuildRequest) -> Result<CompileOutcome, BuildError> {
        let guard = self.guard_for(&request.identifier);
        let _building = lock(&guard);
        self.compile_guarded(request)
    }

    /// Compile and register. Caller holds the identifier's build guard.
    fn compile_guarded(&self, request: &BuildRequest) -> Result<CompileOutcome, BuildError> {
        let identifier = request.identifier.to_string();
        let span = build_span(&identifier, "compile");
        let _entered = span.enter();
        let start = Instant::now();
        log_stage_start(&identifier, "compile");

        let result = CompileStage::new(self.compiler.as_ref(), &self.config.work_dir)
            .run(request)
            .and_then(|compiled| self.register(request, &compiled.path));

        let elapsed = start.elapsed().as_millis();
        match &result {
            Ok(CompileOutcome::Registered(_)) => log_stage_complete(&identifier, "compile", elapsed),
            Ok(CompileOutcome::Superseded) => tracing::info!(
                identifier = %identifier,
                git_ref = %request.git_ref,
                duration_ms = %elapsed,
                "Discarding result of superseded build"
            ),
            Err(e) => log_stage_error(&identifier, "compile", &e.to_string(), elapsed),
        }
        result
    }

    /// Publish `artifact` as the document for `request`, unless a newer request won.
    ///
    /// The copy is staged before the state lock is taken; inside it only the
    /// rename and the map updates happen.
    fn register(&self, request: &BuildRequest, artifact: &Path) -> Result<CompileOutcome, BuildError> {
        let identifier = &request.identifier;
        let location = self.config.output_dir.join(identifier.relative_dir());
        let target = location.join(format!("{}.{ARTIFACT_EXTENSION}", identifier.name()));
        let staged = stage_copy(artifact, &target).map_err(|e| publish_failure(identifier, &e))?;

        let mut state = lock(&self.state);
        let mut unused = None;

        let outcome = if state.has_newer(identifier, request.sequence) {
            let newer_registered = state
                .registered
                .get(identifier)
                .is_some_and(|sequence| *sequence > request.sequence);
            if newer_registered && state.queue.remove_if_current(identifier, request.sequence) {
                unused = state.release(&request.clone_target);
            }
            CompileOutcome::Superseded
        } else {
            staged
                .commit()
                .map_err(|e| publish_failure(identifier, &e))?;
            let document = Document::new(identifier.name(), location)?;

            state.store.insert(identifier.clone(), document.clone());
            state.registered.insert(identifier.clone(), request.sequence);
            if state
                .queue
                .get(identifier)
                .is_some_and(|queued| queued.sequence <= request.sequence)
            {
                unused = state
                    .queue
                    .remove(identifier)
                    .and_then(|old| state.release(&old.clone_target));
            }
            CompileOutcome::Registered(document)
        };
        drop(state);

        if let Some(working_copy) = unused {
            self.remove_working_copy(&working_copy);
        }
        Ok(outcome)
    }
}
