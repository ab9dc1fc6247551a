//! Document cache and its startup scan.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::model::{Document, Identifier};

/// Cache of compiled documents. A rebuild replaces the previous entry.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<Identifier, Document>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a store from an existing `owner/repository/<files>` hierarchy.
    ///
    /// Each file yields a candidate named after its stem; candidates without a
    /// matching artifact, or whose path segments are not valid identifier
    /// segments, are logged and skipped. An unreadable root yields an empty store.
    #[must_use]
    pub fn scan(root: &Path) -> Self {
        let mut store = Self::new();

        for owner_dir in subdirectories(root) {
            for repo_dir in subdirectories(&owner_dir) {
                let Ok(entries) = fs::read_dir(&repo_dir) else {
                    tracing::warn!(path = %repo_dir.display(), "Skipping unreadable repository directory");
                    continue;
                };

                for entry in entries.flatten() {
                    let path = entry.path();
                    if !path.is_file() {
                        continue;
                    }
                    store.scan_candidate(&owner_dir, &repo_dir, &path);
                }
            }
        }

        tracing::info!(root = %root.display(), documents = store.len(), "Output directory scanned");
        store
    }

    fn scan_candidate(&mut self, owner_dir: &Path, repo_dir: &Path, file: &Path) {
        let (Some(owner), Some(repo), Some(stem)) = (
            file_name(owner_dir),
            file_name(repo_dir),
            file.file_stem().and_then(|s| s.to_str()),
        ) else {
            tracing::warn!(path = %file.display(), "Skipping file with a non UTF-8 path");
            return;
        };

        let identifier = match Identifier::checked(owner, repo, stem) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Skipping file");
                return;
            }
        };
        if self.documents.contains_key(&identifier) {
            return;
        }

        match Document::new(identifier.name(), repo_dir) {
            Ok(document) => {
                tracing::debug!(identifier = %identifier, "Found compiled document");
                self.documents.insert(identifier, document);
            }
            Err(e) => {
                tracing::warn!(identifier = %identifier, error = %e, "Skipping document without artifact");
            }
        }
    }

    /// Insert or replace the document for `identifier`.
    pub fn insert(&mut self, identifier: Identifier, document: Document) -> Option<Document> {
        self.documents.insert(identifier, document)
    }

    #[must_use]
    pub fn get(&self, identifier: &Identifier) -> Option<&Document> {
        self.documents.get(identifier)
    }

    #[must_use]
    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.documents.contains_key(identifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Entries sorted by identifier.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Identifier, Document)> {
        let mut entries: Vec<_> = self
            .documents
            .iter()
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

fn subdirectories(dir: &Path) -> Vec<std::path::PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
