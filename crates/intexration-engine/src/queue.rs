//! Pending builds, keyed by identifier. Last submission wins.

use std::collections::HashMap;

use crate::model::{BuildRequest, Identifier};

#[derive(Debug, Default)]
pub struct BuildQueue {
    pending: HashMap<Identifier, BuildRequest>,
}

impl BuildQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `request`, returning the request it superseded.
    pub fn enqueue(&mut self, identifier: Identifier, request: BuildRequest) -> Option<BuildRequest> {
        self.pending.insert(identifier, request)
    }

    #[must_use]
    pub fn get(&self, identifier: &Identifier) -> Option<&BuildRequest> {
        self.pending.get(identifier)
    }

    #[must_use]
    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.pending.contains_key(identifier)
    }

    /// Remove the entry only if it is still the request with `sequence`.
    pub fn remove_if_current(&mut self, identifier: &Identifier, sequence: u64) -> bool {
        if self
            .pending
            .get(identifier)
            .is_some_and(|r| r.sequence == sequence)
        {
            self.pending.remove(identifier);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, identifier: &Identifier) -> Option<BuildRequest> {
        self.pending.remove(identifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Entries sorted by identifier.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Identifier, BuildRequest)> {
        let mut entries: Vec<_> = self
            .pending
            .iter()
            .map(|(id, req)| (id.clone(), req.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &Identifier, git_ref: &str) -> BuildRequest {
        BuildRequest::new(id.clone(), "https://github.com/acme/paper", git_ref, "/work")
    }

    #[test]
    fn test_enqueue_supersedes() {
        let id = Identifier::new("acme", "paper", "main").unwrap();
        let mut queue = BuildQueue::new();
        let r1 = request(&id, "aaa");
        let r2 = request(&id, "bbb");

        assert!(queue.enqueue(id.clone(), r1.clone()).is_none());
        assert_eq!(queue.enqueue(id.clone(), r2.clone()), Some(r1));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(&id), Some(&r2));
    }

    #[test]
    fn test_remove_if_current_ignores_stale_sequence() {
        let id = Identifier::new("acme", "paper", "main").unwrap();
        let mut queue = BuildQueue::new();
        let r1 = request(&id, "aaa");
        let r2 = request(&id, "bbb");
        queue.enqueue(id.clone(), r1.clone());
        queue.enqueue(id.clone(), r2.clone());

        assert!(!queue.remove_if_current(&id, r1.sequence));
        assert!(queue.contains(&id));
        assert!(queue.remove_if_current(&id, r2.sequence));
        assert!(queue.is_empty());
    }
}
