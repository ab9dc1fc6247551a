use std::fmt;

use intexration_utils::error::BuildError;

use super::CompileOutcome;
use crate::model::Identifier;

/// What happened to each request of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub compiled: Vec<Identifier>,
    pub queued: Vec<Identifier>,
    pub superseded: Vec<Identifier>,
    pub failed: Vec<(Identifier, BuildError)>,
}

impl BatchSummary {
    pub(crate) fn record(
        &mut self,
        identifier: Identifier,
        outcome: Result<CompileOutcome, BuildError>,
    ) {
        match outcome {
            Ok(CompileOutcome::Registered(_)) => self.compiled.push(identifier),
            Ok(CompileOutcome::Superseded) => self.superseded.push(identifier),
            Err(e) => self.failed.push((identifier, e)),
        }
    }

    /// Number of requests in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.len() + self.queued.len() + self.superseded.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every identifier the batch touched, in outcome order.
    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.compiled
            .iter()
            .chain(&self.queued)
            .chain(&self.superseded)
            .chain(self.failed.iter().map(|(id, _)| id))
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No documents found");
        }
        for id in &self.compiled {
            writeln!(f, "compiled    {id}")?;
        }
        for id in &self.queued {
            writeln!(f, "queued      {id}")?;
        }
        for id in &self.superseded {
            writeln!(f, "superseded  {id}")?;
        }
        for (id, error) in &self.failed {
            writeln!(f, "failed      {id}: {error}")?;
        }
        Ok(())
    }
}
