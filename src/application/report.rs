//! Final classification of both collections.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{info, warn};

use crate::application::matcher::{MatchOutcome, TaskFailure};
use crate::domain::{Change, EntityId};

/// Engine output: every accepted entity of both collections lands in exactly one bucket.
#[derive(Debug, Clone, Default)]
pub struct ClassificationResult {
    /// Left entity -> claimed changes; the first change is the primary match
    pub matched: BTreeMap<EntityId, Vec<Change>>,
    pub unmatched1: BTreeSet<EntityId>,
    pub unmatched2: BTreeSet<EntityId>,
    pub empty1: BTreeSet<EntityId>,
    pub empty2: BTreeSet<EntityId>,
    /// Entities of a kind that was not accepted, per collection
    pub ignored1: BTreeSet<EntityId>,
    pub ignored2: BTreeSet<EntityId>,
    pub failures: Vec<TaskFailure>,
    pub pair_failures: usize,
}

/// Bucket sizes, as printed at the end of a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub matched: usize,
    pub identical: usize,
    pub unmatched1: usize,
    pub unmatched2: usize,
    pub empty1: usize,
    pub empty2: usize,
    pub failures: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "matched: {} (identical: {}), unmatched 1: {}, unmatched 2: {}, empty 1: {}, empty 2: {}",
            self.matched, self.identical, self.unmatched1, self.unmatched2, self.empty1, self.empty2
        )?;
        if self.failures > 0 {
            write!(f, ", failed: {}", self.failures)?;
        }
        Ok(())
    }
}

impl ClassificationResult {
    /// All changes, left id ascending, primary match first within a left entity.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.matched.values().flatten()
    }

    /// One row per change, for tabular presentation.
    pub fn rows(&self) -> Vec<&Change> {
        self.changes().collect()
    }

    pub fn primary(&self, left: EntityId) -> Option<&Change> {
        self.matched.get(&left).and_then(|changes| changes.first())
    }

    /// Right entities claimed by some match.
    pub fn claimed(&self) -> BTreeSet<EntityId> {
        self.changes().map(|c| c.right).collect()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            matched: self.matched.len(),
            identical: self
                .matched
                .values()
                .filter(|changes| changes.len() == 1 && changes[0].identical())
                .count(),
            unmatched1: self.unmatched1.len(),
            unmatched2: self.unmatched2.len(),
            empty1: self.empty1.len(),
            empty2: self.empty2.len(),
            failures: self.failures.len(),
        }
    }
}

/// Assembles a [`ClassificationResult`] from matcher output and the right-hand partition.
#[derive(Debug)]
pub struct ReportBuilder {
    outcome: MatchOutcome,
    empty2: BTreeSet<EntityId>,
    ignored2: BTreeSet<EntityId>,
}

impl ReportBuilder {
    pub fn new(outcome: MatchOutcome) -> Self {
        Self {
            outcome,
            empty2: BTreeSet::new(),
            ignored2: BTreeSet::new(),
        }
    }

    pub fn empty2(mut self, empty2: BTreeSet<EntityId>) -> Self {
        self.empty2 = empty2;
        self
    }

    pub fn ignored2(mut self, ignored2: BTreeSet<EntityId>) -> Self {
        self.ignored2 = ignored2;
        self
    }

    pub fn build(self) -> ClassificationResult {
        let outcome = self.outcome;
        for (left, changes) in &outcome.matched {
            if changes.len() > 1 {
                warn!("More than one assigned to {}: {} changes", left, changes.len());
            }
        }
        info!("matched.size(): {}", outcome.matched.len());

        ClassificationResult {
            matched: outcome.matched,
            unmatched1: outcome.unmatched1,
            unmatched2: outcome.unmatched2,
            empty1: outcome.empty1,
            empty2: self.empty2,
            ignored1: outcome.ignored1,
            ignored2: self.ignored2,
            failures: outcome.failures,
            pair_failures: outcome.pair_failures,
        }
    }
}
