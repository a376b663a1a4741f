//! Pre-matching partition of a collection into ignored, empty and candidate entities.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::domain::{Entity, EntityId, EntityKind};

/// Outcome of classifying one collection.
#[derive(Debug, Default)]
pub struct Partition<'a> {
    /// Entities of a kind that is not accepted
    pub ignored: Vec<&'a Entity>,
    /// Structurally empty entities, kept aside
    pub empty: Vec<&'a Entity>,
    /// Everything that takes part in matching
    pub candidates: Vec<&'a Entity>,
}

impl Partition<'_> {
    pub fn empty_ids(&self) -> BTreeSet<EntityId> {
        self.empty.iter().map(|e| e.id).collect()
    }
}

/// Splits collections by accepted kind and deletability.
#[derive(Debug, Clone)]
pub struct EntityClassifier {
    accepted: BTreeSet<EntityKind>,
}

impl EntityClassifier {
    pub fn new<I: IntoIterator<Item = EntityKind>>(accepted: I) -> Self {
        Self {
            accepted: accepted.into_iter().collect(),
        }
    }

    pub fn accepts(&self, kind: EntityKind) -> bool {
        self.accepted.contains(&kind)
    }

    #[instrument(level = "debug", skip_all, fields(label = %label, total = entities.len()))]
    pub fn partition<'a>(&self, label: &str, entities: &'a [Entity]) -> Partition<'a> {
        let mut partition = Partition::default();
        for entity in entities {
            if !self.accepts(entity.kind) {
                info!("Ignoring: [{label}] {entity}");
                partition.ignored.push(entity);
            } else if entity.is_deletable() {
                debug!("Empty: [{label}] {entity}");
                partition.empty.push(entity);
            } else {
                partition.candidates.push(entity);
            }
        }
        debug!(
            ignored = partition.ignored.len(),
            empty = partition.empty.len(),
            candidates = partition.candidates.len(),
            "partitioned"
        );
        partition
    }
}

impl Default for EntityClassifier {
    fn default() -> Self {
        Self::new(EntityKind::DEFAULT_ACCEPTED)
    }
}
