//! Set of geometric keys over an entity's subtree, with tolerance lookup.
//!
//! Two strategies answer the same queries:
//! - `Linear`: unindexed equality scan, O(n) per lookup.
//! - `Grid`: uniform 3D grid with cells twice the tolerance. Any match of a key lies in
//!   the key's cell or one of its 26 neighbours, so the grid never misses a match near
//!   a cell edge.
//!
//! Lookups return the earliest inserted matching key, so both strategies agree exactly.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use generational_arena::Index;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::entities::Entity;
use crate::domain::error::{DomainError, UnknownStrategy};
use crate::domain::geometry::GeometricKey;

/// Lookup strategy of a [`NodeSetIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStrategy {
    Linear,
    #[default]
    Grid,
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStrategy::Linear => f.write_str("linear"),
            IndexStrategy::Grid => f.write_str("grid"),
        }
    }
}

impl FromStr for IndexStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(IndexStrategy::Linear),
            "grid" => Ok(IndexStrategy::Grid),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

/// A key plus the arena index of the node it came from.
#[derive(Debug, Clone, Copy)]
pub struct IndexedNode {
    pub key: GeometricKey,
    pub node: Index,
}

type Cell = (i64, i64, i64);

#[derive(Debug, Clone)]
pub struct NodeSetIndex {
    tolerance: f64,
    entries: Vec<IndexedNode>,
    cells: Option<HashMap<Cell, Vec<usize>>>,
}

impl NodeSetIndex {
    pub fn new(tolerance: f64, strategy: IndexStrategy) -> Self {
        Self {
            tolerance,
            entries: Vec::new(),
            cells: match strategy {
                IndexStrategy::Linear => None,
                IndexStrategy::Grid => Some(HashMap::new()),
            },
        }
    }

    /// Index every node of `entity`'s tree under the entity's own transform.
    pub fn build(
        entity: &Entity,
        tolerance: f64,
        strategy: IndexStrategy,
    ) -> Result<Self, DomainError> {
        let mut index = Self::new(tolerance, strategy);
        for (idx, node) in entity.tree.iter() {
            let key = GeometricKey::of(&node.data, &entity.transform);
            if !key.is_finite() {
                return Err(DomainError::NonFiniteGeometry {
                    entity: entity.id,
                    x: key.x,
                    y: key.y,
                    z: key.z,
                });
            }
            index.insert(key, idx);
        }
        trace!(entity = %entity.id, nodes = index.len(), "built node set");
        Ok(index)
    }

    fn cell_size(&self) -> f64 {
        self.tolerance * 2.0
    }

    pub fn insert(&mut self, key: GeometricKey, node: Index) {
        let slot = self.entries.len();
        self.entries.push(IndexedNode { key, node });
        let cell_size = self.cell_size();
        if let Some(cells) = self.cells.as_mut() {
            cells.entry(key.cell(cell_size)).or_default().push(slot);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedNode> {
        self.entries.iter()
    }

    /// Earliest inserted entry within tolerance of `key`.
    pub fn find(&self, key: &GeometricKey) -> Option<&IndexedNode> {
        match &self.cells {
            None => self
                .entries
                .iter()
                .find(|e| e.key.matches(key, self.tolerance)),
            Some(cells) => {
                // Saturated cells probe themselves twice, which cannot change the minimum
                let (cx, cy, cz) = key.cell(self.cell_size());
                let mut best: Option<usize> = None;
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        for dz in -1..=1 {
                            let Some(slots) = cells.get(&(
                                cx.saturating_add(dx),
                                cy.saturating_add(dy),
                                cz.saturating_add(dz),
                            )) else {
                                continue;
                            };
                            // slots are ascending within a cell
                            if let Some(&slot) = slots
                                .iter()
                                .find(|&&s| self.entries[s].key.matches(key, self.tolerance))
                            {
                                best = Some(best.map_or(slot, |b| b.min(slot)));
                            }
                        }
                    }
                }
                best.map(|slot| &self.entries[slot])
            }
        }
    }

    pub fn contains(&self, key: &GeometricKey) -> bool {
        self.find(key).is_some()
    }

    /// Number of keys in `self` that also occur in `other`.
    pub fn intersect_count(&self, other: &NodeSetIndex) -> usize {
        self.entries
            .iter()
            .filter(|e| other.contains(&e.key))
            .count()
    }

    /// Number of keys in `self` absent from `other`.
    pub fn difference_count(&self, other: &NodeSetIndex) -> usize {
        self.len() - self.intersect_count(other)
    }
}
