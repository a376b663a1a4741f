//! Pairwise tree comparison.
//!
//! [`compare`] scores how much two entities of the same kind have in common and records
//! what differs between them. It is pure: no locking, no side effects beyond tracing.

use std::collections::BTreeSet;
use std::fmt;

use generational_arena::Index;
use tracing::{instrument, trace};

use crate::domain::entities::{Entity, EntityId, EntityKind, Tag};
use crate::domain::error::DomainError;
use crate::domain::geometry::{GeometricKey, DEFAULT_TOLERANCE};
use crate::domain::node_set::{IndexStrategy, NodeSetIndex};

/// Tuning for a single comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareOptions {
    pub tolerance: f64,
    pub index: IndexStrategy,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            index: IndexStrategy::default(),
        }
    }
}

/// Two geometrically identical nodes whose tag sets differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDifference {
    /// Node in the left entity
    pub left: Index,
    /// Node in the right entity
    pub right: Index,
    /// Tags only on the left node
    pub removed: BTreeSet<Tag>,
    /// Tags only on the right node
    pub added: BTreeSet<Tag>,
}

impl TagDifference {
    fn between(left: Index, left_tags: &BTreeSet<Tag>, right: Index, right_tags: &BTreeSet<Tag>) -> Self {
        Self {
            left,
            right,
            removed: left_tags.difference(right_tags).cloned().collect(),
            added: right_tags.difference(left_tags).cloned().collect(),
        }
    }
}

impl fmt::Display for TagDifference {
    /// `[-]a, [-]b  /  [+]c`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let removed: Vec<String> = self.removed.iter().map(|t| format!("[-]{t}")).collect();
        let added: Vec<String> = self.added.iter().map(|t| format!("[+]{t}")).collect();
        f.write_str(&removed.join(", "))?;
        if !added.is_empty() {
            if !removed.is_empty() {
                f.write_str("  /  ")?;
            }
            f.write_str(&added.join(", "))?;
        }
        Ok(())
    }
}

/// Diff record for one (left, right) candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub left: EntityId,
    pub right: EntityId,
    pub kind: EntityKind,
    /// Titles differ
    pub title: bool,
    /// Affine transforms differ
    pub transform: bool,
    /// Roots are at different positions (the tree was rerooted)
    pub root: bool,
    /// Signed difference in node count, left minus right
    pub diff: i64,
    /// Left nodes found also in the right tree, independent of tags.
    ///
    /// Every left node counts on its own, so near-coincident left nodes that find the
    /// same right node are counted separately and the value can exceed `n_nodes_d2`.
    pub common_nodes: usize,
    /// Raw node count of the left tree, coincident nodes included
    pub n_nodes_d1: usize,
    /// Raw node count of the right tree, coincident nodes included
    pub n_nodes_d2: usize,
    pub different_tags: Vec<TagDifference>,
}

impl Change {
    pub fn identical(&self) -> bool {
        !self.title
            && !self.transform
            && !self.root
            && self.diff == 0
            && self.different_tags.is_empty()
            && self.n_nodes_d1 == self.n_nodes_d2
            && self.n_nodes_d1 == self.common_nodes
    }

    pub fn has_similar_nodes(&self) -> bool {
        self.common_nodes > 0
    }
}

/// Compare two entities of the same kind.
#[instrument(level = "trace", skip_all, fields(left = %e1.id, right = %e2.id))]
pub fn compare(e1: &Entity, e2: &Entity, options: &CompareOptions) -> Result<Change, DomainError> {
    if e1.kind != e2.kind {
        return Err(DomainError::KindMismatch {
            left: e1.id,
            left_kind: e1.kind,
            right: e2.id,
            right_kind: e2.kind,
        });
    }

    let nds1 = NodeSetIndex::build(e1, options.tolerance, options.index)?;
    let nds2 = NodeSetIndex::build(e2, options.tolerance, options.index)?;

    let n1 = nds1.len();
    let n2 = nds2.len();

    let mut change = Change {
        left: e1.id,
        right: e2.id,
        kind: e1.kind,
        title: e1.title != e2.title,
        transform: e1.transform != e2.transform,
        root: roots_differ(e1, e2, options.tolerance),
        diff: n1 as i64 - n2 as i64,
        common_nodes: 0,
        n_nodes_d1: n1,
        n_nodes_d2: n2,
        different_tags: Vec::new(),
    };

    // One pass yields both the intersection count and the tag differences
    for entry in nds1.iter() {
        let Some(other) = nds2.find(&entry.key) else {
            continue;
        };
        change.common_nodes += 1;
        let (Some(a), Some(b)) = (e1.tree.get_node(entry.node), e2.tree.get_node(other.node)) else {
            continue;
        };
        if !a.data.has_same_tags(&b.data) {
            change
                .different_tags
                .push(TagDifference::between(entry.node, &a.data.tags, other.node, &b.data.tags));
        }
    }

    trace!(
        n1,
        n2,
        common = change.common_nodes,
        diff = change.diff,
        tags = change.different_tags.len(),
        "compared"
    );
    Ok(change)
}

fn roots_differ(e1: &Entity, e2: &Entity, tolerance: f64) -> bool {
    match (e1.tree.root_node(), e2.tree.root_node()) {
        (Some(r1), Some(r2)) => {
            let k1 = GeometricKey::of(&r1.data, &e1.transform);
            let k2 = GeometricKey::of(&r2.data, &e2.transform);
            !k1.matches(&k2, tolerance)
        }
        (None, None) => false,
        _ => true,
    }
}
