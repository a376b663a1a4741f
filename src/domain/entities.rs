//! Domain entities: core data structures

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use kurbo::Affine;
use serde::{Deserialize, Serialize};

use crate::domain::arena::TreeArena;
use crate::domain::error::{DomainError, UnknownKind};

/// Opaque labelled marker attached to a node. Equal iff the labels are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Tag {
    fn from(label: String) -> Self {
        Self(label)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable per-process identity of an entity. Used for reporting, never for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Concrete kind of a tree-shaped annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Treeline,
    AreaTree,
    Connector,
    Polyline,
    Ball,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Treeline,
        EntityKind::AreaTree,
        EntityKind::Connector,
        EntityKind::Polyline,
        EntityKind::Ball,
    ];

    /// Kinds considered for matching unless configured otherwise.
    pub const DEFAULT_ACCEPTED: [EntityKind; 3] = [
        EntityKind::Treeline,
        EntityKind::AreaTree,
        EntityKind::Connector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Treeline => "treeline",
            EntityKind::AreaTree => "areatree",
            EntityKind::Connector => "connector",
            EntityKind::Polyline => "polyline",
            EntityKind::Ball => "ball",
        }
    }

    /// Display name as shown in the matched table's "Type" column.
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Treeline => "Treeline",
            EntityKind::AreaTree => "AreaTree",
            EntityKind::Connector => "Connector",
            EntityKind::Polyline => "Polyline",
            EntityKind::Ball => "Ball",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// A named, typed tree of nodes with an affine transform applied to all node coordinates.
///
/// Entities are supplied by the project collaborators and are read-only for the engine.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub title: String,
    pub transform: Affine,
    pub tree: TreeArena,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, title: impl Into<String>, tree: TreeArena) -> Self {
        Self {
            id,
            kind,
            title: title.into(),
            transform: Affine::IDENTITY,
            tree,
        }
    }

    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    pub fn node_count(&self) -> usize {
        self.tree.len()
    }

    /// True when the tree is structurally empty.
    ///
    /// - no nodes at all, for every kind
    /// - a connector whose origin has no targets
    pub fn is_deletable(&self) -> bool {
        match self.tree.root_node() {
            None => true,
            Some(root) => self.kind == EntityKind::Connector && root.children.is_empty(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} \"{}\"", self.kind.type_name(), self.id, self.title)
    }
}

/// A named collection of entities, as handed over by a project collaborator.
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub name: String,
    pub entities: Vec<Entity>,
}

impl Project {
    pub fn new(name: impl Into<String>, entities: Vec<Entity>) -> Self {
        Self {
            name: name.into(),
            entities,
        }
    }

    pub fn find(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn ensure_unique_ids(&self) -> Result<(), DomainError> {
        ensure_unique_ids(&self.entities)
    }
}

/// Fails on the first id that occurs twice.
pub fn ensure_unique_ids<'a, I>(entities: I) -> Result<(), DomainError>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut seen = BTreeSet::new();
    for entity in entities {
        if !seen.insert(entity.id) {
            return Err(DomainError::DuplicateEntity(entity.id));
        }
    }
    Ok(())
}
