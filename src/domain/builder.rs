//! Entity builder: assembles a node tree from a flat, parent-indexed node list.
//!
//! Project collaborators hand nodes over as a list where each node names its parent
//! by position. The builder validates the list (known parents, a single root, no
//! cycles) and lays the nodes out in a [`TreeArena`].

use std::collections::HashMap;

use generational_arena::Index;
use kurbo::Affine;
use tracing::instrument;

use crate::domain::arena::{NodeData, TreeArena};
use crate::domain::entities::{Entity, EntityId, EntityKind};
use crate::domain::error::DomainError;

/// Result type for entity construction.
pub type BuildResult<T> = Result<T, DomainError>;

/// Constructs entities from flat node lists.
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    id: EntityId,
    kind: EntityKind,
    title: String,
    transform: Affine,
    nodes: Vec<(NodeData, Option<usize>)>,
}

impl EntityBuilder {
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            title: String::new(),
            transform: Affine::IDENTITY,
            nodes: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    /// Append a node; `parent` is the position of another node in this builder.
    pub fn node(mut self, data: NodeData, parent: Option<usize>) -> Self {
        self.nodes.push((data, parent));
        self
    }

    /// Append nodes as a single unbranched chain hanging off the last node added.
    pub fn chain<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = NodeData>,
    {
        for data in nodes {
            let parent = self.nodes.len().checked_sub(1);
            self.nodes.push((data, parent));
        }
        self
    }

    #[instrument(level = "trace", skip(self), fields(entity = %self.id))]
    pub fn build(self) -> BuildResult<Entity> {
        let mut root: Option<usize> = None;
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();

        for (pos, (_, parent)) in self.nodes.iter().enumerate() {
            match parent {
                Some(p) if *p >= self.nodes.len() => {
                    return Err(DomainError::UnknownParent {
                        entity: self.id,
                        node: pos,
                        parent: *p,
                    });
                }
                Some(p) => children.entry(*p).or_default().push(pos),
                None if root.is_some() => {
                    return Err(DomainError::DuplicateRoot {
                        entity: self.id,
                        node: pos,
                    });
                }
                None => root = Some(pos),
            }
        }

        let mut tree = TreeArena::new();
        let mut placed = vec![false; self.nodes.len()];

        if let Some(root_pos) = root {
            let mut stack: Vec<(usize, Option<Index>)> = vec![(root_pos, None)];
            while let Some((pos, parent_idx)) = stack.pop() {
                placed[pos] = true;
                let idx = tree.insert_node(self.nodes[pos].0.clone(), parent_idx);
                if let Some(kids) = children.get(&pos) {
                    // Reverse so that siblings keep their list order
                    for &kid in kids.iter().rev() {
                        stack.push((kid, Some(idx)));
                    }
                }
            }
        }

        // Nodes not reachable from the root hang off a parent loop
        if let Some(node) = placed.iter().position(|p| !p) {
            return Err(DomainError::CycleDetected {
                entity: self.id,
                node,
            });
        }

        Ok(Entity::new(self.id, self.kind, self.title, tree).with_transform(self.transform))
    }
}
