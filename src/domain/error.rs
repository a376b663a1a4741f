//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::{EntityId, EntityKind};

/// Domain errors represent violations of the entity model or of comparison preconditions.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("cannot compare {left} ({left_kind}) with {right} ({right_kind}): kinds differ")]
    KindMismatch {
        left: EntityId,
        left_kind: EntityKind,
        right: EntityId,
        right_kind: EntityKind,
    },

    #[error("non-finite node position in {entity}: ({x}, {y}, {z})")]
    NonFiniteGeometry {
        entity: EntityId,
        x: f64,
        y: f64,
        z: f64,
    },

    #[error("node {node} of {entity} references unknown parent {parent}")]
    UnknownParent {
        entity: EntityId,
        node: usize,
        parent: usize,
    },

    #[error("{entity} has more than one root node (node {node})")]
    DuplicateRoot { entity: EntityId, node: usize },

    #[error("cycle detected in {entity} at node {node}")]
    CycleDetected { entity: EntityId, node: usize },

    #[error("duplicate entity id {0}")]
    DuplicateEntity(EntityId),
}

/// Entity kind name that matches no [`EntityKind`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown entity kind '{0}' (expected one of: treeline, areatree, connector, polyline, ball)")]
pub struct UnknownKind(pub String);

/// Index strategy name that matches no [`crate::domain::IndexStrategy`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown index strategy '{0}' (expected grid or linear)")]
pub struct UnknownStrategy(pub String);
