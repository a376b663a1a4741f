//! Domain layer: entities and comparison logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading,
//! no threads).

pub mod arena;
pub mod builder;
pub mod change;
pub mod entities;
pub mod error;
pub mod geometry;
pub mod node_set;

pub use arena::{NodeData, TreeArena, TreeNode};
pub use builder::EntityBuilder;
pub use change::{compare, Change, CompareOptions, TagDifference};
pub use entities::*;
pub use error::{DomainError, UnknownKind, UnknownStrategy};
pub use geometry::{GeometricKey, DEFAULT_TOLERANCE};
pub use node_set::{IndexStrategy, IndexedNode, NodeSetIndex};
