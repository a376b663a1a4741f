//! TOML project snapshots
//!
//! A snapshot is a flat, human-editable dump of one project:
//!
//! ```toml
//! name = "stack-a"
//!
//! [[entity]]
//! id = 12
//! kind = "treeline"
//! title = "axon 1"
//! transform = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
//!
//! [[entity.node]]
//! x = 10.0
//! y = 12.0
//! tags = ["soma"]
//!
//! [[entity.node]]
//! x = 11.0
//! y = 12.0
//! parent = 0
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use kurbo::Affine;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::{DomainError, Entity, EntityBuilder, EntityId, EntityKind, NodeData, Project};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::FileSystem;

/// Source of projects for the engine.
pub trait ProjectLoader: Send + Sync {
    fn load(&self, path: &Path) -> InfraResult<Project>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "entity")]
    entities: Vec<SnapshotEntity>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotEntity {
    id: u64,
    kind: EntityKind,
    #[serde(default)]
    title: String,
    #[serde(default)]
    transform: Option<[f64; 6]>,
    #[serde(default, rename = "node")]
    nodes: Vec<SnapshotNode>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotNode {
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    parent: Option<usize>,
}

impl SnapshotEntity {
    fn into_entity(self) -> Result<Entity, DomainError> {
        let mut builder = EntityBuilder::new(EntityId(self.id), self.kind).title(self.title);
        if let Some(coeffs) = self.transform {
            builder = builder.transform(Affine::new(coeffs));
        }
        for node in self.nodes {
            builder = builder.node(NodeData::new(node.x, node.y, node.z).with_tags(node.tags), node.parent);
        }
        builder.build()
    }
}

/// Parse snapshot text; `path` is only used for error messages and the default name.
pub fn parse_snapshot(path: &Path, content: &str) -> InfraResult<Project> {
    let file: SnapshotFile =
        toml::from_str(content).map_err(|e| InfraError::snapshot(path, e.to_string()))?;

    let name = file.name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let mut seen = HashSet::new();
    let mut entities = Vec::with_capacity(file.entities.len());
    for raw in file.entities {
        let id = EntityId(raw.id);
        if !seen.insert(id) {
            return Err(InfraError::SnapshotEntity {
                path: path.to_path_buf(),
                source: DomainError::DuplicateEntity(id),
            });
        }
        let entity = raw.into_entity().map_err(|source| InfraError::SnapshotEntity {
            path: path.to_path_buf(),
            source,
        })?;
        entities.push(entity);
    }

    debug!("Loaded '{}' with {} entities", name, entities.len());
    Ok(Project::new(name, entities))
}

/// Loads TOML snapshots through the [`FileSystem`] boundary.
pub struct TomlProjectLoader {
    fs: Arc<dyn FileSystem>,
}

impl TomlProjectLoader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl ProjectLoader for TomlProjectLoader {
    #[instrument(level = "debug", skip(self))]
    fn load(&self, path: &Path) -> InfraResult<Project> {
        if !self.fs.is_file(path) {
            return Err(InfraError::io(
                format!("read {}", path.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot file not found"),
            ));
        }
        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| InfraError::io(format!("read {}", path.display()), e))?;
        parse_snapshot(path, &content)
    }
}
